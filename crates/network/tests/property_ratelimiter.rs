// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Property-based tests for the sliding-window rate limiter.
//!
//! These tests verify properties that should hold regardless of specific input values:
//! - No trailing window ever holds more admissions than the quota permits
//! - A saturated key admits again once the window has passed
//! - Keys do not share capacity

use std::{num::NonZeroU32, time::Duration};

use marketlink_network::ratelimiter::{RateLimiter, quota::Quota};
use proptest::prelude::*;
use rstest::rstest;
use tokio::time::Instant;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    /// Property: within any trailing window, admissions never exceed the limit.
    #[rstest]
    fn admissions_never_exceed_limit_per_window(
        limit in 1u32..=20u32,
        request_count in 1usize..=60,
        gaps_ms in proptest::collection::vec(0u64..=400u64, 60)
    ) {
        let admitted = paused_runtime().block_on(async {
            let quota = Quota::per_second(NonZeroU32::new(limit).unwrap());
            let limiter = RateLimiter::new_with_quota(None, vec![("orders", quota)]);
            let mut admitted = Vec::with_capacity(request_count);

            for gap in gaps_ms.iter().take(request_count) {
                tokio::time::advance(Duration::from_millis(*gap)).await;
                limiter.until_key_ready(&"orders").await;
                admitted.push(Instant::now());
            }
            admitted
        });

        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|at| at.duration_since(*start) < Duration::from_secs(1))
                .count();
            prop_assert!(
                in_window <= limit as usize,
                "{} admissions within one second exceed limit {}",
                in_window,
                limit
            );
        }
    }

    /// Property: a saturated key is ready again after one full window.
    #[rstest]
    fn saturated_key_recovers_after_window(limit in 1u32..=50u32) {
        paused_runtime().block_on(async {
            let quota = Quota::per_second(NonZeroU32::new(limit).unwrap());
            let limiter = RateLimiter::new_with_quota(None, vec![("default", quota)]);

            for _ in 0..limit {
                assert!(limiter.check_key(&"default").await.is_ok());
            }
            assert!(limiter.check_key(&"default").await.is_err());

            tokio::time::advance(Duration::from_secs(1)).await;
            assert!(limiter.check_key(&"default").await.is_ok());
        });
    }

    /// Property: exhausting one key leaves other keys untouched.
    #[rstest]
    fn keys_do_not_share_capacity(
        limit in 1u32..=20u32,
        keys in proptest::collection::hash_set("[a-z]{1,8}", 2..=5)
    ) {
        let keys: Vec<String> = keys.into_iter().collect();

        paused_runtime().block_on(async {
            let quota = Quota::per_second(NonZeroU32::new(limit).unwrap());
            let limiter = RateLimiter::new_with_quota(Some(quota), vec![]);

            for key in &keys {
                for _ in 0..limit {
                    assert!(limiter.check_key(key).await.is_ok(), "key {key} rejected early");
                }
                assert!(limiter.check_key(key).await.is_err());
            }
        });
    }
}
