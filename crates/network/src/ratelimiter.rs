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

//! A keyed sliding-window rate limiter.
//!
//! Each key owns a queue of admission instants. An acquisition first discards instants older
//! than the quota window, then waits until the oldest remaining instant leaves the window when
//! the queue is full. The admission instant is recorded only once the wait completes, so a
//! dropped acquisition never consumes capacity.
//!
//! All keys share a single lock which is held across the wait. Acquisitions are therefore
//! serialized: a caller blocked on a saturated key also delays callers of other keys.

pub mod quota;

use std::{collections::VecDeque, fmt::Debug, hash::Hash, time::Duration};

use ahash::AHashMap;
use tokio::{sync::Mutex, time::Instant};

use self::quota::Quota;

/// A rate limiter admitting acquisitions per key within a sliding window.
///
/// Keys listed at construction get their own quota. Any other key uses the base quota, or is
/// never limited when no base quota is configured.
#[derive(Debug)]
pub struct RateLimiter<K>
where
    K: Hash + Eq + Clone + Debug,
{
    base_quota: Option<Quota>,
    quotas: AHashMap<K, Quota>,
    windows: Mutex<AHashMap<K, VecDeque<Instant>>>,
}

impl<K> RateLimiter<K>
where
    K: Hash + Eq + Clone + Debug,
{
    /// Creates a new [`RateLimiter`] with an optional base quota and per-key quotas.
    #[must_use]
    pub fn new_with_quota(base_quota: Option<Quota>, keyed_quotas: Vec<(K, Quota)>) -> Self {
        let windows = keyed_quotas
            .iter()
            .map(|(key, quota)| {
                (
                    key.clone(),
                    VecDeque::with_capacity(quota.limit().get() as usize),
                )
            })
            .collect();

        Self {
            base_quota,
            quotas: keyed_quotas.into_iter().collect(),
            windows: Mutex::new(windows),
        }
    }

    /// Returns the quota applied to `key`, if any.
    #[must_use]
    pub fn quota(&self, key: &K) -> Option<Quota> {
        self.quotas.get(key).copied().or(self.base_quota)
    }

    /// Waits until `key` has capacity, then records an admission for it.
    ///
    /// Cancel-safe: dropping the future before it completes records nothing.
    pub async fn until_key_ready(&self, key: &K) {
        let Some(quota) = self.quota(key) else {
            return;
        };
        let limit = quota.limit().get() as usize;

        let mut windows = self.windows.lock().await;
        let admitted = windows.entry(key.clone()).or_default();

        purge_expired(admitted, Instant::now(), quota.window());

        if admitted.len() >= limit {
            if let Some(oldest) = admitted.front().copied() {
                let wait = quota.window().saturating_sub(oldest.elapsed());
                if !wait.is_zero() {
                    tracing::trace!(key = ?key, wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
                    tokio::time::sleep(wait).await;
                }
            }

            purge_expired(admitted, Instant::now(), quota.window());

            // Single re-check after waking; any remaining excess is evicted
            while admitted.len() >= limit {
                admitted.pop_front();
            }
        }

        admitted.push_back(Instant::now());
    }

    /// Admits `key` immediately when it has capacity.
    ///
    /// # Errors
    ///
    /// Returns the time until capacity frees up when the window is saturated. Nothing is
    /// recorded in that case.
    pub async fn check_key(&self, key: &K) -> Result<(), Duration> {
        let Some(quota) = self.quota(key) else {
            return Ok(());
        };

        let mut windows = self.windows.lock().await;
        let admitted = windows.entry(key.clone()).or_default();
        let now = Instant::now();

        purge_expired(admitted, now, quota.window());

        if admitted.len() >= quota.limit().get() as usize {
            let wait = admitted.front().map_or(Duration::ZERO, |oldest| {
                quota.window().saturating_sub(now.duration_since(*oldest))
            });
            return Err(wait);
        }

        admitted.push_back(now);
        Ok(())
    }

    /// Returns the number of admissions for `key` still inside its window.
    pub async fn window_len(&self, key: &K) -> usize {
        let Some(quota) = self.quota(key) else {
            return 0;
        };

        let mut windows = self.windows.lock().await;
        windows.get_mut(key).map_or(0, |admitted| {
            purge_expired(admitted, Instant::now(), quota.window());
            admitted.len()
        })
    }
}

fn purge_expired(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = admitted.front() {
        if now.duration_since(*oldest) >= window {
            admitted.pop_front();
        } else {
            break;
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, sync::Arc};

    use rstest::rstest;

    use super::*;

    fn per_second(limit: u32) -> Quota {
        Quota::per_second(NonZeroU32::new(limit).unwrap())
    }

    fn limiter(keyed: Vec<(&'static str, u32)>, base: Option<u32>) -> RateLimiter<&'static str> {
        RateLimiter::new_with_quota(
            base.map(per_second),
            keyed.into_iter().map(|(k, l)| (k, per_second(l))).collect(),
        )
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_without_waiting() {
        let limiter = limiter(vec![("orders", 12)], Some(3));
        let start = Instant::now();

        for _ in 0..12 {
            limiter.until_key_ready(&"orders").await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.window_len(&"orders").await, 12);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_waits_for_oldest_to_leave_window() {
        let limiter = limiter(vec![("orders", 12)], Some(3));
        let start = Instant::now();

        for _ in 0..13 {
            limiter.until_key_ready(&"orders").await;
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_100), "{elapsed:?}");
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_default_group_three_per_second() {
        let limiter = limiter(vec![("orders", 12), ("default", 3)], None);
        let start = Instant::now();

        for _ in 0..4 {
            limiter.until_key_ready(&"default").await;
        }

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_keys_are_isolated() {
        let limiter = limiter(vec![("orders", 2), ("default", 2)], None);
        let start = Instant::now();

        limiter.until_key_ready(&"orders").await;
        limiter.until_key_ready(&"orders").await;
        limiter.until_key_ready(&"default").await;
        limiter.until_key_ready(&"default").await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_unknown_key_uses_base_quota() {
        let limiter = limiter(vec![("orders", 12)], Some(1));

        assert_eq!(limiter.quota(&"other").unwrap().limit().get(), 1);
        assert!(limiter.check_key(&"other").await.is_ok());
        assert!(limiter.check_key(&"other").await.is_err());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_unknown_key_without_base_quota_is_unlimited() {
        let limiter = limiter(vec![("orders", 1)], None);

        for _ in 0..100 {
            assert!(limiter.check_key(&"other").await.is_ok());
        }
        assert_eq!(limiter.window_len(&"other").await, 0);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_check_key_reports_wait() {
        let limiter = limiter(vec![("orders", 1)], None);

        assert!(limiter.check_key(&"orders").await.is_ok());
        tokio::time::advance(Duration::from_millis(400)).await;

        let wait = limiter.check_key(&"orders").await.unwrap_err();
        assert_eq!(wait, Duration::from_millis(600));

        tokio::time::advance(wait).await;
        assert!(limiter.check_key(&"orders").await.is_ok());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = limiter(vec![("default", 3)], None);

        for _ in 0..3 {
            limiter.until_key_ready(&"default").await;
        }
        tokio::time::advance(Duration::from_secs(1)).await;

        assert_eq!(limiter.window_len(&"default").await, 0);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_cancelled_acquire_records_nothing() {
        let limiter = limiter(vec![("default", 1)], None);
        limiter.until_key_ready(&"default").await;

        let result =
            tokio::time::timeout(Duration::from_millis(100), limiter.until_key_ready(&"default"))
                .await;

        assert!(result.is_err());
        assert_eq!(limiter.window_len(&"default").await, 1);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquisitions_respect_limit() {
        let limiter = Arc::new(limiter(vec![("orders", 12)], None));
        let start = Instant::now();

        let handles: Vec<_> = (0..24)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.until_key_ready(&"orders").await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::with_capacity(handles.len());
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }

        let within_first_second = admitted
            .iter()
            .filter(|at| at.duration_since(start) < Duration::from_secs(1))
            .count();
        assert_eq!(within_first_second, 12);
    }
}
