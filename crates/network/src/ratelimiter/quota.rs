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

use std::{num::NonZeroU32, time::Duration};

/// A rate-limiting quota.
///
/// Quotas are expressed as a positive number of admissions permitted within any trailing window
/// of the given length. A quota of `Quota::per_second(12)` admits at most twelve acquisitions in
/// every one second interval, with no smoothing inside the window.
///
/// Neither the limit nor the window may be zero.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Quota {
    pub(crate) limit: NonZeroU32,
    pub(crate) window: Duration,
}

impl Quota {
    /// Constructs a quota admitting `limit` acquisitions per second.
    #[must_use]
    pub const fn per_second(limit: NonZeroU32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(1),
        }
    }

    /// Constructs a quota admitting `limit` acquisitions per `window`.
    ///
    /// Returns `None` if `window` is zero.
    #[must_use]
    pub const fn with_window(limit: NonZeroU32, window: Duration) -> Option<Self> {
        if window.is_zero() {
            return None;
        }
        Some(Self { limit, window })
    }

    /// The number of acquisitions admitted per window.
    #[must_use]
    pub const fn limit(&self) -> NonZeroU32 {
        self.limit
    }

    /// The length of the trailing window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}
