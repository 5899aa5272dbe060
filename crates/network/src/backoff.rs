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

//! Provides an implementation of an exponential backoff mechanism with jitter support.
//!
//! The delay grows exponentially from an initial value by a constant factor. Each returned
//! delay adds uniform random jitter to the current base delay and is then capped at the
//! configured maximum, so the cap bounds the jittered value and not only the base.

use std::time::Duration;

use rand::Rng;

/// An exponential backoff mechanism with additive jitter.
///
/// For the `n`th call (starting at zero) the returned delay is
/// `min(initial * factor^n + uniform(0, jitter), max)`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// The initial backoff delay.
    delay_initial: Duration,
    /// The maximum delay, applied after jitter.
    delay_max: Duration,
    /// The current base delay (without jitter).
    delay_current: Duration,
    /// The factor to multiply the delay on each iteration.
    factor: f64,
    /// The maximum random jitter to add (in milliseconds).
    jitter_ms: u64,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `delay_initial` is zero.
    /// - `delay_max` is less than `delay_initial`.
    /// - `factor` is not finite or is less than 1.0.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
    ) -> anyhow::Result<Self> {
        if delay_initial.is_zero() {
            anyhow::bail!("delay_initial must be greater than zero");
        }
        if delay_max < delay_initial {
            anyhow::bail!("delay_max ({delay_max:?}) must be >= delay_initial ({delay_initial:?})");
        }
        if !factor.is_finite() || factor < 1.0 {
            anyhow::bail!("factor must be a finite value >= 1.0, was {factor}");
        }

        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
        })
    }

    /// Returns the next backoff delay with jitter and advances the internal state.
    pub fn next_duration(&mut self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms)
        };
        let delay = std::cmp::min(
            self.delay_current + Duration::from_millis(jitter),
            self.delay_max,
        );

        let max_nanos = self.delay_max.as_nanos() as u64;
        let next_nanos = (self.delay_current.as_nanos() as f64 * self.factor) as u64;
        self.delay_current = Duration::from_nanos(std::cmp::min(next_nanos, max_nanos));

        delay
    }

    /// Resets the backoff to its initial state.
    pub const fn reset(&mut self) {
        self.delay_current = self.delay_initial;
    }

    /// Returns the current base delay without jitter.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }

    /// Returns the maximum delay ever returned by [`Self::next_duration`].
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.delay_max
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_no_jitter_exponential_growth() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(300),
            Duration::from_secs(5),
            2.0,
            0,
        )
        .unwrap();

        let delays: Vec<u128> = (0..6)
            .map(|_| backoff.next_duration().as_millis())
            .collect();

        assert_eq!(delays, vec![300, 600, 1200, 2400, 4800, 5000]);
    }

    #[rstest]
    fn test_reset() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(1600), 2.0, 0)
                .unwrap();

        let _ = backoff.next_duration();
        let _ = backoff.next_duration();
        backoff.reset();

        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
    }

    #[rstest]
    fn test_jitter_within_bounds() {
        for _ in 0..50 {
            let mut backoff = ExponentialBackoff::new(
                Duration::from_millis(300),
                Duration::from_secs(5),
                2.0,
                1_000,
            )
            .unwrap();
            let delay = backoff.next_duration();
            assert!(delay >= Duration::from_millis(300), "{delay:?}");
            assert!(delay <= Duration::from_millis(1_300), "{delay:?}");
        }
    }

    #[rstest]
    fn test_cap_applies_after_jitter() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(4_800), Duration::from_secs(5), 2.0, 1_000)
                .unwrap();

        for _ in 0..20 {
            assert!(backoff.next_duration() <= Duration::from_secs(5));
        }
    }

    #[rstest]
    fn test_factor_less_than_two() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(200), 1.5, 0)
                .unwrap();

        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
        assert_eq!(backoff.next_duration(), Duration::from_millis(150));
        assert_eq!(backoff.next_duration(), Duration::from_millis(200));
        assert_eq!(backoff.current_delay(), Duration::from_millis(200));
    }

    #[rstest]
    #[case::zero_initial(Duration::ZERO, Duration::from_secs(1), 2.0)]
    #[case::max_below_initial(Duration::from_secs(2), Duration::from_secs(1), 2.0)]
    #[case::factor_below_one(Duration::from_millis(100), Duration::from_secs(1), 0.5)]
    #[case::factor_nan(Duration::from_millis(100), Duration::from_secs(1), f64::NAN)]
    fn test_invalid_parameters(
        #[case] initial: Duration,
        #[case] max: Duration,
        #[case] factor: f64,
    ) {
        assert!(ExponentialBackoff::new(initial, max, factor, 0).is_err());
    }
}
