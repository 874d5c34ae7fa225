// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Truncated exponential backoff.
//!
//! After attempt `n` (starting at 1) the base delay is
//! `initial_delay * multiplier^(n-1)`, never more than `maximum_delay`. As a
//! [BackoffPolicy] the delay is drawn uniformly from `[0, base]` (full
//! jitter). As a [PollingBackoffPolicy] the base delay is used unchanged.

use crate::backoff_policy::{BackoffPolicy, PollingBackoffPolicy};
use std::time::Duration;
use tokio::time::Instant;

/// Invalid [ExponentialBackoffBuilder] parameters.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum BackoffError {
    #[error("the multiplier must be at least 1.0, got {0}")]
    Multiplier(f64),
    #[error("the initial delay must be positive")]
    ZeroInitialDelay,
    #[error("the maximum delay ({maximum:?}) is shorter than the initial delay ({initial:?})")]
    MaximumBelowInitial { initial: Duration, maximum: Duration },
}

/// Configures an [ExponentialBackoff].
///
/// # Example
/// ```
/// # use azure_rest_gax::exponential_backoff::ExponentialBackoffBuilder;
/// # use std::time::Duration;
/// let backoff = ExponentialBackoffBuilder::new()
///     .with_initial_delay(Duration::from_millis(800))
///     .with_maximum_delay(Duration::from_secs(60))
///     .build()?;
/// assert_eq!(backoff.delay(3), Duration::from_millis(3200));
/// # Ok::<(), azure_rest_gax::exponential_backoff::BackoffError>(())
/// ```
#[derive(Clone, Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    multiplier: f64,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExponentialBackoffBuilder {
    /// Starts from one second, doubling up to one minute.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }

    pub fn with_initial_delay(mut self, v: Duration) -> Self {
        self.initial_delay = v;
        self
    }

    pub fn with_maximum_delay(mut self, v: Duration) -> Self {
        self.maximum_delay = v;
        self
    }

    pub fn with_multiplier(mut self, v: f64) -> Self {
        self.multiplier = v;
        self
    }

    /// Validates the parameters.
    pub fn build(self) -> Result<ExponentialBackoff, BackoffError> {
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(BackoffError::Multiplier(self.multiplier));
        }
        if self.initial_delay.is_zero() {
            return Err(BackoffError::ZeroInitialDelay);
        }
        if self.maximum_delay < self.initial_delay {
            return Err(BackoffError::MaximumBelowInitial {
                initial: self.initial_delay,
                maximum: self.maximum_delay,
            });
        }
        Ok(ExponentialBackoff {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            multiplier: self.multiplier,
        })
    }

    /// Builds a policy, replacing invalid parameters with the closest valid
    /// ones.
    ///
    /// The initial delay is at least one millisecond, the maximum delay is at
    /// least the initial delay, and the multiplier is in `[1.0, 32.0]`.
    pub fn clamp(self) -> ExponentialBackoff {
        let initial_delay = self.initial_delay.max(Duration::from_millis(1));
        let multiplier = if self.multiplier.is_nan() {
            1.0
        } else {
            self.multiplier.clamp(1.0, 32.0)
        };
        ExponentialBackoff {
            initial_delay,
            maximum_delay: self.maximum_delay.max(initial_delay),
            multiplier,
        }
    }
}

/// Truncated exponential backoff, see the [module documentation][self].
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    multiplier: f64,
}

impl Default for ExponentialBackoff {
    /// The polling defaults: one second, doubling up to one minute.
    fn default() -> Self {
        ExponentialBackoffBuilder::new().clamp()
    }
}

impl ExponentialBackoff {
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn maximum_delay(&self) -> Duration {
        self.maximum_delay
    }

    /// The delay after `attempt_count` attempts, before any jitter.
    pub fn delay(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        // Overflows and infinities saturate at the maximum.
        Duration::try_from_secs_f64(secs).map_or(self.maximum_delay, |d| d.min(self.maximum_delay))
    }

    fn jittered<R: rand::Rng>(&self, attempt_count: u32, rng: &mut R) -> Duration {
        rng.random_range(Duration::ZERO..=self.delay(attempt_count))
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn on_failure(&self, _loop_start: Instant, attempt_count: u32) -> Duration {
        self.jittered(attempt_count, &mut rand::rng())
    }
}

impl PollingBackoffPolicy for ExponentialBackoff {
    fn wait_period(&self, _loop_start: Instant, attempt_count: u32) -> Duration {
        self.delay(attempt_count)
    }
}
