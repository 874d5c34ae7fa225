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

//! Delays between requests.
//!
//! The retry engine waits between attempts, and the long-running operation
//! poller waits between polls. Both consult a policy only when the service did
//! not send a `Retry-After` header.
//!
//! Retry delays should include jitter, so clients that failed at the same
//! time do not retry at the same time. Polling delays are used as computed.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Computes the delay before the next retry attempt.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the delay after a failed attempt.
    ///
    /// `loop_start` is when the first attempt started, `attempt_count` is the
    /// number of attempts so far, starting at 1.
    fn on_failure(&self, loop_start: Instant, attempt_count: u32) -> Duration;
}

/// Computes the delay before the next poll of a long-running operation.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the delay after `attempt_count` polls.
    ///
    /// The poller also calls this before the first poll, with
    /// `attempt_count == 1`.
    fn wait_period(&self, loop_start: Instant, attempt_count: u32) -> Duration;
}

/// Accepts both owned and shared [BackoffPolicy] values in option setters.
#[derive(Clone, Debug)]
pub struct BackoffPolicyArg(pub(crate) Arc<dyn BackoffPolicy>);

impl<T: BackoffPolicy + 'static> From<T> for BackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl From<Arc<dyn BackoffPolicy>> for BackoffPolicyArg {
    fn from(value: Arc<dyn BackoffPolicy>) -> Self {
        Self(value)
    }
}

impl From<BackoffPolicyArg> for Arc<dyn BackoffPolicy> {
    fn from(value: BackoffPolicyArg) -> Self {
        value.0
    }
}

/// Accepts both owned and shared [PollingBackoffPolicy] values in option
/// setters.
#[derive(Clone, Debug)]
pub struct PollingBackoffPolicyArg(pub(crate) Arc<dyn PollingBackoffPolicy>);

impl<T: PollingBackoffPolicy + 'static> From<T> for PollingBackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl From<Arc<dyn PollingBackoffPolicy>> for PollingBackoffPolicyArg {
    fn from(value: Arc<dyn PollingBackoffPolicy>) -> Self {
        Self(value)
    }
}

impl From<PollingBackoffPolicyArg> for Arc<dyn PollingBackoffPolicy> {
    fn from(value: PollingBackoffPolicyArg) -> Self {
        value.0
    }
}

/// Waits the same amount of time before every request.
///
/// # Example
/// ```
/// # use azure_rest_gax::backoff_policy::{BackoffPolicy, FixedDelay};
/// # use std::time::Duration;
/// let policy = FixedDelay::new(Duration::from_millis(250));
/// let start = tokio::time::Instant::now();
/// assert_eq!(policy.on_failure(start, 1), Duration::from_millis(250));
/// assert_eq!(policy.on_failure(start, 7), Duration::from_millis(250));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedDelay(Duration);

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self(delay)
    }

    pub fn delay(&self) -> Duration {
        self.0
    }
}

impl BackoffPolicy for FixedDelay {
    fn on_failure(&self, _loop_start: Instant, _attempt_count: u32) -> Duration {
        self.0
    }
}

impl PollingBackoffPolicy for FixedDelay {
    fn wait_period(&self, _loop_start: Instant, _attempt_count: u32) -> Duration {
        self.0
    }
}
