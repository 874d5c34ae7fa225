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

//! Defines the trait for retry policies and the default Azure policy.
//!
//! The retry engine asks the policy about each failed attempt. A failure is
//! either an [Error] (the request never produced a response) or a response
//! with a non-success status code.
//!
//! Policies compose: [LimitedAttemptCount] decorates any policy and stops
//! the loop after a fixed number of attempts.
//!
//! # Example
//! ```
//! # use azure_rest_gax::retry_policy::*;
//! # use azure_rest_gax::retry_state::RetryState;
//! let policy = AzureRetryPolicy::default().with_attempt_limit(3);
//! let state = RetryState::new(true).set_attempt_count(1_u32);
//! let flow = policy.on_status(&state, http::StatusCode::SERVICE_UNAVAILABLE);
//! assert!(flow.is_continue());
//! let state = RetryState::new(true).set_attempt_count(3_u32);
//! let flow = policy.on_status(&state, http::StatusCode::SERVICE_UNAVAILABLE);
//! assert!(flow.is_exhausted());
//! ```

use crate::error::Error;
use crate::retry_result::RetryResult;
use crate::retry_state::RetryState;
use http::StatusCode;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The status codes retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Determines how errors and non-success responses are handled in the retry
/// loop.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Query the retry policy after an error.
    ///
    /// # Parameters
    /// * `state` - the state of the retry loop, including the number of
    ///   attempts so far, and whether the request is idempotent.
    /// * `error` - the error from the last attempt.
    fn on_error(&self, state: &RetryState, error: &Error) -> RetryResult;

    /// Query the retry policy after a response with a non-success status.
    fn on_status(&self, state: &RetryState, status: StatusCode) -> RetryResult;
}

/// A helper type to use [RetryPolicy] in client and request options.
#[derive(Clone, Debug)]
pub struct RetryPolicyArg(pub(crate) Arc<dyn RetryPolicy>);

impl<T: RetryPolicy + 'static> std::convert::From<T> for RetryPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn RetryPolicy>> for RetryPolicyArg {
    fn from(value: Arc<dyn RetryPolicy>) -> Self {
        Self(value)
    }
}

/// Extension trait for [RetryPolicy].
pub trait RetryPolicyExt: RetryPolicy + Sized {
    /// Decorate a [RetryPolicy] to limit the number of attempts.
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: RetryPolicy> RetryPolicyExt for T {}

/// The default classification of Azure failures.
///
/// * Transport errors are retried, the request may not have reached the
///   service, and the connection may recover.
/// * `429 Too Many Requests` is always retried, the service did not process
///   the request.
/// * `408` and `5xx` statuses in the configured set are retried for
///   idempotent requests. Non-idempotent requests are retried only if the
///   policy is configured to do so.
/// * Everything else, including timeouts and cancellations, is permanent.
#[derive(Clone, Debug)]
pub struct AzureRetryPolicy {
    status_codes: BTreeSet<u16>,
    retry_non_idempotent: bool,
}

impl AzureRetryPolicy {
    /// Creates a policy retrying only the given status codes.
    pub fn new<I: IntoIterator<Item = u16>>(status_codes: I) -> Self {
        Self {
            status_codes: status_codes.into_iter().collect(),
            retry_non_idempotent: false,
        }
    }

    /// Retry non-idempotent requests on `408` and `5xx` statuses.
    pub fn with_retry_non_idempotent(mut self, v: bool) -> Self {
        self.retry_non_idempotent = v;
        self
    }
}

impl Default for AzureRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_STATUS_CODES)
    }
}

impl RetryPolicy for AzureRetryPolicy {
    fn on_error(&self, _state: &RetryState, error: &Error) -> RetryResult {
        if error.is_transport() {
            RetryResult::Continue
        } else {
            RetryResult::Permanent
        }
    }

    fn on_status(&self, state: &RetryState, status: StatusCode) -> RetryResult {
        if !self.status_codes.contains(&status.as_u16()) {
            return RetryResult::Permanent;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return RetryResult::Continue;
        }
        if state.idempotent || self.retry_non_idempotent {
            RetryResult::Continue
        } else {
            RetryResult::Permanent
        }
    }
}

/// A retry policy decorator that limits the total number of attempts.
///
/// This policy decorates an inner policy and limits the total number of
/// attempts. Note that `on_error()` and `on_status()` are not called before
/// the initial (non-retry) attempt. Therefore, setting the maximum number of
/// attempts to 0 or 1 results in no retry attempts.
///
/// The policy passes through the results from the inner policy as long as
/// `attempt_count < maximum_attempts`. Once the maximum number of attempts is
/// reached, the policy returns [Exhausted][RetryResult::Exhausted] if the
/// inner policy returns [Continue][RetryResult::Continue].
#[derive(Clone, Debug)]
pub struct LimitedAttemptCount<P = AzureRetryPolicy>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_attempts: u32) -> Self {
        Self {
            inner: AzureRetryPolicy::default(),
            maximum_attempts,
        }
    }
}

impl<P> LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    fn limit(&self, state: &RetryState, result: RetryResult) -> RetryResult {
        match result {
            RetryResult::Continue if state.attempt_count >= self.maximum_attempts => {
                RetryResult::Exhausted
            }
            r => r,
        }
    }
}

impl<P> RetryPolicy for LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    fn on_error(&self, state: &RetryState, error: &Error) -> RetryResult {
        self.limit(state, self.inner.on_error(state, error))
    }

    fn on_status(&self, state: &RetryState, status: StatusCode) -> RetryResult {
        self.limit(state, self.inner.on_status(state, status))
    }
}
