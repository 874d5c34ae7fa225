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

//! Client configuration and per-pipeline options.
//!
//! Applications configure a client once, at construction time. The options
//! are immutable afterwards: the pipeline built from them is shared by all
//! the calls made through the client.
//!
//! # Example
//! ```
//! # use azure_rest_gax::options::*;
//! use std::time::Duration;
//! let options = ClientOptions::default()
//!     .set_retry(RetryOptions::default()
//!         .set_max_attempts(5)
//!         .set_initial_delay(Duration::from_millis(100)))
//!     .set_telemetry(TelemetryOptions::default().set_application_id("my-app"));
//! assert_eq!(options.retry().max_attempts(), 5);
//! ```

use crate::Result;
use crate::backoff_policy::{BackoffPolicy, BackoffPolicyArg};
use crate::cloud::{CloudConfiguration, ServiceConfiguration};
use crate::error::Error;
use crate::exponential_backoff::ExponentialBackoffBuilder;
use crate::http_client::{HttpClient, ReqwestClient};
use crate::pipeline::Pipeline;
use crate::policy::Policy;
use crate::retry_policy::{
    AzureRetryPolicy, DEFAULT_RETRY_STATUS_CODES, RetryPolicy, RetryPolicyArg, RetryPolicyExt,
};
use std::sync::Arc;
use std::time::Duration;

/// Configures the retry engine.
///
/// The defaults are three total attempts, an initial backoff of 800ms, a
/// maximum backoff of 60s, and retries on `408`, `429`, `500`, `502`, `503`,
/// and `504`.
///
/// A custom [RetryPolicy] or [BackoffPolicy] replaces the policy derived
/// from the other fields.
#[derive(Clone, Debug)]
pub struct RetryOptions {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    status_codes: Vec<u16>,
    retry_non_idempotent: bool,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff_policy: Option<Arc<dyn BackoffPolicy>>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(60),
            status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
            retry_non_idempotent: false,
            retry_policy: None,
            backoff_policy: None,
        }
    }
}

impl RetryOptions {
    /// Disables retries, each request is attempted once.
    pub fn no_retries() -> Self {
        Self::default().set_max_attempts(1)
    }

    /// The maximum number of attempts, including the first attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sets the maximum number of attempts. Values below 1 are treated as 1.
    pub fn set_max_attempts(mut self, v: u32) -> Self {
        self.max_attempts = v.max(1);
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Sets the backoff delay after the first failed attempt.
    pub fn set_initial_delay(mut self, v: Duration) -> Self {
        self.initial_delay = v;
        self
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Sets the maximum backoff delay.
    ///
    /// Delays requested by the service through `Retry-After` are capped at
    /// this value multiplied by the number of remaining attempts.
    pub fn set_max_delay(mut self, v: Duration) -> Self {
        self.max_delay = v;
        self
    }

    pub fn status_codes(&self) -> &[u16] {
        &self.status_codes
    }

    /// Sets the status codes considered for retry.
    pub fn set_status_codes<I: IntoIterator<Item = u16>>(mut self, v: I) -> Self {
        self.status_codes = v.into_iter().collect();
        self
    }

    pub fn retry_non_idempotent(&self) -> bool {
        self.retry_non_idempotent
    }

    /// Retry `POST` and `PATCH` requests on `408` and `5xx` statuses.
    ///
    /// Only use this option if the service guarantees these requests are safe
    /// to repeat.
    pub fn set_retry_non_idempotent(mut self, v: bool) -> Self {
        self.retry_non_idempotent = v;
        self
    }

    /// Replaces the retry policy.
    ///
    /// The maximum number of attempts still applies.
    pub fn set_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        self.retry_policy = Some(v.into().0);
        self
    }

    /// Replaces the backoff policy.
    pub fn set_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff_policy = Some(v.into().0);
        self
    }

    /// The policy classifying failures, limited to `max_attempts`.
    pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        match &self.retry_policy {
            Some(p) => Arc::new(ArcPolicy(p.clone()).with_attempt_limit(self.max_attempts)),
            None => Arc::new(
                AzureRetryPolicy::new(self.status_codes.iter().copied())
                    .with_retry_non_idempotent(self.retry_non_idempotent)
                    .with_attempt_limit(self.max_attempts),
            ),
        }
    }

    /// The policy computing delays when the service does not request one.
    pub fn backoff_policy(&self) -> Arc<dyn BackoffPolicy> {
        if let Some(p) = &self.backoff_policy {
            return p.clone();
        }
        let max_delay = std::cmp::max(self.max_delay, self.initial_delay);
        Arc::new(
            ExponentialBackoffBuilder::new()
                .with_initial_delay(self.initial_delay)
                .with_maximum_delay(max_delay)
                .with_multiplier(2.0)
                .build()
                .unwrap_or_else(|_| {
                    ExponentialBackoffBuilder::new()
                        .with_initial_delay(self.initial_delay)
                        .with_maximum_delay(max_delay)
                        .clamp()
                }),
        )
    }
}

// Lets a shared custom policy be decorated by value.
#[derive(Debug)]
struct ArcPolicy(Arc<dyn RetryPolicy>);

impl RetryPolicy for ArcPolicy {
    fn on_error(
        &self,
        state: &crate::retry_state::RetryState,
        error: &crate::error::Error,
    ) -> crate::retry_result::RetryResult {
        self.0.on_error(state, error)
    }

    fn on_status(
        &self,
        state: &crate::retry_state::RetryState,
        status: http::StatusCode,
    ) -> crate::retry_result::RetryResult {
        self.0.on_status(state, status)
    }
}

/// Configures the telemetry policy.
#[derive(Clone, Debug, Default)]
pub struct TelemetryOptions {
    application_id: Option<String>,
    disabled: bool,
}

impl TelemetryOptions {
    /// The application id prepended to the `User-Agent` header.
    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    /// Sets the application id prepended to the `User-Agent` header.
    pub fn set_application_id<T: Into<String>>(mut self, v: T) -> Self {
        self.application_id = Some(v.into());
        self
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Disables the `User-Agent` telemetry. The client request id is still
    /// sent.
    pub fn set_disabled(mut self, v: bool) -> Self {
        self.disabled = v;
        self
    }
}

/// The headers logged with their values by default.
pub const DEFAULT_ALLOWED_HEADERS: [&str; 20] = [
    "accept",
    "cache-control",
    "connection",
    "content-length",
    "content-type",
    "date",
    "etag",
    "expires",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-unmodified-since",
    "last-modified",
    "retry-after",
    "server",
    "transfer-encoding",
    "user-agent",
    "www-authenticate",
    "x-ms-request-id",
    "x-ms-client-request-id",
];

/// The query parameters logged with their values by default.
pub const DEFAULT_ALLOWED_QUERY_PARAMS: [&str; 1] = ["api-version"];

/// Configures the logging policy.
///
/// Header and query parameter values not in the allow lists are logged as
/// `REDACTED`. The `Authorization` header is never logged, even if it appears
/// in the allow list.
#[derive(Clone, Debug)]
pub struct LoggingOptions {
    allowed_headers: Vec<String>,
    allowed_query_params: Vec<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            allowed_headers: DEFAULT_ALLOWED_HEADERS.iter().map(|s| s.to_string()).collect(),
            allowed_query_params: DEFAULT_ALLOWED_QUERY_PARAMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl LoggingOptions {
    pub fn allowed_headers(&self) -> &[String] {
        &self.allowed_headers
    }

    /// Adds headers to the allow list. Names are case-insensitive.
    pub fn add_allowed_headers<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_headers
            .extend(v.into_iter().map(|s| s.into().to_ascii_lowercase()));
        self
    }

    pub fn allowed_query_params(&self) -> &[String] {
        &self.allowed_query_params
    }

    /// Adds query parameters to the allow list. Names are case-insensitive.
    pub fn add_allowed_query_params<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_query_params
            .extend(v.into_iter().map(|s| s.into().to_ascii_lowercase()));
        self
    }
}

/// The configuration shared by all the Azure REST clients.
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    cloud: CloudConfiguration,
    retry: RetryOptions,
    telemetry: TelemetryOptions,
    logging: LoggingOptions,
    per_call_policies: Vec<Arc<dyn Policy>>,
    per_retry_policies: Vec<Arc<dyn Policy>>,
    transport: Option<Arc<dyn HttpClient>>,
}

impl ClientOptions {
    pub fn cloud(&self) -> &CloudConfiguration {
        &self.cloud
    }

    /// Sets the cloud environment, the default is the Azure public cloud.
    pub fn set_cloud(mut self, v: CloudConfiguration) -> Self {
        self.cloud = v;
        self
    }

    /// The configuration of `name` in the selected cloud.
    ///
    /// Returns a usage error if the cloud does not define the service.
    pub fn service(&self, name: &str) -> Result<&ServiceConfiguration> {
        self.cloud.service(name).ok_or_else(|| {
            Error::usage(format!("the cloud configuration has no {name:?} service"))
        })
    }

    pub fn retry(&self) -> &RetryOptions {
        &self.retry
    }

    pub fn set_retry(mut self, v: RetryOptions) -> Self {
        self.retry = v;
        self
    }

    pub fn telemetry(&self) -> &TelemetryOptions {
        &self.telemetry
    }

    pub fn set_telemetry(mut self, v: TelemetryOptions) -> Self {
        self.telemetry = v;
        self
    }

    pub fn logging(&self) -> &LoggingOptions {
        &self.logging
    }

    pub fn set_logging(mut self, v: LoggingOptions) -> Self {
        self.logging = v;
        self
    }

    /// Adds a policy that runs once per call, before the retry engine.
    pub fn add_per_call_policy<P: Policy + 'static>(mut self, v: P) -> Self {
        self.per_call_policies.push(Arc::new(v));
        self
    }

    /// Adds a policy that runs on every attempt, after the retry engine.
    pub fn add_per_retry_policy<P: Policy + 'static>(mut self, v: P) -> Self {
        self.per_retry_policies.push(Arc::new(v));
        self
    }

    /// Replaces the default transport.
    pub fn set_transport<T: HttpClient + 'static>(mut self, v: T) -> Self {
        self.transport = Some(Arc::new(v));
        self
    }

    /// Replaces the default transport with a shared one.
    pub fn set_shared_transport(mut self, v: Arc<dyn HttpClient>) -> Self {
        self.transport = Some(v);
        self
    }

    /// Builds the pipeline for a client.
    ///
    /// # Parameters
    /// * `module` - the client module name, used in the `User-Agent` header.
    /// * `version` - the client module version.
    /// * `auth` - the authentication policy, if the client needs one.
    pub fn build_pipeline(
        &self,
        module: &str,
        version: &str,
        auth: Option<Arc<dyn Policy>>,
    ) -> Result<Pipeline> {
        let transport: Arc<dyn HttpClient> = match &self.transport {
            Some(t) => t.clone(),
            None => Arc::new(ReqwestClient::new()?),
        };
        let mut builder = Pipeline::builder(transport)
            .with_telemetry(module, version, self.telemetry.clone())
            .with_retry(self.retry.clone())
            .with_logging(self.logging.clone());
        for p in &self.per_call_policies {
            builder = builder.with_per_call_policy(p.clone());
        }
        for p in &self.per_retry_policies {
            builder = builder.with_per_retry_policy(p.clone());
        }
        if let Some(auth) = auth {
            builder = builder.with_authentication_policy(auth);
        }
        Ok(builder.build())
    }
}
