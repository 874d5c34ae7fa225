// Copyright 2025 Google LLC
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

use crate::Result;
use crate::context::Context;
use crate::http::{Request, Response};
use crate::http_client::HttpClient;
use crate::options::{LoggingOptions, RetryOptions, TelemetryOptions};
use crate::policies::{LoggingPolicy, RetryEngine, TelemetryPolicy, TransportPolicy};
use crate::policy::{Next, Policy};
use std::sync::Arc;

/// An immutable, ordered chain of policies ending in the transport.
///
/// Pipelines are cheap to clone and safe to share across tasks. All the
/// calls made by a client go through the same pipeline.
///
/// The canonical order is:
///
/// 1. per-call policies supplied by the application,
/// 2. telemetry,
/// 3. the retry engine,
/// 4. per-retry policies supplied by the application,
/// 5. authentication,
/// 6. logging,
/// 7. the transport.
///
/// Policies before the retry engine run once per call, policies after it run
/// once per attempt.
#[derive(Clone, Debug)]
pub struct Pipeline {
    policies: Arc<[Arc<dyn Policy>]>,
}

impl Pipeline {
    /// Starts building a pipeline that sends requests using `transport`.
    pub fn builder(transport: Arc<dyn HttpClient>) -> PipelineBuilder {
        PipelineBuilder::new(transport)
    }

    /// Creates a pipeline from an explicit list of policies.
    ///
    /// The last policy must not call `next`, typically it is a
    /// [TransportPolicy].
    pub fn from_policies<I: IntoIterator<Item = Arc<dyn Policy>>>(policies: I) -> Self {
        Self {
            policies: policies.into_iter().collect(),
        }
    }

    /// Sends a request through every policy and returns the final response.
    ///
    /// Non-success status codes are returned as responses, it is up to the
    /// caller to convert them into errors.
    pub async fn send(&self, ctx: &Context, request: Request) -> Result<Response> {
        Next::new(&self.policies).send(ctx, request).await
    }

    /// The number of policies in the pipeline.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Assembles a [Pipeline] in the canonical order.
#[derive(Debug)]
pub struct PipelineBuilder {
    transport: Arc<dyn HttpClient>,
    per_call: Vec<Arc<dyn Policy>>,
    telemetry: Option<Arc<dyn Policy>>,
    retry: Option<RetryOptions>,
    per_retry: Vec<Arc<dyn Policy>>,
    authentication: Option<Arc<dyn Policy>>,
    logging: Option<LoggingOptions>,
}

impl PipelineBuilder {
    fn new(transport: Arc<dyn HttpClient>) -> Self {
        Self {
            transport,
            per_call: Vec::new(),
            telemetry: None,
            retry: None,
            per_retry: Vec::new(),
            authentication: None,
            logging: None,
        }
    }

    pub fn with_per_call_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_call.push(policy);
        self
    }

    pub fn with_per_retry_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_retry.push(policy);
        self
    }

    /// Adds the telemetry policy for the given client module and version.
    pub fn with_telemetry(mut self, module: &str, version: &str, options: TelemetryOptions) -> Self {
        self.telemetry = Some(Arc::new(TelemetryPolicy::new(module, version, &options)));
        self
    }

    /// Adds the retry engine. Without it each request is attempted once.
    pub fn with_retry(mut self, options: RetryOptions) -> Self {
        self.retry = Some(options);
        self
    }

    pub fn with_authentication_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.authentication = Some(policy);
        self
    }

    pub fn with_logging(mut self, options: LoggingOptions) -> Self {
        self.logging = Some(options);
        self
    }

    pub fn build(self) -> Pipeline {
        let mut policies = self.per_call;
        policies.extend(self.telemetry);
        if let Some(retry) = self.retry {
            policies.push(Arc::new(RetryEngine::new(&retry)));
        }
        policies.extend(self.per_retry);
        policies.extend(self.authentication);
        if let Some(logging) = self.logging {
            policies.push(Arc::new(LoggingPolicy::new(&logging)));
        }
        policies.push(Arc::new(TransportPolicy::new(self.transport)));
        Pipeline::from_policies(policies)
    }
}
