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
use crate::options::TelemetryOptions;
use crate::policy::{Next, Policy};
use http::HeaderValue;
use http::header::USER_AGENT;
use tracing::{Instrument, Span, field};

/// The header carrying the client-generated request id.
pub const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

const MAX_APPLICATION_ID_LEN: usize = 24;

/// Sets the `User-Agent` and `x-ms-client-request-id` headers, and wraps the
/// call in a `tracing` span.
///
/// The policy runs once per call, so all the attempts share the same client
/// request id.
#[derive(Debug)]
pub struct TelemetryPolicy {
    user_agent: Option<HeaderValue>,
}

impl TelemetryPolicy {
    pub fn new(module: &str, version: &str, options: &TelemetryOptions) -> Self {
        let user_agent = if options.disabled() {
            None
        } else {
            HeaderValue::from_str(&user_agent(module, version, options.application_id())).ok()
        };
        Self { user_agent }
    }
}

fn user_agent(module: &str, version: &str, application_id: Option<&str>) -> String {
    let sdk = format!(
        "azsdk-rust-{module}/{version} ({}; {})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    match application_id {
        None | Some("") => sdk,
        Some(id) => {
            let id: String = id
                .chars()
                .take(MAX_APPLICATION_ID_LEN)
                .map(|c| if c == ' ' { '/' } else { c })
                .collect();
            format!("{id} {sdk}")
        }
    }
}

#[async_trait::async_trait]
impl Policy for TelemetryPolicy {
    async fn send(&self, ctx: &Context, mut request: Request, next: Next<'_>) -> Result<Response> {
        if let Some(ua) = &self.user_agent {
            let value = match request
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
            {
                Some(existing) if !existing.is_empty() => {
                    let ours = ua.to_str().unwrap_or_default();
                    HeaderValue::from_str(&format!("{ours} {existing}")).unwrap_or_else(|_| ua.clone())
                }
                _ => ua.clone(),
            };
            request.headers_mut().insert(USER_AGENT, value);
        }
        if !request.headers().contains_key(CLIENT_REQUEST_ID) {
            let id = uuid::Uuid::new_v4().to_string();
            if let Ok(v) = HeaderValue::from_str(&id) {
                request.headers_mut().insert(CLIENT_REQUEST_ID, v);
            }
        }

        let span = tracing::info_span!(
            "azure_rest_call",
            http.request.method = request.method().as_str(),
            server.address = request.url().host_str().unwrap_or(""),
            client_request_id = request
                .headers()
                .get(CLIENT_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(""),
            http.response.status_code = field::Empty,
            error_kind = field::Empty,
            elapsed_ms = field::Empty,
        );
        let start = tokio::time::Instant::now();
        let result = next.send(ctx, request).instrument(span.clone()).await;
        record_outcome(&span, &result, start.elapsed());
        result
    }
}

fn record_outcome(span: &Span, result: &Result<Response>, elapsed: std::time::Duration) {
    span.record("elapsed_ms", elapsed.as_millis() as u64);
    match result {
        Ok(response) => {
            span.record("http.response.status_code", response.status().as_u16() as i64);
        }
        Err(e) => {
            span.record("error_kind", field::debug(e.kind()));
            if let Some(code) = e.http_status_code() {
                span.record("http.response.status_code", code as i64);
            }
        }
    }
}
