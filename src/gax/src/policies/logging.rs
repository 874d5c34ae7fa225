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
use crate::options::LoggingOptions;
use crate::policy::{Next, Policy};
use http::HeaderMap;
use std::collections::{BTreeMap, HashSet};
use url::Url;

const REDACTED: &str = "REDACTED";

/// Logs each attempt at `debug` level.
///
/// Values of headers and query parameters missing from the allow lists are
/// replaced with `REDACTED`. The `Authorization` header is never logged.
#[derive(Debug)]
pub struct LoggingPolicy {
    allowed_headers: HashSet<String>,
    allowed_query_params: HashSet<String>,
}

impl LoggingPolicy {
    pub fn new(options: &LoggingOptions) -> Self {
        Self {
            allowed_headers: options
                .allowed_headers()
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .filter(|h| h != "authorization")
                .collect(),
            allowed_query_params: options
                .allowed_query_params()
                .iter()
                .map(|q| q.to_ascii_lowercase())
                .collect(),
        }
    }

    fn redact_url(&self, url: &Url) -> String {
        if url.query().is_none() {
            return url.to_string();
        }
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if self.allowed_query_params.contains(&k.to_ascii_lowercase()) {
                    v.into_owned()
                } else {
                    REDACTED.to_string()
                };
                (k.into_owned(), v)
            })
            .collect();
        let mut redacted = url.clone();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
        redacted.to_string()
    }

    fn redact_headers<'a>(&self, headers: &'a HeaderMap) -> BTreeMap<&'a str, &'a str> {
        headers
            .iter()
            .filter(|(name, _)| name.as_str() != "authorization")
            .map(|(name, value)| {
                let value = if self.allowed_headers.contains(name.as_str()) && !value.is_sensitive()
                {
                    value.to_str().unwrap_or(REDACTED)
                } else {
                    REDACTED
                };
                (name.as_str(), value)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Policy for LoggingPolicy {
    async fn send(&self, ctx: &Context, request: Request, next: Next<'_>) -> Result<Response> {
        tracing::debug!(
            method = %request.method(),
            url = %self.redact_url(request.url()),
            headers = ?self.redact_headers(request.headers()),
            "sending request"
        );
        let start = tokio::time::Instant::now();
        let result = next.send(ctx, request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => tracing::debug!(
                status = response.status().as_u16(),
                elapsed_ms,
                headers = ?self.redact_headers(response.headers()),
                "received response"
            ),
            Err(e) => tracing::debug!(elapsed_ms, error = %e, "request attempt failed"),
        }
        result
    }
}
