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

use crate::credentials::TokenCredential;
use crate::token_cache::TokenCache;
use gax::Result;
use gax::cloud::ServiceConfiguration;
use gax::context::Context;
use gax::error::Error;
use gax::http::{Request, Response};
use gax::policy::{Next, Policy};
use http::HeaderValue;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use std::sync::Arc;
use std::time::Duration;

/// Tokens are refreshed when they expire within this window.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(thiserror::Error, Debug)]
#[error("bearer token authentication requires https, the request URL scheme is {0:?}")]
struct InsecureScheme(String);

/// Authorizes each attempt with a bearer token from a [TokenCredential].
///
/// The policy caches tokens and refreshes them shortly before they expire.
/// Concurrent requests needing a refresh share a single call to the
/// credential. A `401 Unauthorized` response with a `WWW-Authenticate`
/// challenge discards the cached token, so the next attempt fetches a new one.
///
/// Credential failures are returned as non-retryable
/// [authentication][Error::is_authentication] errors.
///
/// # Example
/// ```
/// # use azure_rest_auth::bearer_token::BearerTokenPolicy;
/// # use azure_rest_auth::credentials::TokenCredential;
/// # use gax::pipeline::Pipeline;
/// # use std::sync::Arc;
/// # fn sample(credential: Arc<dyn TokenCredential>, transport: Arc<dyn gax::http_client::HttpClient>) -> Pipeline {
/// let policy = BearerTokenPolicy::new(credential, ["https://management.azure.com/.default"]);
/// Pipeline::builder(transport)
///     .with_authentication_policy(Arc::new(policy))
///     .build()
/// # }
/// ```
#[derive(Debug)]
pub struct BearerTokenPolicy {
    cache: TokenCache,
    scopes: Vec<String>,
    insecure_http: bool,
}

impl BearerTokenPolicy {
    pub fn new<I, S>(credential: Arc<dyn TokenCredential>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache: TokenCache::new(credential, DEFAULT_REFRESH_WINDOW),
            scopes: scopes.into_iter().map(Into::into).collect(),
            insecure_http: false,
        }
    }

    /// Creates a policy requesting tokens for the audience of `service`.
    ///
    /// Use it with [ServiceClient::for_service][gax::client::ServiceClient::for_service]
    /// so the token audience always matches the cloud of the endpoint.
    pub fn for_service(credential: Arc<dyn TokenCredential>, service: &ServiceConfiguration) -> Self {
        Self::new(credential, [service.scope()])
    }

    /// Changes how long before expiration tokens are refreshed.
    pub fn with_refresh_window(mut self, v: Duration) -> Self {
        self.cache.set_refresh_window(v);
        self
    }

    /// Allows sending tokens over plain `http`. Only useful for tests against
    /// local emulators.
    pub fn with_insecure_http(mut self, v: bool) -> Self {
        self.insecure_http = v;
        self
    }

    async fn authorization(&self) -> Result<HeaderValue> {
        let token = self
            .cache
            .get_token(&self.scopes)
            .await
            .map_err(Error::authentication)?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.token))
            .map_err(Error::authentication)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[async_trait::async_trait]
impl Policy for BearerTokenPolicy {
    async fn send(&self, ctx: &Context, mut request: Request, next: Next<'_>) -> Result<Response> {
        let scheme = request.url().scheme();
        if scheme != "https" && !self.insecure_http {
            return Err(Error::authentication(InsecureScheme(scheme.to_string())));
        }
        let value = ctx.run(self.authorization()).await?;
        request.insert_header(AUTHORIZATION, value);

        let response = next.send(ctx, request).await?;
        if response.status() == http::StatusCode::UNAUTHORIZED
            && response.headers().contains_key(WWW_AUTHENTICATE)
        {
            tracing::debug!("received an authentication challenge, discarding the cached token");
            self.cache
                .invalidate(&self.scopes)
                .map_err(Error::authentication)?;
        }
        Ok(response)
    }
}
