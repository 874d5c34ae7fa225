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

use crate::Result;
use crate::token::AccessToken;

/// Produces access tokens for a set of scopes.
///
/// Implementations fetch tokens from an identity provider, e.g. a client
/// secret flow or a managed identity endpoint. They do not need to cache the
/// tokens, the [BearerTokenPolicy][crate::bearer_token::BearerTokenPolicy]
/// does that, and guarantees that concurrent callers share a single refresh.
///
/// # Example
/// ```
/// # use azure_rest_auth::credentials::TokenCredential;
/// # use azure_rest_auth::token::AccessToken;
/// #[derive(Debug)]
/// struct Fixed;
///
/// #[async_trait::async_trait]
/// impl TokenCredential for Fixed {
///     async fn get_token(&self, _scopes: &[String]) -> azure_rest_auth::Result<AccessToken> {
///         let expires_on = time::OffsetDateTime::now_utc() + std::time::Duration::from_secs(3600);
///         Ok(AccessToken::new("fixed-token", expires_on))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait TokenCredential: std::fmt::Debug + Send + Sync {
    /// Returns a token valid for `scopes`.
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken>;
}
