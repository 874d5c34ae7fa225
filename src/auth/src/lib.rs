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

//! Authentication for Azure REST clients.
//!
//! Credential providers implement [TokenCredential][credentials::TokenCredential].
//! The [BearerTokenPolicy][bearer_token::BearerTokenPolicy] uses a credential
//! to authorize every attempt sent through a pipeline, caching the tokens
//! until they are about to expire.

/// Errors returned by credential providers.
pub mod errors {
    pub use gax::error::CredentialsError;
}

/// The trait implemented by credential providers.
pub mod credentials;

/// Access tokens returned by credentials.
pub mod token;

/// The pipeline policy authorizing requests with bearer tokens.
pub mod bearer_token;

pub(crate) mod token_cache;

/// A `Result` alias where the `Err` case is [CredentialsError][errors::CredentialsError].
pub type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;
