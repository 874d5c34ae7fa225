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

//! Azure REST pipeline helpers.
//!
//! This crate contains the types and functions shared by every Azure REST
//! client: the request [pipeline][pipeline::Pipeline] and its
//! [policies][policy::Policy], the retry engine, the structured error type,
//! the [pager][pager::Pager], and the glue used by per-service clients.
//!
//! Authentication lives in a separate crate (`azure-rest-auth`), and so does
//! the long-running operation poller (`azure-rest-lro`). Both build on the
//! types defined here.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions sending requests.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by the clients.
pub mod error;

/// Cancellation and deadlines for a single call.
pub mod context;

/// The request and response types flowing through the pipeline.
pub mod http;

/// Defines the transport trait and the default `reqwest`-based transport.
pub mod http_client;

/// The middleware trait implemented by every pipeline step.
pub mod policy;

/// The ordered policy chain held by each client.
pub mod pipeline;

/// The policies installed by default in every pipeline.
pub mod policies;

/// Configuration records for clients and pipelines.
pub mod options;

/// Cloud environment endpoints, injected at client construction.
pub mod cloud;

/// Helpers used by per-service clients to build and decode requests.
pub mod client;

/// A lazy cursor over paginated list operations.
pub mod pager;

pub mod backoff_policy;
pub mod exponential_backoff;
pub mod retry_after;
pub mod retry_policy;
pub mod retry_result;
pub mod retry_state;
