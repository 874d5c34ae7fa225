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
use crate::error::Error;
use crate::http::{Request, Response};
use std::sync::Arc;

/// A step in the request pipeline.
///
/// Each policy receives the request and a [Next] handle to the rest of the
/// chain. A policy may mutate the request, call `next` zero or more times,
/// and inspect or replace the response. Policies are shared across all the
/// calls made by a client, so they must be safe to use concurrently.
///
/// # Example
/// ```
/// # use azure_rest_gax::{Result, context::Context, http::{Request, Response}};
/// # use azure_rest_gax::policy::{Next, Policy};
/// #[derive(Debug)]
/// struct AddHeader;
///
/// #[async_trait::async_trait]
/// impl Policy for AddHeader {
///     async fn send(&self, ctx: &Context, mut request: Request, next: Next<'_>) -> Result<Response> {
///         request.insert_header(
///             http::HeaderName::from_static("x-example"),
///             http::HeaderValue::from_static("1"));
///         next.send(ctx, request).await
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Policy: Send + Sync + std::fmt::Debug {
    async fn send(&self, ctx: &Context, request: Request, next: Next<'_>) -> Result<Response>;
}

/// The remaining policies in the chain.
#[derive(Clone, Copy, Debug)]
pub struct Next<'a> {
    policies: &'a [Arc<dyn Policy>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(policies: &'a [Arc<dyn Policy>]) -> Self {
        Self { policies }
    }

    /// Sends the request through the remaining policies.
    ///
    /// The last policy in a well-formed pipeline is the transport, which never
    /// calls `next`. Reaching the end of the chain is a usage error.
    pub async fn send(self, ctx: &Context, request: Request) -> Result<Response> {
        match self.policies.split_first() {
            Some((head, tail)) => head.send(ctx, request, Next::new(tail)).await,
            None => Err(Error::usage(
                "the pipeline has no transport policy at the end of the chain",
            )),
        }
    }
}
