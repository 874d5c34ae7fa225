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

//! Types and functions to make long-running operations (LROs) easier to use.
//!
//! Azure services report the progress of long-running operations in several
//! ways. The [Poller] detects the mechanism from the initial response of the
//! operation, waits between polls as instructed by the service, and fetches
//! the final result.
//!
//! Pollers can be saved as a [resume token][Poller::resume_token] and resumed
//! later, possibly in a different process.

mod poller;
mod resume_token;
mod state;
mod status;
mod strategy;

pub use poller::{Poller, PollerOptions};
pub use resume_token::ResumeTokenError;
pub use status::Status;
pub use strategy::{ASYNC_OPERATION_HEADER, FinalStateVia, Strategy};

use gax::Result;
use gax::client::{RequestTemplate, ServiceClient};
use gax::context::Context;

/// The status codes accepted in the initial response of an operation.
pub const INITIAL_STATUS: [u16; 4] = [200, 201, 202, 204];

/// Starts a long-running operation and returns a poller for it.
///
/// The request in `template` is sent once, and any status in
/// [INITIAL_STATUS] starts the poller. Other responses are returned as
/// service errors.
///
/// # Example
/// ```
/// # use azure_rest_lro::{begin, PollerOptions};
/// # use gax::client::{RequestTemplate, ServiceClient};
/// # use gax::context::Context;
/// # async fn sample(client: &ServiceClient) -> gax::Result<()> {
/// let template = RequestTemplate::delete("/subscriptions/{sub}/resourceGroups/{group}")
///     .with_path_param("sub", "00000000-0000-0000-0000-000000000000")
///     .with_path_param("group", "my-group")
///     .with_api_version("2024-03-01");
/// let ctx = Context::new();
/// let poller = begin::<()>(client, &ctx, template, PollerOptions::default()).await?;
/// poller.poll_until_done(&ctx).await?;
/// # Ok(()) }
/// ```
pub async fn begin<T>(
    client: &ServiceClient,
    ctx: &Context,
    template: RequestTemplate,
    options: PollerOptions,
) -> Result<Poller<T>>
where
    T: serde::de::DeserializeOwned + Default,
{
    let template = template.with_expected_status(INITIAL_STATUS);
    let initial = client.send(ctx, &template).await?;
    Poller::new(initial, client.pipeline().clone(), options)
}
