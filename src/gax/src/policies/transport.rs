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
use crate::policy::{Next, Policy};
use std::sync::Arc;

/// The last policy in every pipeline. Sends the request using the transport.
///
/// The send is bounded by the context: if the context is cancelled, or its
/// deadline expires, the in-flight request is dropped.
#[derive(Debug)]
pub struct TransportPolicy {
    client: Arc<dyn HttpClient>,
}

impl TransportPolicy {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Policy for TransportPolicy {
    async fn send(&self, ctx: &Context, request: Request, _next: Next<'_>) -> Result<Response> {
        let info = request.info();
        let response = ctx.run(self.client.execute(request)).await?;
        Ok(response.with_request(info))
    }
}
