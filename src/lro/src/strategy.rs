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

use crate::status::Status;
use gax::Result;
use gax::error::Error;
use gax::http::Response;
use serde::{Deserialize, Serialize};

/// The header naming the status monitor of an operation.
pub const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// How the poller learns the status of an operation.
///
/// The strategy is selected from the initial response, in this order:
/// an `Azure-AsyncOperation` header, a `Location` header, a
/// `properties.provisioningState` field in the body of a `PUT` or `PATCH`,
/// and finally the body itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Poll the status monitor in the `Azure-AsyncOperation` header.
    #[serde(rename = "a")]
    AsyncOperation,
    /// Poll the URL in the `Location` header until it stops returning `202`.
    #[serde(rename = "l")]
    Location,
    /// Poll the resource until its provisioning state is terminal.
    #[serde(rename = "p")]
    ProvisioningState,
    /// The initial response is already terminal.
    #[serde(rename = "b")]
    Body,
}

/// Where the result of a successful operation is found.
///
/// Services document this per operation, usually as the
/// `x-ms-long-running-operation-options` extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStateVia {
    /// `PUT` and `PATCH` fetch the original URI, `POST` fetches the
    /// `Location` header when present, `DELETE` has no result.
    #[default]
    #[serde(rename = "d")]
    Default,
    /// The status monitor body is the result, no final request is made.
    #[serde(rename = "aao")]
    AzureAsyncOperation,
    /// Fetch the `Location` header of the initial response.
    #[serde(rename = "loc")]
    Location,
    /// Fetch the URI of the initial request.
    #[serde(rename = "uri")]
    OriginalUri,
    /// Same as [AzureAsyncOperation][FinalStateVia::AzureAsyncOperation].
    #[serde(rename = "op")]
    Operation,
}

#[derive(Debug, Default, Deserialize)]
struct StatusMonitor {
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Resource {
    properties: Option<Properties>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(rename = "provisioningState")]
    provisioning_state: Option<String>,
}

#[derive(thiserror::Error, Debug)]
#[error("the status monitor response has no `status` field")]
struct MissingStatus;

/// Parses the body of a status monitor response.
pub(crate) fn monitor_status(response: &Response) -> Result<Status> {
    let monitor = serde_json::from_slice::<StatusMonitor>(response.body())
        .map_err(|e| Error::deser_with_payload(e, response.body().clone()))?;
    monitor
        .status
        .as_deref()
        .map(Status::from_service)
        .ok_or_else(|| Error::deser_with_payload(MissingStatus, response.body().clone()))
}

/// Returns `properties.provisioningState`, if the body has one.
///
/// Bodies that are not JSON objects have no provisioning state.
pub(crate) fn provisioning_state(response: &Response) -> Option<Status> {
    serde_json::from_slice::<Resource>(response.body())
        .ok()?
        .properties?
        .provisioning_state
        .as_deref()
        .map(Status::from_service)
}
