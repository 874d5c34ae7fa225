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
use crate::strategy::{
    ASYNC_OPERATION_HEADER, FinalStateVia, Strategy, monitor_status, provisioning_state,
};
use gax::Result;
use gax::error::{Error, ResponseError};
use gax::http::Response;
use http::Method;
use http::header::LOCATION;
use url::Url;

#[derive(thiserror::Error, Debug)]
enum StateError {
    #[error("the initial response does not carry its originating request")]
    MissingRequest,
    #[error("the service returned 202 Accepted without a polling header")]
    MissingPollingHeader,
    #[error("cannot parse the `{header}` header as a URL")]
    InvalidPollingUrl {
        header: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Where [Poller::result][crate::Poller::result] finds the result.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FinalResult {
    /// Issue a `GET` to this URL.
    Get(Url),
    /// Decode the last response.
    LastResponse,
    /// The operation has no result.
    Nothing,
}

/// The state of a long-running operation.
///
/// This is everything needed to continue polling, it is what a resume token
/// carries.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PollingState {
    pub(crate) strategy: Strategy,
    pub(crate) status: Status,
    pub(crate) method: Method,
    pub(crate) resource_url: Url,
    pub(crate) poll_url: Option<Url>,
    pub(crate) location: Option<Url>,
    pub(crate) final_state_via: FinalStateVia,
}

fn header_url(response: &Response, header: &'static str, base: &Url) -> Result<Option<Url>> {
    let Some(value) = response.header_str(header).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    // Relative URLs are resolved against the request URL.
    base.join(value)
        .map(Some)
        .map_err(|source| Error::deser(StateError::InvalidPollingUrl { header, source }))
}

impl PollingState {
    /// Selects the strategy from the initial response of an operation.
    pub(crate) fn from_initial(
        response: &Response,
        final_state_via: FinalStateVia,
    ) -> Result<Self> {
        let request = response
            .request()
            .ok_or_else(|| Error::usage(StateError::MissingRequest))?;
        if !response.has_status_code(&[200, 201, 202, 204]) {
            return Err(Error::service(ResponseError::from_response(response)));
        }
        let method = request.method().clone();
        let resource_url = request.url().clone();
        let location = header_url(response, "location", &resource_url)?;
        let async_operation = header_url(response, ASYNC_OPERATION_HEADER, &resource_url)?;

        let (strategy, status, poll_url) = if let Some(url) = async_operation {
            (Strategy::AsyncOperation, Status::InProgress, Some(url))
        } else if let Some(url) = &location {
            (Strategy::Location, Status::InProgress, Some(url.clone()))
        } else if matches!(method, Method::PUT | Method::PATCH)
            && response.has_status_code(&[200, 201])
        {
            match provisioning_state(response) {
                Some(status) if status.is_terminal() => (Strategy::Body, status, None),
                Some(_) => (
                    Strategy::ProvisioningState,
                    Status::InProgress,
                    Some(resource_url.clone()),
                ),
                // A resource being created may not report its state yet.
                None if response.status() == http::StatusCode::CREATED => (
                    Strategy::ProvisioningState,
                    Status::InProgress,
                    Some(resource_url.clone()),
                ),
                None => (Strategy::Body, Status::Succeeded, None),
            }
        } else if response.status() == http::StatusCode::ACCEPTED {
            return Err(Error::deser(StateError::MissingPollingHeader));
        } else {
            (Strategy::Body, Status::Succeeded, None)
        };

        Ok(Self {
            strategy,
            status,
            method,
            resource_url,
            poll_url,
            location,
            final_state_via,
        })
    }

    /// Applies the response to a poll.
    ///
    /// Errors leave the state unchanged.
    pub(crate) fn update(&mut self, response: &Response) -> Result<()> {
        let code = response.status();
        let status = match self.strategy {
            Strategy::AsyncOperation if code.is_success() => monitor_status(response)?,
            Strategy::Location if code == http::StatusCode::ACCEPTED => {
                if let Some(url) = header_url(response, "location", &self.resource_url)? {
                    self.poll_url = Some(url);
                }
                Status::InProgress
            }
            Strategy::Location if code.is_success() => Status::Succeeded,
            Strategy::Location if code.is_client_error() || code.is_server_error() => {
                Status::Failed
            }
            Strategy::ProvisioningState if code == http::StatusCode::ACCEPTED => {
                Status::InProgress
            }
            Strategy::ProvisioningState if code.is_success() => {
                provisioning_state(response).unwrap_or(Status::Succeeded)
            }
            Strategy::Body => self.status,
            _ => return Err(Error::service(ResponseError::from_response(response))),
        };
        self.status = status;
        Ok(())
    }

    /// Where the result of a successful operation is found.
    pub(crate) fn final_result(&self) -> FinalResult {
        let get = |url: &Url| FinalResult::Get(url.clone());
        match (self.strategy, self.final_state_via) {
            (Strategy::Body | Strategy::ProvisioningState, _) => FinalResult::LastResponse,
            (_, FinalStateVia::OriginalUri) => get(&self.resource_url),
            (_, FinalStateVia::Location) => {
                self.location.as_ref().map_or(FinalResult::LastResponse, get)
            }
            (_, FinalStateVia::AzureAsyncOperation | FinalStateVia::Operation) => {
                FinalResult::LastResponse
            }
            (_, FinalStateVia::Default) if self.method == Method::DELETE => FinalResult::Nothing,
            (Strategy::Location, FinalStateVia::Default) => FinalResult::LastResponse,
            (Strategy::AsyncOperation, FinalStateVia::Default) => match self.method {
                Method::PUT | Method::PATCH => get(&self.resource_url),
                Method::POST => self.location.as_ref().map_or(FinalResult::LastResponse, get),
                _ => FinalResult::LastResponse,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use gax::http::RequestInfo;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use serde_json::{Value, json};
    use test_case::test_case;

    pub(crate) const RESOURCE: &str =
        "https://management.azure.com/subscriptions/s/resourceGroups/g?api-version=2024-01-01";
    pub(crate) const MONITOR: &str = "https://management.azure.com/operations/op1";
    pub(crate) const LOCATION_URL: &str = "https://management.azure.com/operationResults/op1";

    pub(crate) fn initial(
        method: Method,
        status: StatusCode,
        headers: &[(&'static str, &'static str)],
        body: Value,
    ) -> Response {
        let mut map = HeaderMap::new();
        map.insert("content-type", HeaderValue::from_static("application/json"));
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(v));
        }
        let body = match body {
            Value::Null => bytes::Bytes::new(),
            v => bytes::Bytes::from(v.to_string()),
        };
        let url = Url::parse(RESOURCE).expect("valid test URL");
        Response::new(status, map, body).with_request(RequestInfo::new(method, url))
    }

    fn state(
        method: Method,
        status: StatusCode,
        headers: &[(&'static str, &'static str)],
        body: Value,
    ) -> Result<PollingState> {
        let response = initial(method, status, headers, body);
        PollingState::from_initial(&response, FinalStateVia::Default)
    }

    #[test]
    fn async_operation_has_precedence() -> anyhow::Result<()> {
        let got = state(
            Method::PUT,
            StatusCode::CREATED,
            &[("azure-asyncoperation", MONITOR), ("location", LOCATION_URL)],
            json!({"properties": {"provisioningState": "Creating"}}),
        )?;
        assert_eq!(got.strategy, Strategy::AsyncOperation);
        assert_eq!(got.status, Status::InProgress);
        assert_eq!(got.poll_url.as_ref().map(Url::as_str), Some(MONITOR));
        assert_eq!(got.location.as_ref().map(Url::as_str), Some(LOCATION_URL));
        Ok(())
    }

    #[test]
    fn location() -> anyhow::Result<()> {
        let got = state(Method::POST, StatusCode::ACCEPTED, &[("location", LOCATION_URL)], Value::Null)?;
        assert_eq!(got.strategy, Strategy::Location);
        assert_eq!(got.poll_url.as_ref().map(Url::as_str), Some(LOCATION_URL));
        Ok(())
    }

    #[test]
    fn relative_location() -> anyhow::Result<()> {
        let got = state(Method::DELETE, StatusCode::ACCEPTED, &[("location", "/operationResults/op1")], Value::Null)?;
        assert_eq!(got.poll_url.as_ref().map(Url::as_str), Some(LOCATION_URL));
        Ok(())
    }

    #[test_case(StatusCode::OK, json!({"properties": {"provisioningState": "Updating"}}), Strategy::ProvisioningState, Status::InProgress)]
    #[test_case(StatusCode::CREATED, json!({"properties": {}}), Strategy::ProvisioningState, Status::InProgress)]
    #[test_case(StatusCode::OK, json!({"properties": {}}), Strategy::Body, Status::Succeeded)]
    #[test_case(StatusCode::OK, json!({"properties": {"provisioningState": "Succeeded"}}), Strategy::Body, Status::Succeeded)]
    #[test_case(StatusCode::CREATED, json!({"properties": {"provisioningState": "Failed"}}), Strategy::Body, Status::Failed)]
    fn provisioning(code: StatusCode, body: Value, strategy: Strategy, status: Status) -> anyhow::Result<()> {
        let got = state(Method::PUT, code, &[], body)?;
        assert_eq!(got.strategy, strategy);
        assert_eq!(got.status, status);
        if strategy == Strategy::ProvisioningState {
            assert_eq!(got.poll_url.as_ref().map(Url::as_str), Some(RESOURCE));
        }
        Ok(())
    }

    #[test]
    fn post_ignores_provisioning_state() -> anyhow::Result<()> {
        let got = state(
            Method::POST,
            StatusCode::OK,
            &[],
            json!({"properties": {"provisioningState": "Updating"}}),
        )?;
        assert_eq!(got.strategy, Strategy::Body);
        assert_eq!(got.status, Status::Succeeded);
        Ok(())
    }

    #[test]
    fn accepted_without_headers() {
        let err = state(Method::POST, StatusCode::ACCEPTED, &[], Value::Null).unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
    }

    #[test]
    fn initial_error() {
        let err = state(
            Method::PUT,
            StatusCode::BAD_REQUEST,
            &[],
            json!({"error": {"code": "InvalidSku"}}),
        )
        .unwrap_err();
        assert_eq!(err.http_status_code(), Some(400));
        assert_eq!(err.error_code(), Some("InvalidSku"));
    }

    #[test]
    fn missing_request() {
        let response = Response::from_json(StatusCode::OK, &json!({}));
        let err = PollingState::from_initial(&response, FinalStateVia::Default).unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[test]
    fn invalid_polling_url() {
        let err = state(Method::PUT, StatusCode::CREATED, &[("azure-asyncoperation", "http://[::1")], Value::Null)
            .unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
    }

    fn poll(
        state: &mut PollingState,
        code: StatusCode,
        headers: &[(&'static str, &'static str)],
        body: Value,
    ) -> Result<()> {
        state.update(&initial(Method::GET, code, headers, body))
    }

    #[test]
    fn update_async_operation() -> anyhow::Result<()> {
        let mut got = state(Method::PUT, StatusCode::CREATED, &[("azure-asyncoperation", MONITOR)], Value::Null)?;
        poll(&mut got, StatusCode::OK, &[], json!({"status": "Running"}))?;
        assert_eq!(got.status, Status::InProgress);
        poll(&mut got, StatusCode::OK, &[], json!({"status": "Succeeded"}))?;
        assert_eq!(got.status, Status::Succeeded);
        Ok(())
    }

    #[test]
    fn update_async_operation_error_keeps_state() -> anyhow::Result<()> {
        let mut got = state(Method::PUT, StatusCode::CREATED, &[("azure-asyncoperation", MONITOR)], Value::Null)?;
        let before = got.clone();
        let err = poll(&mut got, StatusCode::NOT_FOUND, &[], json!({"error": {"code": "NotFound"}})).unwrap_err();
        assert_eq!(err.http_status_code(), Some(404));
        assert_eq!(got, before);
        Ok(())
    }

    #[test_case(StatusCode::ACCEPTED, Status::InProgress)]
    #[test_case(StatusCode::OK, Status::Succeeded)]
    #[test_case(StatusCode::NO_CONTENT, Status::Succeeded)]
    #[test_case(StatusCode::CONFLICT, Status::Failed)]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, Status::Failed)]
    fn update_location(code: StatusCode, want: Status) -> anyhow::Result<()> {
        let mut got = state(Method::POST, StatusCode::ACCEPTED, &[("location", LOCATION_URL)], Value::Null)?;
        poll(&mut got, code, &[], Value::Null)?;
        assert_eq!(got.status, want);
        Ok(())
    }

    #[test]
    fn update_location_follows_new_location() -> anyhow::Result<()> {
        let mut got = state(Method::POST, StatusCode::ACCEPTED, &[("location", LOCATION_URL)], Value::Null)?;
        poll(&mut got, StatusCode::ACCEPTED, &[("location", MONITOR)], Value::Null)?;
        assert_eq!(got.poll_url.as_ref().map(Url::as_str), Some(MONITOR));
        Ok(())
    }

    #[test_case(StatusCode::ACCEPTED, json!({}), Status::InProgress)]
    #[test_case(StatusCode::OK, json!({"properties": {"provisioningState": "Updating"}}), Status::InProgress)]
    #[test_case(StatusCode::OK, json!({"properties": {"provisioningState": "Canceled"}}), Status::Canceled)]
    #[test_case(StatusCode::OK, json!({"properties": {}}), Status::Succeeded)]
    #[test_case(StatusCode::NO_CONTENT, Value::Null, Status::Succeeded)]
    fn update_provisioning(code: StatusCode, body: Value, want: Status) -> anyhow::Result<()> {
        let mut got = state(Method::PUT, StatusCode::CREATED, &[], json!({}))?;
        poll(&mut got, code, &[], body)?;
        assert_eq!(got.status, want);
        Ok(())
    }

    fn with(strategy: Strategy, method: Method, via: FinalStateVia, location: bool) -> PollingState {
        PollingState {
            strategy,
            status: Status::Succeeded,
            method,
            resource_url: Url::parse(RESOURCE).expect("valid test URL"),
            poll_url: None,
            location: location.then(|| Url::parse(LOCATION_URL).expect("valid test URL")),
            final_state_via: via,
        }
    }

    fn get(url: &str) -> FinalResult {
        FinalResult::Get(Url::parse(url).expect("valid test URL"))
    }

    #[test_case(Strategy::AsyncOperation, Method::PUT, FinalStateVia::Default, false, get(RESOURCE))]
    #[test_case(Strategy::AsyncOperation, Method::PATCH, FinalStateVia::Default, true, get(RESOURCE))]
    #[test_case(Strategy::AsyncOperation, Method::POST, FinalStateVia::Default, true, get(LOCATION_URL))]
    #[test_case(Strategy::AsyncOperation, Method::POST, FinalStateVia::Default, false, FinalResult::LastResponse)]
    #[test_case(Strategy::AsyncOperation, Method::DELETE, FinalStateVia::Default, true, FinalResult::Nothing)]
    #[test_case(Strategy::AsyncOperation, Method::PUT, FinalStateVia::AzureAsyncOperation, false, FinalResult::LastResponse)]
    #[test_case(Strategy::AsyncOperation, Method::PUT, FinalStateVia::Operation, false, FinalResult::LastResponse)]
    #[test_case(Strategy::AsyncOperation, Method::POST, FinalStateVia::OriginalUri, true, get(RESOURCE))]
    #[test_case(Strategy::AsyncOperation, Method::PUT, FinalStateVia::Location, true, get(LOCATION_URL))]
    #[test_case(Strategy::Location, Method::POST, FinalStateVia::Default, true, FinalResult::LastResponse)]
    #[test_case(Strategy::Location, Method::PUT, FinalStateVia::OriginalUri, true, get(RESOURCE))]
    #[test_case(Strategy::Location, Method::DELETE, FinalStateVia::Default, true, FinalResult::Nothing)]
    #[test_case(Strategy::ProvisioningState, Method::PUT, FinalStateVia::OriginalUri, false, FinalResult::LastResponse)]
    #[test_case(Strategy::Body, Method::POST, FinalStateVia::Location, false, FinalResult::LastResponse)]
    fn final_result(strategy: Strategy, method: Method, via: FinalStateVia, location: bool, want: FinalResult) {
        assert_eq!(with(strategy, method, via, location).final_result(), want);
    }
}
