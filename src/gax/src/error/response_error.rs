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

use crate::http::{RequestInfo, Response};
use bytes::Bytes;
use http::HeaderMap;
use serde_json::{Map, Value};

/// The maximum number of bytes of an error payload kept by [ResponseError].
pub const DEFAULT_MAX_ERROR_BODY: usize = 4 * 1024 * 1024;

const ERROR_CODE_HEADER: &str = "x-ms-error-code";
const REQUEST_ID_HEADER: &str = "x-ms-request-id";

/// The details of an error response returned by an Azure service.
///
/// Azure services report errors as JSON payloads with the following shape:
///
/// ```json
/// {"error": {"code": "...", "message": "...", "target": "...", "details": [...], "innererror": {...}}}
/// ```
///
/// Some services omit the `"error"` wrapper, and proxies or load balancers may
/// return payloads that are not JSON at all. Decoding never fails: when the
/// payload cannot be parsed the error carries only the status code, the
/// headers, and the raw payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseError {
    status_code: u16,
    error_code: Option<String>,
    message: String,
    target: Option<String>,
    details: Vec<ErrorDetail>,
    inner_codes: Vec<String>,
    raw: Bytes,
    truncated: bool,
    headers: HeaderMap,
    request_id: Option<String>,
    request: Option<RequestInfo>,
}

/// An entry in the `details` array of an error payload.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
    pub target: Option<String>,
    pub details: Vec<ErrorDetail>,
}

impl ResponseError {
    /// Decodes an error from the status code, headers, and payload of a
    /// response.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_gax::error::ResponseError;
    /// let body = bytes::Bytes::from_static(br#"{"error": {"code": "Conflict", "message": "already exists"}}"#);
    /// let error = ResponseError::from_parts(409, http::HeaderMap::new(), body);
    /// assert_eq!(error.status_code(), 409);
    /// assert_eq!(error.error_code(), Some("Conflict"));
    /// assert_eq!(error.message(), "already exists");
    /// ```
    pub fn from_parts(status_code: u16, headers: HeaderMap, body: Bytes) -> Self {
        Self::from_parts_with_limit(status_code, headers, body, DEFAULT_MAX_ERROR_BODY)
    }

    /// Like [from_parts][ResponseError::from_parts], keeping at most `limit`
    /// bytes of the payload.
    pub fn from_parts_with_limit(
        status_code: u16,
        headers: HeaderMap,
        body: Bytes,
        limit: usize,
    ) -> Self {
        let truncated = body.len() > limit;
        let raw = if truncated { body.slice(..limit) } else { body };
        let decoded = decode(&raw).unwrap_or_default();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        // The header takes precedence, some services put a more specific code
        // there than in the payload.
        let error_code = header(ERROR_CODE_HEADER).or(decoded.detail.code);
        let request_id = header(REQUEST_ID_HEADER);
        Self {
            status_code,
            error_code,
            message: decoded.detail.message.unwrap_or_default(),
            target: decoded.detail.target,
            details: decoded.detail.details,
            inner_codes: decoded.inner_codes,
            raw,
            truncated,
            headers,
            request_id,
            request: None,
        }
    }

    /// Decodes the error carried by a pipeline response.
    pub fn from_response(response: &Response) -> Self {
        let mut error = Self::from_parts(
            response.status().as_u16(),
            response.headers().clone(),
            response.body().clone(),
        );
        error.request = response.request().cloned();
        error
    }

    /// The HTTP status code of the response.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The service error code, from the `x-ms-error-code` header or the payload.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// The top-level error message, empty if the payload has none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The target of the error, typically a property name.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The nested error details.
    pub fn details(&self) -> &[ErrorDetail] {
        &self.details
    }

    /// The chain of error codes, outer-most first.
    ///
    /// The chain starts with [error_code][ResponseError::error_code] and
    /// continues with the codes of each nested `innererror` object.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_gax::error::ResponseError;
    /// let body = bytes::Bytes::from_static(
    ///     br#"{"error": {"code": "A", "innererror": {"code": "B", "innererror": {"code": "C"}}}}"#);
    /// let error = ResponseError::from_parts(400, http::HeaderMap::new(), body);
    /// assert_eq!(error.code_chain(), vec!["A", "B", "C"]);
    /// ```
    pub fn code_chain(&self) -> Vec<&str> {
        self.error_code
            .iter()
            .chain(self.inner_codes.iter())
            .map(String::as_str)
            .collect()
    }

    /// The top-level message followed by the messages of all the details.
    pub fn flattened_message(&self) -> String {
        let mut parts = Vec::new();
        if !self.message.is_empty() {
            parts.push(self.message.clone());
        }
        flatten(&self.details, &mut parts);
        parts.join("; ")
    }

    /// The response payload, truncated to at most [DEFAULT_MAX_ERROR_BODY] bytes.
    pub fn raw_body(&self) -> &Bytes {
        &self.raw
    }

    /// Returns true if the payload was larger than the decoding bound.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The value of the `x-ms-request-id` header, if present.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The method and URL of the request that produced this error, if known.
    pub fn request(&self) -> Option<&RequestInfo> {
        self.request.as_ref()
    }
}

fn flatten(details: &[ErrorDetail], parts: &mut Vec<String>) {
    for d in details {
        match (&d.target, &d.message) {
            (Some(t), Some(m)) => parts.push(format!("{t}: {m}")),
            (None, Some(m)) => parts.push(m.clone()),
            _ => {}
        }
        flatten(&d.details, parts);
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(r) = &self.request {
            write!(f, "{} {}://", r.method(), r.url().scheme())?;
            write!(f, "{}{}: ", r.url().host_str().unwrap_or_default(), r.url().path())?;
        }
        write!(f, "the service returned HTTP status {}", self.status_code)?;
        match &self.error_code {
            Some(code) => write!(f, " with error code {code}")?,
            None => write!(f, " without an error code")?,
        }
        let message = self.flattened_message();
        if !message.is_empty() {
            return write!(f, ": {message}");
        }
        if !self.raw.is_empty() {
            return write!(f, ": {}", String::from_utf8_lossy(&self.raw));
        }
        Ok(())
    }
}

impl std::error::Error for ResponseError {}

#[derive(Default)]
struct Decoded {
    detail: ErrorDetail,
    inner_codes: Vec<String>,
}

fn decode(body: &[u8]) -> Option<Decoded> {
    let value = serde_json::from_slice::<Value>(body).ok()?;
    let object = value.as_object()?;
    let error = match get(object, "error") {
        Some(Value::Object(e)) => e,
        Some(Value::String(message)) => {
            let detail = ErrorDetail {
                message: Some(message.clone()),
                ..Default::default()
            };
            return Some(Decoded {
                detail,
                inner_codes: Vec::new(),
            });
        }
        _ => object,
    };
    let mut inner_codes = Vec::new();
    let mut inner = get(error, "innererror");
    while let Some(Value::Object(o)) = inner {
        if let Some(code) = get(o, "code").and_then(as_string) {
            inner_codes.push(code);
        }
        inner = get(o, "innererror");
    }
    Some(Decoded {
        detail: detail(error),
        inner_codes,
    })
}

fn detail(object: &Map<String, Value>) -> ErrorDetail {
    let details = match get(object, "details") {
        Some(Value::Array(a)) => a
            .iter()
            .filter_map(Value::as_object)
            .map(detail)
            .collect(),
        _ => Vec::new(),
    };
    ErrorDetail {
        code: get(object, "code").and_then(as_string),
        message: get(object, "message").and_then(as_string),
        target: get(object, "target").and_then(as_string),
        details,
    }
}

// Some older services use `Code` and `Message`.
fn get<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
