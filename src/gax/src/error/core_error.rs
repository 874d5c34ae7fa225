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

use super::ResponseError;
use bytes::Bytes;
use http::HeaderMap;
use std::error::Error as StdError;

/// The boxed error type used as the source of an [Error].
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by all the clients.
///
/// The clients report errors from multiple sources. For example, the service
/// may return an error, the transport may be unable to create the necessary
/// connection to make a request, the request context may be cancelled before a
/// response is received, the retry policy may be exhausted, or the library may
/// be unable to format the request due to invalid or missing application
/// inputs.
///
/// Most applications will just return the error or log it, without any further
/// action. However, some applications may need to interrogate the error
/// details. This type offers a [kind][Error::kind], a series of predicates, and
/// accessors to query the most common error details. Applications can query
/// the error [source][std::error::Error::source] for deeper information.
///
/// # Example
/// ```
/// use azure_rest_gax::error::Error;
/// match example_function() {
///     Err(e) if e.http_status_code() == Some(404) => {
///         println!("not found {e}, code={:?}", e.error_code());
///     },
///     Err(e) if e.is_timeout() => { println!("not enough time {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::timeout("simulated"))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    response: Option<Box<ResponseError>>,
    payload: Option<Bytes>,
    operation_status: Option<String>,
    source: Option<BoxError>,
}

/// The category of an [Error].
///
/// The retry engine uses the kind to decide if an error is transient. Only
/// [Transport][ErrorKind::Transport], [Throttled][ErrorKind::Throttled], and
/// [ServerTransient][ErrorKind::ServerTransient] errors are ever retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The transport could not send the request or receive the response.
    Transport,
    /// The request context deadline expired.
    Timeout,
    /// The request context was cancelled.
    Cancelled,
    /// The service returned `429 Too Many Requests`.
    Throttled,
    /// The service returned `408` or a `5xx` status.
    ServerTransient,
    /// The credential refused to produce a token, or the service returned `401`.
    Authentication,
    /// The service returned a `4xx` status other than `401`, `408` or `429`.
    Client,
    /// The response payload could not be decoded.
    Deserialization,
    /// The request payload could not be encoded.
    Serialization,
    /// A long-running operation reached the `Failed` or `Canceled` state.
    OperationFailed,
    /// The library was used incorrectly, e.g. a missing path parameter.
    Usage,
    /// The retry policy stopped the loop on a transient error.
    Exhausted,
}

impl ErrorKind {
    /// Maps a non-success HTTP status code to its error kind.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_gax::error::ErrorKind;
    /// assert_eq!(ErrorKind::from_status(429), ErrorKind::Throttled);
    /// assert_eq!(ErrorKind::from_status(503), ErrorKind::ServerTransient);
    /// assert_eq!(ErrorKind::from_status(404), ErrorKind::Client);
    /// ```
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::Throttled,
            408 => Self::ServerTransient,
            401 => Self::Authentication,
            s if s >= 500 => Self::ServerTransient,
            _ => Self::Client,
        }
    }
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            response: None,
            payload: None,
            operation_status: None,
            source: None,
        }
    }

    fn with_source<T: Into<BoxError>>(kind: ErrorKind, source: T) -> Self {
        let mut error = Self::new(kind);
        error.source = Some(source.into());
        error
    }

    /// Creates an error with the information returned by an Azure service.
    ///
    /// The kind is derived from the HTTP status code in `response`.
    ///
    /// # Example
    /// ```
    /// use azure_rest_gax::error::{Error, ErrorKind, ResponseError};
    /// let response = ResponseError::from_parts(
    ///     409, http::HeaderMap::new(), bytes::Bytes::from_static(b"{\"error\":{\"code\":\"Conflict\"}}"));
    /// let error = Error::service(response);
    /// assert_eq!(error.kind(), ErrorKind::Client);
    /// assert_eq!(error.error_code(), Some("Conflict"));
    /// ```
    pub fn service(response: ResponseError) -> Self {
        let mut error = Self::new(ErrorKind::from_status(response.status_code()));
        error.response = Some(Box::new(response));
        error
    }

    /// Creates an error representing a transport failure.
    ///
    /// Connection refused, connection reset, TLS failures, and timeouts
    /// reported by the transport itself are all in this category.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Transport, source)
    }

    /// Creates an error representing an expired request deadline.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use azure_rest_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Timeout, source)
    }

    /// Creates an error representing a cancelled request context.
    ///
    /// The source is typically the last error, or the last retryable status,
    /// observed before the cancellation.
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Cancelled, source)
    }

    /// Creates an error representing an authentication problem.
    pub fn authentication<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Authentication, source)
    }

    /// Creates an error representing a deserialization problem.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Deserialization, source)
    }

    /// Creates an error representing a deserialization problem, keeping the
    /// payload that could not be decoded.
    ///
    /// # Example
    /// ```
    /// use azure_rest_gax::error::Error;
    /// let error = Error::deser_with_payload("bad json", bytes::Bytes::from_static(b"{"));
    /// assert!(error.is_deserialization());
    /// assert_eq!(error.raw_body().map(|b| b.as_ref()), Some(b"{".as_slice()));
    /// ```
    pub fn deser_with_payload<T: Into<BoxError>>(source: T, payload: Bytes) -> Self {
        let mut error = Self::with_source(ErrorKind::Deserialization, source);
        error.payload = Some(payload);
        error
    }

    /// Creates an error representing a serialization problem.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Serialization, source)
    }

    /// Creates an error for a long-running operation that reached a failed or
    /// canceled terminal state.
    ///
    /// # Parameters
    /// * `status` - the terminal status reported by the service, e.g. `Failed`.
    /// * `response` - the error details decoded from the terminal payload.
    pub fn operation_failed<S: Into<String>>(status: S, response: ResponseError) -> Self {
        let mut error = Self::new(ErrorKind::OperationFailed);
        error.operation_status = Some(status.into());
        error.response = Some(Box::new(response));
        error
    }

    /// Creates an error representing an invalid use of the library.
    ///
    /// Missing path parameters and non-rewindable bodies that need to be
    /// resent are the most common examples.
    pub fn usage<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Usage, source)
    }

    /// Creates an error representing an exhausted retry policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use azure_rest_gax::error::Error;
    /// let error = Error::exhausted(Error::io("connection reset"));
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Exhausted, source)
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The transport could not complete the request.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport)
    }

    /// The request could not be completed before its deadline.
    ///
    /// This is always a client-side generated error. Note that the request may
    /// or may not have started, and it may or may not complete in the service.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// The request context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// The service throttled the request.
    pub fn is_throttled(&self) -> bool {
        matches!(self.kind, ErrorKind::Throttled)
    }

    /// The service reported a transient problem.
    pub fn is_server_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::ServerTransient)
    }

    /// The error may go away if the request is attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Transport | ErrorKind::Throttled | ErrorKind::ServerTransient
        )
    }

    /// The request was not authenticated.
    ///
    /// Either the credential could not produce a token, or the service
    /// rejected the token with `401 Unauthorized`.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// The service rejected the request with a `4xx` status.
    pub fn is_client(&self) -> bool {
        matches!(self.kind, ErrorKind::Client)
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// The request could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// A long-running operation failed or was canceled.
    pub fn is_operation_failed(&self) -> bool {
        matches!(self.kind, ErrorKind::OperationFailed)
    }

    /// The library was used incorrectly.
    pub fn is_usage(&self) -> bool {
        matches!(self.kind, ErrorKind::Usage)
    }

    /// The retry policy stopped retrying.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// The details decoded from the service response, if any.
    pub fn response_error(&self) -> Option<&ResponseError> {
        self.response.as_deref()
    }

    /// The HTTP status code, if any, associated with this error.
    ///
    /// Note that failed long-running operations report the status code of the
    /// polling response, which is typically `200`.
    pub fn http_status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code())
    }

    /// The HTTP headers, if any, associated with this error.
    pub fn http_headers(&self) -> Option<&HeaderMap> {
        self.response.as_ref().map(|r| r.headers())
    }

    /// The service error code, e.g. `ResourceNotFound`.
    pub fn error_code(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.error_code())
    }

    /// The value of the `x-ms-request-id` response header, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.request_id())
    }

    /// The raw payload associated with this error, if any.
    ///
    /// For service errors this is the (possibly truncated) response body. For
    /// deserialization errors this is the payload that could not be decoded.
    pub fn raw_body(&self) -> Option<&Bytes> {
        self.response
            .as_ref()
            .map(|r| r.raw_body())
            .or(self.payload.as_ref())
    }

    /// The terminal status of a failed long-running operation.
    pub fn operation_status(&self) -> Option<&str> {
        self.operation_status.as_deref()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (ErrorKind::OperationFailed, Some(r)) = (&self.kind, &self.response) {
            let status = self.operation_status.as_deref().unwrap_or("Failed");
            return write!(f, "the long-running operation ended with status {status}: {r}");
        }
        if let Some(r) = &self.response {
            return write!(f, "{r}");
        }
        let prefix = match self.kind {
            ErrorKind::Transport => "the transport reports an error",
            ErrorKind::Timeout => "the request exceeded the context deadline",
            ErrorKind::Cancelled => "the request context was cancelled",
            ErrorKind::Authentication => "cannot authenticate the request",
            ErrorKind::Deserialization => "cannot deserialize the response",
            ErrorKind::Serialization => "cannot serialize the request",
            ErrorKind::Usage => "invalid use of the client library",
            ErrorKind::Exhausted => "the retry policy is exhausted",
            ErrorKind::Throttled
            | ErrorKind::ServerTransient
            | ErrorKind::Client
            | ErrorKind::OperationFailed => "the service reports an error",
        };
        match &self.source {
            Some(e) => write!(f, "{prefix}: {e}"),
            None => write!(f, "{prefix}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
