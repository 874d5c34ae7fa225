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

//! The request and response types flowing through the pipeline.
//!
//! A [Request] is mutable until it is handed to the pipeline. The pipeline
//! produces a [Response] with a fully buffered body, so the body can be read
//! more than once (e.g. by the error decoder and by a logging policy).

use crate::Result;
use crate::error::{BoxError, Error};
use bytes::Bytes;
use futures::stream::BoxStream;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// A stream of body chunks that can be sent only once.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// The body of a [Request].
pub enum Body {
    /// No body.
    Empty,
    /// A buffered body. It can be resent on each retry attempt.
    Bytes(Bytes),
    /// A streaming body. It cannot be rewound, so a request carrying it is
    /// sent at most once.
    Stream(StreamBody),
}

/// A non-rewindable body.
///
/// The stream is moved into the first attempt that sends it. Any later
/// attempt finds it empty.
pub struct StreamBody(Option<ByteStream>);

impl StreamBody {
    /// Takes the stream, leaving this body empty.
    pub fn take(&mut self) -> Option<ByteStream> {
        self.0.take()
    }
}

impl Body {
    /// Creates a non-rewindable body from a stream.
    pub fn from_stream(stream: ByteStream) -> Self {
        Self::Stream(StreamBody(Some(stream)))
    }

    /// Returns true if the body can be sent more than once.
    pub fn is_rewindable(&self) -> bool {
        !matches!(self, Self::Stream(_))
    }

    /// Returns the length of a buffered body.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(b) => Some(b.len()),
            Self::Stream(_) => None,
        }
    }

    /// Returns true if the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    fn split(&mut self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Bytes(b) => Self::Bytes(b.clone()),
            Self::Stream(s) => Self::Stream(StreamBody(s.take())),
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Stream(s) if s.0.is_some() => write!(f, "Stream"),
            Self::Stream(_) => write!(f, "Stream(consumed)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

/// An outgoing HTTP request.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Takes the body, leaving [Body::Empty] in its place.
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Empty)
    }

    pub fn set_body<B: Into<Body>>(&mut self, body: B) {
        self.body = body.into();
    }

    /// Sets a header, replacing any previous values.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Serializes `value` as the JSON body and sets the `content-type` header.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_gax::http::Request;
    /// let mut request = Request::new(http::Method::PUT, url::Url::parse("https://example.com/r").unwrap());
    /// request.set_json(&serde_json::json!({"location": "westus"}))?;
    /// assert_eq!(request.headers().get("content-type").unwrap(), "application/json");
    /// # Ok::<(), azure_rest_gax::error::Error>(())
    /// ```
    pub fn set_json<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value).map_err(Error::ser)?;
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Body::Bytes(Bytes::from(body));
        Ok(())
    }

    /// Creates the request sent by one attempt.
    ///
    /// Buffered bodies are shared with the attempt. A streaming body moves
    /// into the attempt, and later attempts see an empty stream.
    pub fn split_attempt(&mut self) -> Request {
        Request {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.split(),
        }
    }

    /// The method and URL of this request.
    pub fn info(&self) -> RequestInfo {
        RequestInfo {
            method: self.method.clone(),
            url: self.url.clone(),
        }
    }
}

/// A snapshot of the method and URL of the request behind a [Response].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestInfo {
    method: Method,
    url: Url,
}

impl RequestInfo {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// An HTTP response with a buffered body.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    request: Option<RequestInfo>,
}

impl Response {
    /// Creates a response. The transport policy fills in the originating
    /// request.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            request: None,
        }
    }

    /// Creates a response with a JSON body, mostly useful in tests.
    pub fn from_json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, Bytes::from(value.to_string()))
    }

    /// Sets the originating request.
    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Some(request);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// The request that produced this response, if known.
    pub fn request(&self) -> Option<&RequestInfo> {
        self.request.as_ref()
    }

    /// Returns the value of a header as a string, ignoring non-ASCII values.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns true if the status code is one of `codes`.
    pub fn has_status_code(&self, codes: &[u16]) -> bool {
        codes.contains(&self.status.as_u16())
    }

    /// Decodes the body as JSON.
    ///
    /// An empty body decodes as `T::default()`, which covers `204 No Content`
    /// and other responses without a payload.
    pub fn json<T>(&self) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice::<T>(&self.body)
            .map_err(|e| Error::deser_with_payload(e, self.body.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use test_case::test_case;

    fn url() -> Url {
        Url::parse("https://management.azure.com/subscriptions/s").expect("valid test URL")
    }

    #[test]
    fn split_bytes() {
        let mut request = Request::new(Method::PUT, url());
        request.set_body(Bytes::from_static(b"abc"));
        let first = request.split_attempt();
        let second = request.split_attempt();
        assert!(matches!(first.body(), Body::Bytes(b) if b == "abc"));
        assert!(matches!(second.body(), Body::Bytes(b) if b == "abc"));
        assert!(request.body().is_rewindable());
    }

    #[tokio::test]
    async fn split_stream() {
        let stream = futures::stream::iter(vec![Ok(Bytes::from_static(b"abc"))]).boxed();
        let mut request = Request::new(Method::POST, url());
        request.set_body(Body::from_stream(stream));
        assert!(!request.body().is_rewindable());
        assert_eq!(request.body().len(), None);

        let mut first = request.split_attempt();
        let mut second = request.split_attempt();
        let Body::Stream(mut s) = first.take_body() else {
            panic!("expected a stream body, got {:?}", first.body());
        };
        let chunks = s.take().expect("first attempt owns the stream").collect::<Vec<_>>().await;
        assert_eq!(chunks.len(), 1);
        let Body::Stream(mut s) = second.take_body() else {
            panic!("expected a stream body, got {:?}", second.body());
        };
        assert!(s.take().is_none());
    }

    #[test]
    fn set_json() -> anyhow::Result<()> {
        let mut request = Request::new(Method::PUT, url());
        request.set_json(&json!({"a": 1}))?;
        assert_eq!(
            request.headers().get(http::header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert!(matches!(request.body(), Body::Bytes(b) if b == r#"{"a":1}"#));
        Ok(())
    }

    #[derive(Debug, Default, PartialEq, serde::Deserialize)]
    struct Thing {
        a: i32,
    }

    #[test_case(""; "empty")]
    #[test_case("  \n"; "whitespace")]
    fn json_empty(body: &'static str) -> anyhow::Result<()> {
        let response = Response::new(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::from_static(body.as_bytes()));
        let got = response.json::<Thing>()?;
        assert_eq!(got, Thing::default());
        Ok(())
    }

    #[test]
    fn json_success() -> anyhow::Result<()> {
        let response = Response::from_json(StatusCode::OK, &json!({"a": 1}));
        assert_eq!(response.json::<Thing>()?, Thing { a: 1 });
        assert!(response.has_status_code(&[200, 201]));
        assert!(!response.has_status_code(&[202]));
        Ok(())
    }

    #[test]
    fn json_error_keeps_payload() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"{not json"));
        let err = response.json::<Thing>().unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        assert_eq!(err.raw_body(), Some(&Bytes::from_static(b"{not json")));
    }

    #[test]
    fn debug_body() {
        assert_eq!(format!("{:?}", Body::Empty), "Empty");
        assert_eq!(format!("{:?}", Body::Bytes(Bytes::from_static(b"abc"))), "Bytes(3 bytes)");
    }
}
