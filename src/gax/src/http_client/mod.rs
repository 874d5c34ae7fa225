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

use crate::Result;
use crate::error::{DEFAULT_MAX_ERROR_BODY, Error};
use crate::http::{Body, Request, Response};
use bytes::{Bytes, BytesMut};
use std::time::Duration;

/// Sends a single HTTP request and returns the buffered response.
///
/// Implementations must be safe to share across tasks. Any status code is a
/// successful exchange: the transport returns an error only when it could not
/// send the request or receive the response. The transport never retries.
///
/// Applications can replace the default transport, for example to route
/// requests through a proxy, or to use a fake in tests.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    async fn execute(&self, request: Request) -> Result<Response>;
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The default transport, based on [reqwest].
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a transport with a new connection pool.
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(Error::io)?;
        Ok(Self { inner })
    }

    /// Creates a transport sharing an existing [reqwest::Client].
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        let body = match request.take_body() {
            Body::Empty => None,
            Body::Bytes(b) => Some(reqwest::Body::from(b)),
            Body::Stream(mut s) => {
                let stream = s
                    .take()
                    .ok_or_else(|| Error::usage("the request body stream was already consumed"))?;
                Some(reqwest::Body::wrap_stream(stream))
            }
        };
        let mut builder = self
            .inner
            .request(request.method().clone(), request.url().as_str())
            .headers(request.headers().clone());
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(Error::io)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = if status.is_client_error() || status.is_server_error() {
            read_bounded(response, DEFAULT_MAX_ERROR_BODY).await?
        } else {
            response.bytes().await.map_err(Error::io)?
        };
        Ok(Response::new(status, headers, body))
    }
}

// Error payloads are only kept up to `limit` bytes. One extra byte is kept so
// the decoder can tell the payload was truncated, the rest is never read.
async fn read_bounded(mut response: reqwest::Response, limit: usize) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(Error::io)? {
        buffer.extend_from_slice(&chunk);
        if buffer.len() > limit {
            buffer.truncate(limit + 1);
            break;
        }
    }
    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use http::Method;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    #[tokio::test]
    async fn execute_get() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/items"),
                request::headers(contains(("x-test", "abc"))),
            ])
            .respond_with(
                status_code(200)
                    .insert_header("x-ms-request-id", "req-1")
                    .body(r#"{"a": 1}"#),
            ),
        );
        let client = ReqwestClient::new()?;
        let mut request = Request::new(Method::GET, url::Url::parse(&server.url_str("/items"))?);
        request.insert_header(
            http::HeaderName::from_static("x-test"),
            http::HeaderValue::from_static("abc"),
        );
        let response = client.execute(request).await?;
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.header_str("x-ms-request-id"), Some("req-1"));
        assert_eq!(response.body().as_ref(), br#"{"a": 1}"#);
        Ok(())
    }

    #[tokio::test]
    async fn execute_non_success_is_not_an_error() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/items/1"))
                .respond_with(status_code(503)),
        );
        let client = ReqwestClient::new()?;
        let request = Request::new(Method::DELETE, url::Url::parse(&server.url_str("/items/1"))?);
        let response = client.execute(request).await?;
        assert_eq!(response.status(), http::StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn execute_stream_body() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/upload"),
                request::headers(contains(("transfer-encoding", "chunked"))),
                request::body("hello world"),
            ])
            .respond_with(status_code(201)),
        );
        let client = ReqwestClient::new()?;
        let chunks = vec![
            Ok(bytes::Bytes::from_static(b"hello ")),
            Ok(bytes::Bytes::from_static(b"world")),
        ];
        let mut request = Request::new(Method::POST, url::Url::parse(&server.url_str("/upload"))?);
        request.set_body(Body::from_stream(futures::stream::iter(chunks).boxed()));
        let response = client.execute(request).await?;
        assert_eq!(response.status(), http::StatusCode::CREATED);
        Ok(())
    }

    #[tokio::test]
    async fn error_body_is_bounded() -> anyhow::Result<()> {
        let server = Server::run();
        let large = "x".repeat(DEFAULT_MAX_ERROR_BODY + 4096);
        server.expect(
            Expectation::matching(request::method_path("GET", "/large"))
                .respond_with(status_code(500).body(large)),
        );
        let client = ReqwestClient::new()?;
        let request = Request::new(Method::GET, url::Url::parse(&server.url_str("/large"))?);
        let response = client.execute(request).await?;
        assert_eq!(response.body().len(), DEFAULT_MAX_ERROR_BODY + 1);

        let error = crate::error::ResponseError::from_response(&response);
        assert!(error.is_truncated(), "{error:?}");
        assert_eq!(error.raw_body().len(), DEFAULT_MAX_ERROR_BODY);
        Ok(())
    }

    #[tokio::test]
    async fn success_body_is_not_bounded() -> anyhow::Result<()> {
        let server = Server::run();
        let large = "x".repeat(DEFAULT_MAX_ERROR_BODY + 4096);
        server.expect(
            Expectation::matching(request::method_path("GET", "/large"))
                .respond_with(status_code(200).body(large)),
        );
        let client = ReqwestClient::new()?;
        let request = Request::new(Method::GET, url::Url::parse(&server.url_str("/large"))?);
        let response = client.execute(request).await?;
        assert_eq!(response.body().len(), DEFAULT_MAX_ERROR_BODY + 4096);
        Ok(())
    }

    #[tokio::test]
    async fn execute_connection_refused() -> anyhow::Result<()> {
        // Find a port with no listener by binding and dropping a socket.
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);
        let client = ReqwestClient::new()?;
        let request = Request::new(Method::GET, url::Url::parse(&format!("http://{addr}/"))?);
        let err = client.execute(request).await.unwrap_err();
        assert!(err.is_transport(), "{err:?}");
        assert!(err.is_transient(), "{err:?}");
        Ok(())
    }
}
