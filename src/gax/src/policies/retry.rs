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
use crate::backoff_policy::BackoffPolicy;
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::http::{Request, Response};
use crate::options::RetryOptions;
use crate::policy::{Next, Policy};
use crate::retry_after;
use crate::retry_policy::RetryPolicy;
use crate::retry_result::RetryResult;
use crate::retry_state::RetryState;
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// The source of a cancellation or timeout error when the last attempt
/// returned a retryable status.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
#[error("the last attempt returned the retryable HTTP status {0}")]
pub struct RetryableStatus(pub StatusCode);

// The failure that triggered a retry.
enum Outcome {
    Error(Error),
    Status(StatusCode),
}

impl Outcome {
    fn into_source(self) -> BoxError {
        match self {
            Self::Error(e) => e.into(),
            Self::Status(s) => RetryableStatus(s).into(),
        }
    }
}

/// Resends failed requests.
///
/// The engine runs once per call, and sends each attempt through the rest of
/// the pipeline. Between attempts it waits for the delay requested by the
/// service (`Retry-After` and related headers), or for the backoff delay if
/// the service did not request one. The wait is interrupted if the context is
/// cancelled or its deadline expires.
///
/// When the retry policy gives up on a retryable status, the engine returns
/// the last response. When it gives up on a transport error, the engine
/// returns that error wrapped as [exhausted][Error::is_exhausted].
#[derive(Debug)]
pub struct RetryEngine {
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
    max_attempts: u32,
    max_delay: Duration,
}

impl RetryEngine {
    pub fn new(options: &RetryOptions) -> Self {
        Self {
            retry_policy: options.retry_policy(),
            backoff_policy: options.backoff_policy(),
            max_attempts: options.max_attempts(),
            max_delay: options.max_delay(),
        }
    }

    fn delay(&self, state: &RetryState, server_delay: Option<Duration>) -> Duration {
        match server_delay {
            Some(d) => {
                let remaining = self.max_attempts.saturating_sub(state.attempt_count).max(1);
                std::cmp::min(d, self.max_delay.saturating_mul(remaining))
            }
            None => self
                .backoff_policy
                .on_failure(state.start, state.attempt_count),
        }
    }
}

#[async_trait::async_trait]
impl Policy for RetryEngine {
    async fn send(&self, ctx: &Context, mut request: Request, next: Next<'_>) -> Result<Response> {
        let mut state = RetryState::for_method(request.method());
        loop {
            state.attempt_count += 1;
            let attempt = request.split_attempt();
            let (outcome, server_delay) = match next.send(ctx, attempt).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => match self.retry_policy.on_status(&state, response.status()) {
                    RetryResult::Permanent | RetryResult::Exhausted => return Ok(response),
                    RetryResult::Continue => {
                        let delay = retry_after::server_delay(response.headers());
                        (Outcome::Status(response.status()), delay)
                    }
                },
                Err(e) if e.is_timeout() || e.is_cancelled() => return Err(e),
                Err(e) => match self.retry_policy.on_error(&state, &e) {
                    RetryResult::Permanent => return Err(e),
                    RetryResult::Exhausted => return Err(Error::exhausted(e)),
                    RetryResult::Continue => (Outcome::Error(e), None),
                },
            };
            if !request.body().is_rewindable() {
                return Err(Error::usage(NonRewindableBody {
                    source: outcome.into_source(),
                }));
            }
            let delay = self.delay(&state, server_delay);
            tracing::debug!(
                attempt = state.attempt_count,
                delay_ms = delay.as_millis() as u64,
                server_delay = server_delay.is_some(),
                "retrying request"
            );
            if let Err(interrupt) = ctx.sleep(delay).await {
                return Err(interrupt.into_error(outcome.into_source()));
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("the request body cannot be resent after a retryable failure")]
struct NonRewindableBody {
    source: BoxError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff_policy::FixedDelay;
    use crate::http::Body;
    use crate::http_client::HttpClient;
    use crate::pipeline::Pipeline;
    use bytes::Bytes;
    use futures::StreamExt;
    use http::{HeaderMap, HeaderValue, Method};
    use std::error::Error as _;
    use test_case::test_case;
    use tokio::time::Instant;

    mockall::mock! {
        #[derive(Debug)]
        Client {}
        #[async_trait::async_trait]
        impl HttpClient for Client {
            async fn execute(&self, request: Request) -> Result<Response>;
        }
    }

    fn options() -> RetryOptions {
        RetryOptions::default().set_backoff_policy(FixedDelay::new(Duration::from_secs(1)))
    }

    fn pipeline(transport: MockClient, options: RetryOptions) -> Pipeline {
        Pipeline::builder(Arc::new(transport))
            .with_retry(options)
            .build()
    }

    fn request(method: Method) -> Request {
        Request::new(
            method,
            url::Url::parse("https://management.azure.com/subscriptions/s/resourceGroups/rg")
                .expect("valid test URL"),
        )
    }

    fn status(code: u16) -> Result<Response> {
        let status = StatusCode::from_u16(code).expect("valid test status code");
        Ok(Response::new(status, HeaderMap::new(), Bytes::new()))
    }

    fn status_with_header(code: u16, name: &'static str, value: &'static str) -> Result<Response> {
        let status = StatusCode::from_u16(code).expect("valid test status code");
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        Ok(Response::new(status, headers, Bytes::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn retry_then_success() -> anyhow::Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status(503));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status(200));
        let start = Instant::now();
        let response = pipeline(transport, options())
            .send(&Context::new(), request(Method::GET))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_status_returns_last_response() -> anyhow::Result<()> {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(3)
            .returning(|_| status(503));
        let start = Instant::now();
        let response = pipeline(transport, options())
            .send(&Context::new(), request(Method::GET))
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        // Two waits between three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transport_error() {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(4)
            .returning(|_| Err(Error::io("connection reset")));
        let err = pipeline(transport, options().set_max_attempts(4))
            .send(&Context::new(), request(Method::PUT))
            .await
            .unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        let source = err
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .expect("exhausted errors wrap the last error");
        assert!(source.is_transport(), "{source:?}");
    }

    #[test_case(404)]
    #[test_case(400)]
    #[test_case(409)]
    #[test_case(501)]
    #[tokio::test(start_paused = true)]
    async fn permanent_status(code: u16) -> anyhow::Result<()> {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(move |_| status(code));
        let response = pipeline(transport, options())
            .send(&Context::new(), request(Method::GET))
            .await?;
        assert_eq!(response.status().as_u16(), code);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn non_idempotent() -> anyhow::Result<()> {
        // 5xx is not retried for POST.
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| status(503));
        let response = pipeline(transport, options())
            .send(&Context::new(), request(Method::POST))
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // 429 and transport errors are.
        let mut seq = mockall::Sequence::new();
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status(429));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::io("connection refused")));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status(201));
        let response = pipeline(transport, options())
            .send(&Context::new(), request(Method::POST))
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);

        // Unless the application opts in.
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(3)
            .returning(|_| status(500));
        let response = pipeline(transport, options().set_retry_non_idempotent(true))
            .send(&Context::new(), request(Method::PATCH))
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[test_case("retry-after", "7", Duration::from_secs(7); "seconds")]
    #[test_case("retry-after-ms", "1500", Duration::from_millis(1500); "milliseconds")]
    #[test_case("x-ms-retry-after-ms", "250", Duration::from_millis(250); "x-ms milliseconds")]
    #[tokio::test(start_paused = true)]
    async fn honors_retry_after(name: &'static str, value: &'static str, want: Duration) -> anyhow::Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| status_with_header(429, name, value));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status(200));
        let start = Instant::now();
        let response = pipeline(transport, options())
            .send(&Context::new(), request(Method::GET))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(start.elapsed(), want);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_is_capped() -> anyhow::Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status_with_header(503, "retry-after", "3600"));
        transport
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| status(200));
        let start = Instant::now();
        let options = options().set_max_delay(Duration::from_secs(10));
        pipeline(transport, options)
            .send(&Context::new(), request(Method::GET))
            .await?;
        // max_delay times the two remaining attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_waiting() {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| status_with_header(503, "retry-after", "60"));
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        let err = pipeline(transport, options())
            .send(&ctx, request(Method::GET))
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        assert!(start.elapsed() < Duration::from_millis(100));
        let source = err
            .source()
            .and_then(|e| e.downcast_ref::<RetryableStatus>())
            .expect("the source is the last retryable status");
        assert_eq!(source, &RetryableStatus(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_while_waiting() {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(Error::io("connection reset")));
        let ctx = Context::new().with_timeout(Duration::from_millis(500));
        let err = pipeline(transport, options())
            .send(&ctx, request(Method::GET))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        let source = err
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .expect("the source is the last error");
        assert!(source.is_transport(), "{source:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_not_retried() {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(Error::timeout("simulated")));
        let err = pipeline(transport, options())
            .send(&Context::new(), request(Method::GET))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn non_rewindable_body_is_not_resent() {
        let mut transport = MockClient::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| status(503));
        let mut req = request(Method::PUT);
        let chunks: Vec<std::result::Result<Bytes, BoxError>> =
            vec![Ok(Bytes::from_static(b"payload"))];
        req.set_body(Body::from_stream(futures::stream::iter(chunks).boxed()));
        let err = pipeline(transport, options())
            .send(&Context::new(), req)
            .await
            .unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn rewindable_body_is_resent() -> anyhow::Result<()> {
        let mut transport = MockClient::new();
        transport.expect_execute().times(2).returning({
            let mut count = 0;
            move |r| {
                assert!(matches!(r.body(), Body::Bytes(b) if b == "payload"), "{r:?}");
                count += 1;
                if count == 1 { status(500) } else { status(200) }
            }
        });
        let mut req = request(Method::PUT);
        req.set_body(Bytes::from_static(b"payload"));
        let response = pipeline(transport, options())
            .send(&Context::new(), req)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
