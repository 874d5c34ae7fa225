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

use crate::resume_token;
use crate::state::{FinalResult, PollingState};
use crate::status::Status;
use crate::strategy::{FinalStateVia, Strategy};
use futures::Stream;
use futures::stream::unfold;
use gax::Result;
use gax::backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use gax::client::check_status;
use gax::context::Context;
use gax::error::{Error, ResponseError};
use gax::exponential_backoff::ExponentialBackoff;
use gax::http::{Request, Response};
use gax::pipeline::Pipeline;
use gax::retry_after::server_delay;
use http::header::ACCEPT;
use http::{HeaderValue, Method};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Configures how a [Poller] waits between polls.
///
/// The delay before each poll is the `Retry-After` delay of the last
/// response when present. Otherwise it is the fixed
/// [frequency][PollerOptions::set_frequency] when set, and the
/// [backoff policy][PollerOptions::set_backoff_policy] otherwise. The default
/// policy starts at one second and doubles up to one minute.
#[derive(Clone, Debug, Default)]
pub struct PollerOptions {
    final_state_via: FinalStateVia,
    frequency: Option<Duration>,
    backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
}

impl PollerOptions {
    pub fn final_state_via(&self) -> FinalStateVia {
        self.final_state_via
    }

    /// Selects where the result of the operation is found.
    ///
    /// Pollers loaded from a resume token use the value in the token.
    pub fn set_final_state_via(mut self, v: FinalStateVia) -> Self {
        self.final_state_via = v;
        self
    }

    pub fn frequency(&self) -> Option<Duration> {
        self.frequency
    }

    /// Polls at a fixed frequency when the service does not suggest a delay.
    pub fn set_frequency(mut self, v: Duration) -> Self {
        self.frequency = Some(v);
        self
    }

    /// Replaces the polling backoff policy.
    pub fn set_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        let arg: PollingBackoffPolicyArg = v.into();
        self.backoff_policy = Some(arg.into());
        self
    }

    /// The polling backoff policy.
    pub fn backoff_policy(&self) -> Arc<dyn PollingBackoffPolicy> {
        if let Some(p) = &self.backoff_policy {
            return p.clone();
        }
        Arc::new(ExponentialBackoff::default())
    }
}

/// Drives a long-running operation to completion.
///
/// A poller starts from the initial response of the operation, or from a
/// [resume token][Poller::resume_token] saved by another poller. Each call to
/// [poll][Poller::poll] sends at most one request. Calls made before the
/// polling delay elapses return the last known status without any I/O.
///
/// # Example
/// ```
/// # use azure_rest_lro::{Poller, PollerOptions};
/// # use gax::context::Context;
/// # use gax::http::Response;
/// # use gax::pipeline::Pipeline;
/// # #[derive(Debug, Default, serde::Deserialize)]
/// # struct ResourceGroup { name: String }
/// # async fn sample(initial: Response, pipeline: Pipeline) -> gax::Result<()> {
/// let poller = Poller::<ResourceGroup>::new(initial, pipeline, PollerOptions::default())?;
/// let group = poller.poll_until_done(&Context::new()).await?;
/// println!("created {}", group.name);
/// # Ok(()) }
/// ```
pub struct Poller<T> {
    pipeline: Pipeline,
    options: PollerOptions,
    state: PollingState,
    last_response: Option<Response>,
    // No poll is sent before this instant.
    not_before: Option<Instant>,
    loop_start: Instant,
    attempt_count: u32,
    result: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Poller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("state", &self.state)
            .field("not_before", &self.not_before)
            .field("attempt_count", &self.attempt_count)
            .finish_non_exhaustive()
    }
}

impl<T> Poller<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    /// Creates a poller from the initial response of an operation.
    ///
    /// The response must come from a [Pipeline], which records the
    /// originating request. Responses with an unexpected status code are
    /// returned as service errors.
    pub fn new(initial: Response, pipeline: Pipeline, options: PollerOptions) -> Result<Self> {
        let state = PollingState::from_initial(&initial, options.final_state_via)?;
        tracing::debug!(strategy = ?state.strategy, status = %state.status, "starting long-running operation");
        let mut poller = Self::with_state(state, pipeline, options);
        let delay = poller.delay(&initial);
        poller.not_before = Some(poller.loop_start + delay);
        poller.last_response = Some(initial);
        Ok(poller)
    }

    /// Loads a poller from a token returned by [resume_token][Poller::resume_token].
    ///
    /// The first poll is sent without waiting.
    pub fn from_resume_token(token: &str, pipeline: Pipeline, options: PollerOptions) -> Result<Self> {
        let state = resume_token::decode(token)?;
        Ok(Self::with_state(state, pipeline, options))
    }

    fn with_state(state: PollingState, pipeline: Pipeline, options: PollerOptions) -> Self {
        Self {
            pipeline,
            options,
            state,
            last_response: None,
            not_before: None,
            loop_start: Instant::now(),
            attempt_count: 0,
            result: PhantomData,
        }
    }

    /// Returns `true` once the operation reaches a terminal state.
    pub fn done(&self) -> bool {
        self.state.status.is_terminal()
    }

    /// The last known status.
    pub fn status(&self) -> Status {
        self.state.status
    }

    pub fn strategy(&self) -> Strategy {
        self.state.strategy
    }

    /// Returns a token to resume polling in another poller, possibly in a
    /// different process.
    ///
    /// Completed operations have no token, this returns a usage error.
    pub fn resume_token(&self) -> Result<String> {
        resume_token::encode(&self.state)
    }

    /// Polls the operation once, unless it is too early to do so.
    ///
    /// Returns the current status. A failed poll leaves the poller
    /// unchanged, the next call tries again.
    pub async fn poll(&mut self, ctx: &Context) -> Result<Status> {
        if self.done() {
            return Ok(self.state.status);
        }
        if self.not_before.is_some_and(|t| Instant::now() < t) {
            return Ok(self.state.status);
        }
        let Some(url) = self.state.poll_url.clone() else {
            return Err(Error::usage("the operation has no polling URL"));
        };
        let response = self.pipeline.send(ctx, get(url)).await?;
        self.state.update(&response)?;
        self.attempt_count = self.attempt_count.saturating_add(1);
        let delay = self.delay(&response);
        self.not_before = Some(Instant::now() + delay);
        tracing::debug!(status = %self.state.status, attempt_count = self.attempt_count, "polled long-running operation");
        self.last_response = Some(response);
        Ok(self.state.status)
    }

    /// Returns the result of a completed operation.
    ///
    /// Some operations require a final `GET` to fetch the result, this method
    /// sends it on each call. Failed or canceled operations return an
    /// [operation failed][Error::is_operation_failed] error, and operations
    /// that are not done return a usage error.
    pub async fn result(&mut self, ctx: &Context) -> Result<T> {
        match self.state.status {
            Status::InProgress => Err(Error::usage("the operation is not done")),
            Status::Failed | Status::Canceled => Err(self.failure()),
            Status::Succeeded => match self.state.final_result() {
                FinalResult::Nothing => Ok(T::default()),
                FinalResult::LastResponse => match &self.last_response {
                    Some(response) => response.json(),
                    None => Ok(T::default()),
                },
                FinalResult::Get(url) => {
                    let response = self.pipeline.send(ctx, get(url)).await?;
                    check_status(response, &[200, 201])?.json()
                }
            },
        }
    }

    /// Polls until the operation is done and returns its result.
    ///
    /// Waits observe the context, a cancelled context or an expired deadline
    /// stops polling with the corresponding error.
    pub async fn poll_until_done(mut self, ctx: &Context) -> Result<T> {
        while !self.done() {
            self.wait(ctx).await?;
            self.poll(ctx).await?;
        }
        self.result(ctx).await
    }

    /// Converts the poller into a stream of statuses, one per poll.
    ///
    /// The stream waits between polls and ends after the terminal status or
    /// after the first error.
    pub fn into_stream(self, ctx: Context) -> impl Stream<Item = Result<Status>> + Send {
        unfold(Some(self), move |poller| {
            let ctx = ctx.clone();
            async move {
                let mut poller = poller?;
                if poller.done() {
                    return None;
                }
                let status = match poller.wait(&ctx).await {
                    Ok(()) => poller.poll(&ctx).await,
                    Err(e) => Err(e),
                };
                match status {
                    Ok(s) => Some((Ok(s), Some(poller))),
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }

    async fn wait(&self, ctx: &Context) -> Result<()> {
        let Some(wait) = self
            .not_before
            .map(|t| t.saturating_duration_since(Instant::now()))
            .filter(|d| !d.is_zero())
        else {
            return ctx.check();
        };
        ctx.sleep(wait)
            .await
            .map_err(|i| i.into_error("interrupted while waiting to poll the long-running operation"))
    }

    fn delay(&self, response: &Response) -> Duration {
        server_delay(response.headers())
            .or(self.options.frequency)
            .unwrap_or_else(|| {
                self.options
                    .backoff_policy()
                    .wait_period(self.loop_start, self.attempt_count.max(1))
            })
    }

    fn failure(&self) -> Error {
        let status = self.state.status.as_str();
        let error = match &self.last_response {
            Some(response) => ResponseError::from_response(response),
            None => ResponseError::from_parts(0, http::HeaderMap::new(), Default::default()),
        };
        Error::operation_failed(status, error)
    }
}

fn get(url: url::Url) -> Request {
    let mut request = Request::new(Method::GET, url);
    request.insert_header(ACCEPT, HeaderValue::from_static("application/json"));
    request
}
