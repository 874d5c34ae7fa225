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

//! The cancellation and deadline carried by each call.
//!
//! A [Context] is the sole authority on the lifetime of a call. It threads
//! through the pipeline, every policy, the transport, the retry sleeps, the
//! poller waits, and the pager fetches. There is no ambient or global
//! cancellation.
//!
//! # Example
//! ```
//! # use azure_rest_gax::context::Context;
//! use std::time::Duration;
//! let ctx = Context::new().with_timeout(Duration::from_secs(30));
//! let child = ctx.child();
//! ctx.cancel();
//! assert!(child.is_cancelled());
//! ```

use crate::Result;
use crate::error::{BoxError, Error};
use std::future::Future;
use std::time::Duration;
// Using tokio's wrapper makes deadlines testable without relying on clock times.
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carries the cancellation signal and the deadline of a call.
///
/// Cloning a context is cheap, and the clone shares the cancellation signal
/// with the original.
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

/// The reason a wait on a [Context] ended early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// The context was cancelled.
    Cancelled,
    /// The context deadline expired.
    DeadlineExceeded,
}

impl Interrupt {
    /// Converts the interruption into an [Error] with the given source.
    ///
    /// The retry engine uses the last error, or the last retryable status, as
    /// the source.
    pub fn into_error<T: Into<BoxError>>(self, source: T) -> Error {
        match self {
            Self::Cancelled => Error::cancelled(source),
            Self::DeadlineExceeded => Error::timeout(source),
        }
    }

    fn into_plain_error(self) -> Error {
        match self {
            Self::Cancelled => Error::cancelled("the request context was cancelled"),
            Self::DeadlineExceeded => Error::timeout("the request context deadline expired"),
        }
    }
}

impl Context {
    /// Creates a context without a deadline that is never cancelled unless
    /// [cancel][Context::cancel] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context observing an existing cancellation token.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the deadline, keeping the earliest one if a deadline is already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(d) => std::cmp::min(d, deadline),
            None => deadline,
        });
        self
    }

    /// Sets the deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Creates a child context.
    ///
    /// Cancelling the parent cancels the child, but cancelling the child does
    /// not affect the parent.
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and all its children.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true if the context is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The time remaining until the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns the reason this context is no longer usable, if any.
    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(d) if d <= Instant::now() => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns an error if the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        match self.interrupted() {
            None => Ok(()),
            Some(i) => Err(i.into_plain_error()),
        }
    }

    /// Sleeps for `duration`, returning early if the context is cancelled or
    /// its deadline expires first.
    pub async fn sleep(&self, duration: Duration) -> std::result::Result<(), Interrupt> {
        if let Some(i) = self.interrupted() {
            return Err(i);
        }
        let wake = Instant::now() + duration;
        match self.deadline {
            Some(deadline) if deadline <= wake => {
                tokio::select! {
                    _ = self.cancellation.cancelled() => Err(Interrupt::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(Interrupt::DeadlineExceeded),
                }
            }
            _ => {
                tokio::select! {
                    _ = self.cancellation.cancelled() => Err(Interrupt::Cancelled),
                    _ = tokio::time::sleep_until(wake) => Ok(()),
                }
            }
        }
    }

    /// Runs `future` to completion, unless the context is cancelled or its
    /// deadline expires first.
    ///
    /// Dropping the future interrupts any in-flight I/O cooperatively.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            r = future => r,
            _ = self.cancellation.cancelled() => Err(Interrupt::Cancelled.into_plain_error()),
            _ = deadline => Err(Interrupt::DeadlineExceeded.into_plain_error()),
        }
    }
}
