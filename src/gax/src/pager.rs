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
use crate::context::Context;
use crate::error::Error;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, unfold};
use futures::{FutureExt, Stream, StreamExt};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;

/// A page returned by a list operation.
pub trait Page {
    /// The URL of the next page, if any.
    ///
    /// A missing or empty link marks the last page.
    fn next_link(&self) -> Option<&str>;
}

/// The page shape used by most Azure list operations.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
#[non_exhaustive]
pub struct PagedList<T> {
    #[serde(default)]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl<T> PagedList<T> {
    pub fn new<I: IntoIterator<Item = T>>(value: I) -> Self {
        Self {
            value: value.into_iter().collect(),
            next_link: None,
        }
    }

    pub fn set_next_link<V: Into<String>>(mut self, v: V) -> Self {
        self.next_link = Some(v.into());
        self
    }
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self {
            value: Vec::new(),
            next_link: None,
        }
    }
}

impl<T> Page for PagedList<T> {
    fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }
}

type PageFuture<P> = BoxFuture<'static, Result<P>>;
type FirstFn<P> = Box<dyn FnMut(Context) -> PageFuture<P> + Send>;
type AdvanceFn<P> = Box<dyn FnMut(Context, String) -> PageFuture<P> + Send>;

#[derive(Clone, Debug, PartialEq)]
enum State {
    NotStarted,
    More(String),
    Done,
}

/// A lazy cursor over the pages of a list operation.
///
/// The pager fetches nothing until the first call to
/// [next_page][Pager::next_page]. The first page is fetched with `first`,
/// every other page with `advance`, which receives the next link of the
/// previous page verbatim.
///
/// # Example
/// ```
/// # use azure_rest_gax::{context::Context, pager::{PagedList, Pager}};
/// # #[tokio::main]
/// # async fn main() -> azure_rest_gax::Result<()> {
/// let mut pager = Pager::new(
///     |_ctx| async { Ok(PagedList::new([1, 2]).set_next_link("https://example.com/page2")) },
///     |_ctx, link| async move {
///         assert_eq!(link, "https://example.com/page2");
///         Ok(PagedList::new([3]))
///     },
/// );
/// let mut items = Vec::new();
/// while pager.more() {
///     items.extend(pager.next_page(&Context::new()).await?.value);
/// }
/// assert_eq!(items, vec![1, 2, 3]);
/// # Ok(()) }
/// ```
pub struct Pager<P> {
    first: FirstFn<P>,
    advance: AdvanceFn<P>,
    state: State,
}

impl<P> std::fmt::Debug for Pager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<P> Pager<P>
where
    P: Page + Send + 'static,
{
    pub fn new<F, FF, A, AF>(mut first: F, mut advance: A) -> Self
    where
        F: FnMut(Context) -> FF + Send + 'static,
        FF: Future<Output = Result<P>> + Send + 'static,
        A: FnMut(Context, String) -> AF + Send + 'static,
        AF: Future<Output = Result<P>> + Send + 'static,
    {
        Self {
            first: Box::new(move |ctx| first(ctx).boxed()),
            advance: Box::new(move |ctx, link| advance(ctx, link).boxed()),
            state: State::NotStarted,
        }
    }

    /// Returns `true` until the last page has been fetched.
    pub fn more(&self) -> bool {
        self.state != State::Done
    }

    /// Fetches the next page.
    ///
    /// Returns a usage error, without any I/O, once the last page has been
    /// returned. If the fetch fails the cursor does not move, and the next
    /// call fetches the same page again.
    pub async fn next_page(&mut self, ctx: &Context) -> Result<P> {
        let pending = match &self.state {
            State::NotStarted => (self.first)(ctx.clone()),
            State::More(link) => (self.advance)(ctx.clone(), link.clone()),
            State::Done => return Err(Error::usage("the pager has no more pages")),
        };
        let page = pending.await?;
        self.state = match page.next_link() {
            Some(link) if !link.is_empty() => State::More(link.to_string()),
            _ => State::Done,
        };
        Ok(page)
    }

    /// Converts the pager into a stream of pages.
    ///
    /// The stream ends after the last page, or after the first error.
    pub fn into_stream(self, ctx: Context) -> PageStream<P> {
        let stream = unfold(Some(self), move |pager| {
            let ctx = ctx.clone();
            async move {
                let mut pager = pager?;
                if !pager.more() {
                    return None;
                }
                match pager.next_page(&ctx).await {
                    Ok(page) => Some((Ok(page), Some(pager))),
                    Err(e) => Some((Err(e), None)),
                }
            }
        });
        PageStream {
            stream: stream.boxed(),
        }
    }
}

impl<T> Pager<PagedList<T>>
where
    T: Send + 'static,
{
    /// Converts the pager into a stream of the items in each page.
    pub fn into_items(self, ctx: Context) -> impl Stream<Item = Result<T>> + Send {
        self.into_stream(ctx).flat_map(|page| match page {
            Ok(page) => futures::stream::iter(page.value.into_iter().map(Ok)).left_stream(),
            Err(e) => futures::stream::once(async move { Err(e) }).right_stream(),
        })
    }
}

/// The stream returned by [Pager::into_stream].
#[pin_project]
pub struct PageStream<P> {
    #[pin]
    stream: BoxStream<'static, Result<P>>,
}

impl<P> Stream for PageStream<P> {
    type Item = Result<P>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }
}
