//! Cursor-based pagination over list endpoints.
//!
//! Pages are requested strictly one after another: the next request is only issued once
//! the previous page has been fully yielded. There is no snapshot isolation and no
//! deduplication; if the server shifts data between requests, items may repeat or be
//! skipped.

use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// Opaque continuation cursor; `None` or empty means this was the last page
    pub next_cursor: Option<String>,
}

impl<T> PageResult<T> {
    pub fn new(items: Option<Vec<T>>, next_cursor: Option<String>) -> Self {
        Self {
            items: items.unwrap_or_default(),
            next_cursor,
        }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Walk a paged list endpoint, yielding every item of every page in order.
///
/// `request` receives the continuation cursor (`None` for the first page) and performs
/// one round-trip. The first error ends the stream; items already yielded stay yielded.
pub fn fetch_pages<T, E, F, Fut>(request: F) -> impl Stream<Item = Result<T, E>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, E>>,
{
    stream::try_unfold((request, Cursor::Start, 0usize), |(mut request, cursor, page)| async move {
        let cursor = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let result = request(cursor).await?;
        let next = match result.next_cursor {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        };
        tracing::debug!(
            "Fetched page {} ({} items, more: {})",
            page + 1,
            result.items.len(),
            matches!(next, Cursor::Next(_))
        );

        Ok::<_, E>(Some((result.items, (request, next, page + 1))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, E>)))
    .try_flatten()
}

/// Collect a stream of pages into a single vector, stopping at the first error
pub async fn collect_all<T, E, S>(items: S) -> Result<Vec<T>, E>
where
    S: Stream<Item = Result<T, E>>,
{
    items.try_collect().await
}
