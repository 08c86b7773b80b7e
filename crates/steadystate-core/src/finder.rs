//! Remote lookups over paginated list APIs
//!
//! List-style reads are exposed as a lazily paginated stream of items.
//! `find_member` scans that stream for one exact member and only reports
//! `NotFound` once every page has been read.

use crate::error::{CoreError, Result};
use futures_util::stream::{self, Stream, TryStreamExt};
use futures_util::{future, pin_mut};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Continuation token; `None` (or empty) on the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

type Cursor<F> = (F, Option<Option<String>>);

async fn next_page<T, F, Fut>(cursor: Cursor<F>) -> Result<Option<(Vec<T>, Cursor<F>)>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let (mut fetch, token) = cursor;
    let Some(token) = token else {
        return Ok(None);
    };

    let page = fetch(token).await?;
    let next = page.next_token.filter(|t| !t.is_empty());
    tracing::debug!(
        "fetched page with {} items (more: {})",
        page.items.len(),
        next.is_some()
    );

    // `Some(None)` means "fetch the next page without a token", so only a
    // real continuation token schedules another request
    let following = next.map(Some);
    Ok(Some((page.items, (fetch, following))))
}

/// Turn a page-fetching function into a lazy stream of items.
///
/// `fetch` receives the continuation token (`None` for the first page).
/// Pages are requested only as the stream is polled.
pub fn paginate<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream::try_unfold((fetch, Some(None)), next_page::<T, F, Fut>)
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, CoreError>)))
        .try_flatten()
}

/// Find the first item matching `predicate`, reading further pages only
/// while no match has been seen.
///
/// An exhausted stream without a match is `NotFound` (a drift condition),
/// which differs from an empty but successful collection.
pub async fn find_member<T, S, P>(items: S, what: &str, mut predicate: P) -> Result<T>
where
    S: Stream<Item = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let matches = items.try_filter(move |item| future::ready(predicate(item)));
    pin_mut!(matches);

    match matches.try_next().await? {
        Some(item) => Ok(item),
        None => {
            tracing::debug!("{} not found after exhausting all pages", what);
            Err(CoreError::not_found(what))
        }
    }
}

/// Read every page and collect all items
pub async fn collect_all<T, S>(items: S) -> Result<Vec<T>>
where
    S: Stream<Item = Result<T>>,
{
    items.try_collect().await
}
