//! Live query handles for UI consumers.
//!
//! Inspired by TanStack Query, a `QueryHandle` is what a view holds while it
//! shows a query: it owns a subscription to the cache entry, exposes the
//! loading/success/error state, and can refetch or load the next page.
//!
//! # Example
//!
//! ```ignore
//! let mut popular = api.popular(1, QueryOptions::default());
//!
//! // In event loop tick
//! if popular.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match popular.state().status {
//!     QueryStatus::Loading if popular.data().is_none() => render_spinner(),
//!     QueryStatus::Error => render_retry(popular.error()),
//!     _ => render_movies(popular.data()),
//! }
//! ```

use crate::cache::{CacheEntry, QueryCache, QueryKey, Subscription};
use crate::error::HttpError;

/// Options accepted when opening a query.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
  /// Do not fetch; the handle stays idle
  pub skip: bool,
}

impl QueryOptions {
  pub fn skip_if(skip: bool) -> Self {
    Self { skip }
  }
}

/// Subscribed view of one query.
///
/// Dropping the handle stops updates but never cancels a running fetch.
pub struct QueryHandle<Q: QueryKey> {
  cache: QueryCache<Q>,
  query: Q,
  skip: bool,
  subscription: Option<Subscription<Q::Data>>,
  state: CacheEntry<Q::Data>,
}

impl<Q: QueryKey> QueryCache<Q> {
  /// Open a query: subscribe to its entry and start a fetch if one is needed.
  ///
  /// Must be called from within a tokio runtime.
  pub fn query(&self, query: Q, options: QueryOptions) -> QueryHandle<Q> {
    let key = query.cache_key();

    if options.skip {
      return QueryHandle {
        cache: self.clone(),
        state: CacheEntry::idle(key),
        query,
        skip: true,
        subscription: None,
      };
    }

    let mut subscription = self.subscribe(&key);
    self.prefetch(query.clone());
    // Mark the snapshot taken here as seen
    let state = subscription.poll().unwrap_or_else(|| subscription.current());

    QueryHandle {
      cache: self.clone(),
      query,
      skip: false,
      subscription: Some(subscription),
      state,
    }
  }
}

impl<Q: QueryKey> QueryHandle<Q> {
  /// Last snapshot observed by `poll`, `changed` or `resolve`.
  pub fn state(&self) -> &CacheEntry<Q::Data> {
    &self.state
  }

  pub fn data(&self) -> Option<&Q::Data> {
    self.state.data()
  }

  pub fn error(&self) -> Option<&HttpError> {
    self.state.error()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn is_skipped(&self) -> bool {
    self.skip
  }

  /// The query as currently pointed (page included).
  pub fn query(&self) -> &Q {
    &self.query
  }

  /// Pick up a new snapshot if one arrived.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick.
  pub fn poll(&mut self) -> bool {
    let Some(subscription) = self.subscription.as_mut() else {
      return false;
    };
    match subscription.poll() {
      Some(entry) => {
        self.state = entry;
        true
      }
      None => false,
    }
  }

  /// Wait for the next snapshot. Returns `false` for skipped handles or once
  /// the entry has been dropped from the cache.
  pub async fn changed(&mut self) -> bool {
    let Some(subscription) = self.subscription.as_mut() else {
      return false;
    };
    match subscription.changed().await {
      Some(entry) => {
        self.state = entry;
        true
      }
      None => false,
    }
  }

  /// Wait until the current page of this query has resolved.
  pub async fn resolve(&mut self) -> &CacheEntry<Q::Data> {
    if self.skip {
      return &self.state;
    }
    self.state = self.cache.fetch(self.query.clone()).await;
    if let Some(subscription) = self.subscription.as_mut() {
      subscription.poll();
    }
    &self.state
  }

  /// Force a fresh fetch from page 1.
  pub fn refetch(&mut self) {
    if self.skip {
      return;
    }
    self.query = self.query.with_page(1);
    self.cache.start_refetch(&self.query);
  }

  /// Ask for the page after the last one fetched.
  ///
  /// A next page that failed is requested again. Returns `false` when the
  /// list is exhausted or a fetch is already running.
  pub fn fetch_next_page(&mut self) -> bool {
    if self.skip || self.state.is_loading() {
      return false;
    }
    let pagination = self.state.pagination;
    if !pagination.has_next_page() {
      return false;
    }
    let next = pagination.page + 1;
    let failed = self.state.is_error() && self.query.page() == next;
    self.query = self.query.with_page(next);
    if failed {
      self.cache.start_retry(self.query.clone());
    } else {
      self.cache.prefetch(self.query.clone());
    }
    true
  }
}

impl<Q: QueryKey> std::fmt::Debug for QueryHandle<Q>
where
  Q::Data: std::fmt::Debug,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryHandle")
      .field("query", &self.query)
      .field("skip", &self.skip)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::testing::{TestFetcher, TestQuery};
  use crate::cache::{CacheConfig, QueryStatus};
  use std::time::Duration;

  fn cache_with(fetcher: &TestFetcher) -> QueryCache<TestQuery> {
    QueryCache::new(fetcher.clone(), CacheConfig::default())
  }

  #[tokio::test]
  async fn test_query_success() {
    let fetcher = TestFetcher::with_delay(Duration::from_millis(10));
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("popular", 1), QueryOptions::default());
    assert!(handle.is_loading());
    assert!(handle.data().is_none());

    assert!(handle.changed().await);
    assert!(handle.is_success());
    assert_eq!(handle.data().unwrap().items, vec![11, 12]);
  }

  #[tokio::test]
  async fn test_skip_does_not_fetch() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("search:", 1), QueryOptions::skip_if(true));
    assert!(handle.is_skipped());
    assert_eq!(handle.state().status, QueryStatus::Idle);
    assert!(!handle.poll());
    assert_eq!(handle.resolve().await.status, QueryStatus::Idle);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fetcher.calls(), 0);
  }

  #[tokio::test]
  async fn test_poll_picks_up_result() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("popular", 1), QueryOptions::default());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(handle.poll());
    assert!(handle.is_success());
    assert!(!handle.poll());
  }

  #[tokio::test]
  async fn test_cached_query_is_ready_immediately() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);
    cache.fetch(TestQuery::new("popular", 1)).await;

    let handle = cache.query(TestQuery::new("popular", 1), QueryOptions::default());
    assert!(handle.is_success());
    assert_eq!(fetcher.calls(), 1);
  }

  #[tokio::test]
  async fn test_fetch_next_page_appends() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("popular", 1), QueryOptions::default());
    handle.resolve().await;
    assert!(handle.fetch_next_page());
    assert_eq!(handle.query().page, 2);

    let entry = handle.resolve().await;
    assert_eq!(entry.data().unwrap().items, vec![11, 12, 21, 22]);
    assert_eq!(entry.page(), 2);
  }

  #[tokio::test]
  async fn test_failed_next_page_is_fetched_again() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("popular", 1), QueryOptions::default());
    handle.resolve().await;
    fetcher.set_failing(true);
    assert!(handle.fetch_next_page());
    assert!(handle.resolve().await.is_error());

    fetcher.set_failing(false);
    assert!(handle.fetch_next_page());
    let entry = handle.resolve().await;

    assert_eq!(fetcher.calls(), 3);
    assert_eq!(entry.data().unwrap().items, vec![11, 12, 21, 22]);
    assert_eq!(entry.page(), 2);
  }

  #[tokio::test]
  async fn test_fetch_next_page_stops_at_last_page() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("popular", 5), QueryOptions::default());
    handle.resolve().await;
    assert!(!handle.fetch_next_page());
  }

  #[tokio::test]
  async fn test_refetch_resets_to_first_page() {
    let fetcher = TestFetcher::default();
    let cache = cache_with(&fetcher);

    let mut handle = cache.query(TestQuery::new("popular", 1), QueryOptions::default());
    handle.resolve().await;
    handle.fetch_next_page();
    handle.resolve().await;

    handle.refetch();
    let entry = handle.resolve().await;
    assert_eq!(entry.data().unwrap().items, vec![11, 12]);
    assert_eq!(fetcher.calls(), 3);
  }
}
