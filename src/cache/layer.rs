//! Query cache that orchestrates caching, merging and deduplication of fetches.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::entry::{CacheEntry, QueryStatus};
use super::subscription::{Subscription, Unsubscribe};
use super::traits::{CacheKey, Fetcher, QueryKey, Tag};
use crate::error::HttpError;

/// Tuning knobs for the query cache.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
  /// Upper bound on a single fetch; a fetch that exceeds it resolves to
  /// `HttpError::Timeout`
  pub request_timeout: Option<Duration>,
  /// Age after which an entry is refetched as if invalidated
  pub stale_after: Option<chrono::Duration>,
}

type SharedFetch<D> = Shared<BoxFuture<'static, CacheEntry<D>>>;

struct InFlight<D> {
  page: u32,
  fetch: SharedFetch<D>,
}

/// Live state for one cache key.
struct Slot<D> {
  entry: CacheEntry<D>,
  notify: watch::Sender<CacheEntry<D>>,
  inflight: Option<InFlight<D>>,
}

impl<D: super::Cacheable> Slot<D> {
  fn new(key: CacheKey) -> Self {
    let entry = CacheEntry::idle(key);
    let (notify, _) = watch::channel(entry.clone());
    Self {
      entry,
      notify,
      inflight: None,
    }
  }

  fn publish(&self) {
    self.notify.send_replace(self.entry.clone());
  }
}

struct CacheState<D> {
  slots: HashMap<CacheKey, Slot<D>>,
  tag_index: HashMap<Tag, HashSet<CacheKey>>,
}

impl<D: super::Cacheable> CacheState<D> {
  fn slot(&mut self, key: &CacheKey) -> &mut Slot<D> {
    self
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()))
  }
}

struct Inner<Q: QueryKey> {
  fetcher: Arc<dyn Fetcher<Q>>,
  config: CacheConfig,
  state: Mutex<CacheState<Q::Data>>,
}

/// What a request for a query has to do.
enum Plan<D> {
  /// Cached entry is current
  Ready(CacheEntry<D>),
  /// A fetch for this exact page is running; its result is ours
  Join(SharedFetch<D>),
  /// A fetch for another page of the same key is running; wait, then re-plan
  Wait(SharedFetch<D>),
}

/// Normalized query cache.
///
/// Entries are keyed by [`CacheKey`]; successive pages of one list accumulate
/// under a single key. At most one fetch per key is in flight, later callers
/// for the same page join it. Fetches run on spawned tasks, so dropping every
/// caller or subscriber never cancels them.
///
/// Cloning is cheap and every clone shares the same state. The internal lock
/// is never held across an `.await`.
pub struct QueryCache<Q: QueryKey> {
  inner: Arc<Inner<Q>>,
}

impl<Q: QueryKey> Clone for QueryCache<Q> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<Q: QueryKey> QueryCache<Q> {
  pub fn new(fetcher: impl Fetcher<Q> + 'static, config: CacheConfig) -> Self {
    Self::with_fetcher(Arc::new(fetcher), config)
  }

  pub fn with_fetcher(fetcher: Arc<dyn Fetcher<Q>>, config: CacheConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        fetcher,
        config,
        state: Mutex::new(CacheState {
          slots: HashMap::new(),
          tag_index: HashMap::new(),
        }),
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, CacheState<Q::Data>> {
    // A panic while holding the lock cannot leave a slot half-written
    self
      .inner
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Resolve a query, fetching only when the cache cannot answer it.
  ///
  /// A fetch is issued when the key has no entry, when the requested page
  /// differs from the last one fetched for the key, or when the entry has
  /// been invalidated. Failures are captured in the returned entry.
  pub async fn fetch(&self, query: Q) -> CacheEntry<Q::Data> {
    self.run(query, false).await
  }

  /// Force a network request regardless of freshness.
  ///
  /// Restarts from page 1, so an accumulated list is replaced rather than
  /// appended to.
  pub async fn refetch(&self, query: &Q) -> CacheEntry<Q::Data> {
    self.run(query.with_page(1), true).await
  }

  /// Make sure a fetch is under way if one is needed, without waiting for it.
  ///
  /// Must be called from within a tokio runtime.
  pub fn prefetch(&self, query: Q) {
    self.start(query, false);
  }

  /// Non-blocking [`refetch`](Self::refetch).
  pub fn start_refetch(&self, query: &Q) {
    self.start(query.with_page(1), true);
  }

  /// Fetch `query`'s page again even when the cache holds an answer for it.
  ///
  /// Unlike [`refetch`](Self::refetch) the page is kept, so retrying a page
  /// after the cached one still appends.
  pub async fn retry(&self, query: Q) -> CacheEntry<Q::Data> {
    self.run(query, true).await
  }

  /// Non-blocking [`retry`](Self::retry).
  pub fn start_retry(&self, query: Q) {
    self.start(query, true);
  }

  fn start(&self, query: Q, force: bool) {
    if let Plan::Wait(_) = self.plan(&query, force) {
      let cache = self.clone();
      tokio::spawn(async move {
        cache.run(query, force).await;
      });
    }
  }

  async fn run(&self, query: Q, force: bool) -> CacheEntry<Q::Data> {
    loop {
      match self.plan(&query, force) {
        Plan::Ready(entry) => return entry,
        Plan::Join(fetch) => return fetch.await,
        Plan::Wait(fetch) => {
          fetch.await;
        }
      }
    }
  }

  fn plan(&self, query: &Q, force: bool) -> Plan<Q::Data> {
    let key = query.cache_key();
    let page = query.page();
    let mut state = self.lock();
    let slot = state.slot(&key);

    if let Some(inflight) = &slot.inflight {
      if inflight.page == page {
        debug!(key = %key, page, "joining in-flight fetch");
        return Plan::Join(inflight.fetch.clone());
      }
      debug!(key = %key, page, inflight_page = inflight.page, "waiting for other page");
      return Plan::Wait(inflight.fetch.clone());
    }

    if !force && !self.needs_fetch(&slot.entry, page) {
      debug!(key = %key, page, "cache hit");
      return Plan::Ready(slot.entry.clone());
    }

    Plan::Join(self.start_fetch(slot, query))
  }

  fn needs_fetch(&self, entry: &CacheEntry<Q::Data>, page: u32) -> bool {
    if entry.requested_page != Some(page) || entry.stale {
      return true;
    }
    match (self.inner.config.stale_after, entry.fetched_at) {
      (Some(limit), Some(fetched_at)) => chrono::Utc::now() - fetched_at > limit,
      _ => false,
    }
  }

  /// Mark the slot loading and spawn the fetch. Caller holds the lock.
  fn start_fetch(&self, slot: &mut Slot<Q::Data>, query: &Q) -> SharedFetch<Q::Data> {
    let page = query.page();
    debug!(query = %query.description(), page, "fetching");

    slot.entry.status = QueryStatus::Loading;
    slot.entry.requested_page = Some(page);
    slot.entry.stale = false;
    slot.publish();

    let request = self.inner.fetcher.fetch(query);
    let timeout = self.inner.config.request_timeout;
    let cache = self.clone();
    let task_query = query.clone();
    let task = tokio::spawn(async move {
      let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, request)
          .await
          .unwrap_or(Err(HttpError::Timeout(limit))),
        None => request.await,
      };
      cache.complete(&task_query, result)
    });

    let weak: Weak<Inner<Q>> = Arc::downgrade(&self.inner);
    let query = query.clone();
    let fetch = async move {
      match task.await {
        Ok(entry) => entry,
        Err(e) => {
          warn!(query = %query.description(), error = %e, "fetch task failed");
          match weak.upgrade() {
            Some(inner) => QueryCache { inner }.complete(&query, Err(HttpError::Aborted)),
            None => {
              let mut entry = CacheEntry::idle(query.cache_key());
              entry.apply_error(HttpError::Aborted);
              entry
            }
          }
        }
      }
    }
    .boxed()
    .shared();

    slot.inflight = Some(InFlight {
      page,
      fetch: fetch.clone(),
    });
    fetch
  }

  /// Fold a fetch result into the cache and notify subscribers.
  fn complete(
    &self,
    query: &Q,
    result: Result<Q::Data, HttpError>,
  ) -> CacheEntry<Q::Data> {
    let key = query.cache_key();
    let mut state = self.lock();
    let CacheState { slots, tag_index } = &mut *state;
    let slot = slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()));
    slot.inflight = None;

    // Invalidated while the request was out; the response may predate it
    let invalidated_mid_flight = slot.entry.stale;

    match result {
      Ok(data) => {
        let tags = query.provides_tags(&data);
        let previous = slot.entry.tags.clone();
        let appended = slot.entry.apply_success(data, query.page(), tags);
        reindex(tag_index, &key, &previous, &slot.entry.tags);
        debug!(
          key = %key,
          page = slot.entry.page(),
          total_pages = slot.entry.total_pages(),
          appended,
          "fetch succeeded"
        );
      }
      Err(error) => {
        warn!(key = %key, error = %error, "fetch failed");
        slot.entry.apply_error(error);
      }
    }

    slot.entry.stale = invalidated_mid_flight;
    slot.publish();
    slot.entry.clone()
  }

  /// Mark every entry carrying `tag` stale. Returns how many were marked.
  ///
  /// Data stays visible until the refetch triggered by the next read resolves.
  pub fn invalidate(&self, tag: &Tag) -> usize {
    let mut state = self.lock();
    let keys: Vec<CacheKey> = state
      .tag_index
      .get(tag)
      .map(|keys| keys.iter().cloned().collect())
      .unwrap_or_default();

    for key in &keys {
      if let Some(slot) = state.slots.get_mut(key) {
        slot.entry.stale = true;
        slot.publish();
      }
    }

    info!(tag = %tag, entries = keys.len(), "invalidated tag");
    keys.len()
  }

  pub fn invalidate_all(&self, tags: &[Tag]) -> usize {
    tags.iter().map(|tag| self.invalidate(tag)).sum()
  }

  /// Current snapshot for `key`, if the key has ever been requested.
  pub fn snapshot(&self, key: &CacheKey) -> Option<CacheEntry<Q::Data>> {
    self.lock().slots.get(key).map(|slot| slot.entry.clone())
  }

  /// Keys currently carrying `tag`.
  pub fn keys_for_tag(&self, tag: &Tag) -> Vec<CacheKey> {
    let mut keys: Vec<CacheKey> = self
      .lock()
      .tag_index
      .get(tag)
      .map(|keys| keys.iter().cloned().collect())
      .unwrap_or_default();
    keys.sort();
    keys
  }

  pub fn is_fetching(&self, key: &CacheKey) -> bool {
    self
      .lock()
      .slots
      .get(key)
      .is_some_and(|slot| slot.inflight.is_some())
  }

  /// Receive every change to the entry under `key`. Drop to unsubscribe.
  pub fn subscribe(&self, key: &CacheKey) -> Subscription<Q::Data> {
    let mut state = self.lock();
    Subscription::new(state.slot(key).notify.subscribe())
  }

  /// Push every change to the entry under `key` into `callback`.
  ///
  /// Delivery stops when the returned handle is dropped; fetches are unaffected.
  pub fn on_change<F>(&self, key: &CacheKey, mut callback: F) -> Unsubscribe
  where
    F: FnMut(CacheEntry<Q::Data>) + Send + 'static,
  {
    let mut subscription = self.subscribe(key);
    let task = tokio::spawn(async move {
      while let Some(entry) = subscription.changed().await {
        callback(entry);
      }
    });
    Unsubscribe::new(task.abort_handle())
  }

  /// Drop every entry. Subscribers see their channel close.
  pub fn clear(&self) {
    let mut state = self.lock();
    state.slots.clear();
    state.tag_index.clear();
  }
}

fn reindex(
  tag_index: &mut HashMap<Tag, HashSet<CacheKey>>,
  key: &CacheKey,
  previous: &BTreeSet<Tag>,
  current: &BTreeSet<Tag>,
) {
  for tag in previous.difference(current) {
    if let Some(keys) = tag_index.get_mut(tag) {
      keys.remove(key);
      if keys.is_empty() {
        tag_index.remove(tag);
      }
    }
  }
  for tag in current {
    tag_index
      .entry(tag.clone())
      .or_default()
      .insert(key.clone());
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use crate::cache::{Cacheable, Pagination};
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  /// Paginated list whose items are derived from the page number.
  #[derive(Debug, Clone, PartialEq)]
  pub struct TestPage {
    pub page: u32,
    pub items: Vec<u64>,
    pub total_pages: u32,
  }

  impl Cacheable for TestPage {
    fn append(&mut self, next: Self) {
      self.items.extend(next.items);
      self.page = next.page;
      self.total_pages = next.total_pages;
    }

    fn pagination(&self) -> Option<Pagination> {
      Some(Pagination {
        page: self.page,
        total_pages: self.total_pages,
        total_results: u64::from(self.total_pages) * 2,
      })
    }
  }

  #[derive(Debug, Clone)]
  pub struct TestQuery {
    pub list: String,
    pub page: u32,
  }

  impl TestQuery {
    pub fn new(list: &str, page: u32) -> Self {
      Self {
        list: list.to_string(),
        page,
      }
    }
  }

  impl QueryKey for TestQuery {
    type Data = TestPage;

    fn cache_key(&self) -> CacheKey {
      CacheKey::new(&self.list)
    }

    fn page(&self) -> u32 {
      self.page
    }

    fn with_page(&self, page: u32) -> Self {
      Self {
        page,
        ..self.clone()
      }
    }

    fn provides_tags(&self, data: &TestPage) -> Vec<Tag> {
      let mut tags = vec![Tag::entity(&self.list), Tag::list(&self.list)];
      tags.extend(data.items.iter().map(|id| Tag::id(&self.list, id)));
      tags
    }

    fn description(&self) -> String {
      format!("{} page {}", self.list, self.page)
    }
  }

  /// Fetcher that counts calls and can be slowed down or made to fail.
  #[derive(Clone, Default)]
  pub struct TestFetcher {
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    pub delay: Duration,
  }

  impl TestFetcher {
    pub fn with_delay(delay: Duration) -> Self {
      Self {
        delay,
        ..Self::default()
      }
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
      self.fail.store(fail, Ordering::SeqCst);
    }
  }

  impl Fetcher<TestQuery> for TestFetcher {
    fn fetch(&self, query: &TestQuery) -> BoxFuture<'static, Result<TestPage, HttpError>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let fail = self.fail.load(Ordering::SeqCst);
      let delay = self.delay;
      let page = query.page;
      async move {
        if !delay.is_zero() {
          tokio::time::sleep(delay).await;
        }
        if fail {
          return Err(HttpError::Status {
            status: 503,
            message: "Service Unavailable".to_string(),
          });
        }
        let base = u64::from(page) * 10;
        Ok(TestPage {
          page,
          items: vec![base + 1, base + 2],
          total_pages: 5,
        })
      }
      .boxed()
    }
  }
}
