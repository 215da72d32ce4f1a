//! Core traits and types for the query cache.

use futures::future::BoxFuture;
use std::fmt;

use crate::error::HttpError;

/// Identity under which query results are cached, merged and deduplicated.
///
/// Derived from the endpoint and the parameters that discriminate results.
/// Parameters that should accumulate (page numbers) are left out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Label attached to cache entries for bulk invalidation.
///
/// Conventional shapes are `Type`, `Type:id` and `Type:LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
  pub fn new(tag: impl Into<String>) -> Self {
    Self(tag.into())
  }

  /// Tag covering every entry of an entity type.
  pub fn entity(entity_type: &str) -> Self {
    Self(entity_type.to_string())
  }

  /// Tag for one entity of a type.
  pub fn id(entity_type: &str, id: impl fmt::Display) -> Self {
    Self(format!("{}:{}", entity_type, id))
  }

  /// Marker for list results of a type.
  pub fn list(entity_type: &str) -> Self {
    Self(format!("{}:LIST", entity_type))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Position of a paginated response within its result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
  pub page: u32,
  pub total_pages: u32,
  pub total_results: u64,
}

impl Pagination {
  pub fn has_next_page(&self) -> bool {
    self.page < self.total_pages
  }
}

/// Data that can live in a cache entry.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Fold a later page into this value.
  ///
  /// List payloads append `next`'s items after their own and take over its
  /// pagination counters. Non-paginated payloads are simply replaced.
  fn append(&mut self, next: Self);

  /// Pagination counters, `None` for single-entity payloads.
  fn pagination(&self) -> Option<Pagination>;
}

/// Describes one query: what to fetch and how its results are cached.
pub trait QueryKey: Clone + Send + Sync + fmt::Debug + 'static {
  type Data: Cacheable;

  /// Key the results accumulate under.
  fn cache_key(&self) -> CacheKey;

  /// Page this query asks for. Non-paginated queries use 1.
  fn page(&self) -> u32;

  /// The same query pointed at another page.
  fn with_page(&self, page: u32) -> Self;

  /// Tags attached to the entry once `data` has been fetched.
  fn provides_tags(&self, data: &Self::Data) -> Vec<Tag>;

  /// Human-readable description for logs.
  fn description(&self) -> String;
}

/// Performs the network side of a query.
pub trait Fetcher<Q: QueryKey>: Send + Sync {
  fn fetch(&self, query: &Q) -> BoxFuture<'static, Result<Q::Data, HttpError>>;
}
