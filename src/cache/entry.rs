//! Cache entries and their status machine.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::traits::{CacheKey, Cacheable, Pagination, Tag};
use crate::error::HttpError;

/// Lifecycle of a cache entry.
///
/// `Idle -> Loading -> (Success | Error)`, and back to `Loading` on refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
  /// Nothing has been requested yet
  #[default]
  Idle,
  /// A fetch is in flight
  Loading,
  /// The last fetch succeeded
  Success,
  /// The last fetch failed
  Error,
}

impl QueryStatus {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryStatus::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryStatus::Success)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryStatus::Error)
  }
}

/// Snapshot of one cached query.
///
/// The engine owns the live entry; everything handed out is a clone.
/// `data` survives failed and in-progress refetches so the last good result
/// stays visible.
#[derive(Debug, Clone)]
pub struct CacheEntry<D> {
  pub key: CacheKey,
  pub status: QueryStatus,
  pub data: Option<D>,
  pub error: Option<HttpError>,
  pub tags: BTreeSet<Tag>,
  pub pagination: Pagination,
  /// When `data` last changed
  pub fetched_at: Option<DateTime<Utc>>,
  /// Invalidated since the last fetch; the next read refetches
  pub stale: bool,
  /// Page of the most recent fetch attempt, successful or not
  pub(crate) requested_page: Option<u32>,
}

impl<D: Cacheable> CacheEntry<D> {
  pub fn idle(key: CacheKey) -> Self {
    Self {
      key,
      status: QueryStatus::Idle,
      data: None,
      error: None,
      tags: BTreeSet::new(),
      pagination: Pagination::default(),
      fetched_at: None,
      stale: false,
      requested_page: None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.status.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.status.is_error()
  }

  /// First load with nothing to show yet.
  pub fn is_first_load(&self) -> bool {
    self.is_loading() && self.data.is_none()
  }

  /// The last attempt asked for a page past the cached one and failed.
  pub fn failed_next_page(&self) -> bool {
    self.is_error()
      && self
        .requested_page
        .is_some_and(|page| page > self.pagination.page)
  }

  pub fn data(&self) -> Option<&D> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&HttpError> {
    self.error.as_ref()
  }

  pub fn page(&self) -> u32 {
    self.pagination.page
  }

  pub fn total_pages(&self) -> u32 {
    self.pagination.total_pages
  }

  pub fn total_results(&self) -> u64 {
    self.pagination.total_results
  }

  /// Fold a successful response into the entry.
  ///
  /// A page after the cached one is appended; anything else (page 1, a
  /// repeated page, an empty entry) replaces what was there. Returns whether
  /// the response was appended.
  pub(crate) fn apply_success(&mut self, data: D, fallback_page: u32, tags: Vec<Tag>) -> bool {
    let incoming = data.pagination().unwrap_or(Pagination {
      page: fallback_page,
      ..Pagination::default()
    });

    let can_append = incoming.page > self.pagination.page
      && self
        .data
        .as_ref()
        .is_some_and(|existing| existing.pagination().is_some());

    let appended = if can_append {
      if let Some(existing) = self.data.as_mut() {
        existing.append(data);
      }
      self.tags.extend(tags);
      true
    } else {
      self.data = Some(data);
      self.tags = tags.into_iter().collect();
      false
    };

    self.pagination = incoming;
    self.status = QueryStatus::Success;
    self.error = None;
    self.stale = false;
    self.fetched_at = Some(Utc::now());
    appended
  }

  pub(crate) fn apply_error(&mut self, error: HttpError) {
    self.status = QueryStatus::Error;
    self.error = Some(error);
    self.stale = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Page {
    items: Vec<u32>,
    page: u32,
  }

  impl Cacheable for Page {
    fn append(&mut self, next: Self) {
      self.items.extend(next.items);
      self.page = next.page;
    }

    fn pagination(&self) -> Option<Pagination> {
      Some(Pagination {
        page: self.page,
        total_pages: 3,
        total_results: 6,
      })
    }
  }

  fn page(n: u32, items: &[u32]) -> Page {
    Page {
      items: items.to_vec(),
      page: n,
    }
  }

  #[test]
  fn test_later_page_appends() {
    let mut entry = CacheEntry::idle(CacheKey::new("k"));
    assert!(!entry.apply_success(page(1, &[1, 2]), 1, vec![Tag::new("a")]));
    assert!(entry.apply_success(page(2, &[3, 4]), 2, vec![Tag::new("b")]));

    assert_eq!(entry.data().unwrap().items, vec![1, 2, 3, 4]);
    assert_eq!(entry.page(), 2);
    assert_eq!(entry.tags.len(), 2);
  }

  #[test]
  fn test_page_one_replaces() {
    let mut entry = CacheEntry::idle(CacheKey::new("k"));
    entry.apply_success(page(1, &[1, 2]), 1, vec![Tag::new("a")]);
    entry.apply_success(page(2, &[3, 4]), 2, vec![Tag::new("b")]);
    entry.apply_success(page(1, &[9]), 1, vec![Tag::new("c")]);

    assert_eq!(entry.data().unwrap().items, vec![9]);
    assert_eq!(entry.page(), 1);
    assert_eq!(
      entry.tags.iter().map(Tag::as_str).collect::<Vec<_>>(),
      vec!["c"]
    );
  }

  #[test]
  fn test_error_keeps_data() {
    let mut entry = CacheEntry::idle(CacheKey::new("k"));
    entry.apply_success(page(1, &[1]), 1, vec![]);
    entry.apply_error(HttpError::Network("offline".to_string()));

    assert!(entry.is_error());
    assert_eq!(entry.data().unwrap().items, vec![1]);
    assert_eq!(
      entry.error(),
      Some(&HttpError::Network("offline".to_string()))
    );
  }
}
