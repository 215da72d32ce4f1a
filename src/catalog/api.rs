//! Catalog client with transparent query caching.

use std::sync::Arc;

use super::client::CatalogClient;
use super::queries::{search_tag, CatalogQuery, EntityType, MovieList};
use super::types::CatalogData;
use crate::cache::{CacheConfig, CacheEntry, Fetcher, QueryCache};
use crate::query::{QueryHandle, QueryOptions};

/// Typed accessors per entity type over one shared query cache.
///
/// Every handle opened here shares the cache, so two views showing the same
/// list see the same entry and never fetch it twice.
#[derive(Clone)]
pub struct CatalogApi {
  cache: QueryCache<CatalogQuery>,
}

impl CatalogApi {
  pub fn new(client: CatalogClient, config: CacheConfig) -> Self {
    Self::with_fetcher(Arc::new(client), config)
  }

  pub fn with_fetcher(fetcher: Arc<dyn Fetcher<CatalogQuery>>, config: CacheConfig) -> Self {
    Self {
      cache: QueryCache::with_fetcher(fetcher, config),
    }
  }

  pub fn cache(&self) -> &QueryCache<CatalogQuery> {
    &self.cache
  }

  pub fn list(&self, list: MovieList, page: u32, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    self.cache.query(CatalogQuery::list(list, page), options)
  }

  pub fn popular(&self, page: u32, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    self.list(MovieList::Popular, page, options)
  }

  pub fn top_rated(&self, page: u32, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    self.list(MovieList::TopRated, page, options)
  }

  pub fn upcoming(&self, page: u32, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    self.list(MovieList::Upcoming, page, options)
  }

  pub fn now_playing(&self, page: u32, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    self.list(MovieList::NowPlaying, page, options)
  }

  /// Search handle. A blank term is always skipped.
  pub fn search(&self, term: &str, page: u32, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    let query = CatalogQuery::search(term, page);
    let skip = options.skip || query.is_blank_search();
    self.cache.query(query, QueryOptions::skip_if(skip))
  }

  pub fn details(&self, id: u64, options: QueryOptions) -> QueryHandle<CatalogQuery> {
    self.cache.query(CatalogQuery::details(id), options)
  }

  /// Resolve pages `1..=pages` of a list, stopping early at the last page.
  pub async fn fetch_list(&self, list: MovieList, pages: u32) -> CacheEntry<CatalogData> {
    self.fetch_pages(CatalogQuery::list(list, 1), pages).await
  }

  /// Resolve pages `1..=pages` of a search. A blank term stays idle.
  pub async fn fetch_search(&self, term: &str, pages: u32) -> CacheEntry<CatalogData> {
    self.fetch_pages(CatalogQuery::search(term, 1), pages).await
  }

  pub async fn fetch_details(&self, id: u64) -> CacheEntry<CatalogData> {
    self.cache.fetch(CatalogQuery::details(id)).await
  }

  async fn fetch_pages(&self, first: CatalogQuery, pages: u32) -> CacheEntry<CatalogData> {
    let skip = first.is_blank_search();
    let mut handle = self.cache.query(first, QueryOptions::skip_if(skip));
    handle.resolve().await;
    for _ in 1..pages.max(1) {
      if handle.is_error() || !handle.fetch_next_page() {
        break;
      }
      handle.resolve().await;
    }
    handle.state().clone()
  }

  /// Mark every entry of a list as stale. Used when a view stops showing it.
  pub fn invalidate_list(&self, list: MovieList) -> usize {
    self.cache.invalidate(&list.entity_type().tag())
  }

  /// Mark every search entry as stale.
  pub fn invalidate_searches(&self) -> usize {
    self.cache.invalidate(&EntityType::SearchResults.tag())
  }

  /// Mark the pages of one search term as stale.
  pub fn invalidate_search(&self, term: &str) -> usize {
    self.cache.invalidate(&search_tag(term))
  }

  pub fn invalidate_details(&self, id: u64) -> usize {
    self.cache.invalidate(&EntityType::MovieDetails.id_tag(id))
  }
}

impl std::fmt::Debug for CatalogApi {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CatalogApi").finish_non_exhaustive()
  }
}
