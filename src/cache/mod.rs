//! Generic query cache for paginated and single-entity remote data.
//!
//! This module is catalog-agnostic. It provides:
//! - Cache keys that exclude accumulating parameters (page numbers)
//! - Page merging: later pages append to the cached list
//! - One in-flight fetch per key, shared by every caller that asks for it
//! - Tag-based invalidation with stale-while-revalidate reads
//! - Watch-based subscriptions to entry changes

mod entry;
mod layer;
mod subscription;
mod traits;

pub use entry::{CacheEntry, QueryStatus};
pub use layer::{CacheConfig, QueryCache};
pub use subscription::{Subscription, Unsubscribe};
pub use traits::{CacheKey, Cacheable, Fetcher, Pagination, QueryKey, Tag};

#[cfg(test)]
pub(crate) use layer::testing;
