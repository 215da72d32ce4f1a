use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::entry::CacheEntry;

/// Stream of snapshots for one cache key.
///
/// Only the latest snapshot is kept; a slow reader skips intermediate states.
/// Dropping the subscription unsubscribes.
pub struct Subscription<D> {
  receiver: watch::Receiver<CacheEntry<D>>,
}

impl<D: Clone> Subscription<D> {
  pub(crate) fn new(receiver: watch::Receiver<CacheEntry<D>>) -> Self {
    Self { receiver }
  }

  /// Latest snapshot, whether or not it has been seen.
  pub fn current(&self) -> CacheEntry<D> {
    self.receiver.borrow().clone()
  }

  /// Whether a snapshot arrived since the last `poll`/`changed`.
  pub fn has_changed(&self) -> bool {
    self.receiver.has_changed().unwrap_or(false)
  }

  /// Take the latest snapshot if it has not been seen yet.
  pub fn poll(&mut self) -> Option<CacheEntry<D>> {
    if !self.has_changed() {
      return None;
    }
    Some(self.receiver.borrow_and_update().clone())
  }

  /// Wait for the next snapshot. `None` once the entry is gone.
  pub async fn changed(&mut self) -> Option<CacheEntry<D>> {
    self.receiver.changed().await.ok()?;
    Some(self.receiver.borrow_and_update().clone())
  }
}

/// Handle returned by `QueryCache::on_change`. Dropping it stops delivery.
#[derive(Debug)]
pub struct Unsubscribe {
  handle: AbortHandle,
}

impl Unsubscribe {
  pub(crate) fn new(handle: AbortHandle) -> Self {
    Self { handle }
  }

  pub fn unsubscribe(self) {
    // Drop does the work
  }
}

impl Drop for Unsubscribe {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
