//! Persistent key-value storage.
//!
//! A passive, swappable sink addressed by string keys. Values are stored as
//! JSON text. `PersistentStore` is the best-effort face used by the rest of
//! the crate: it never returns an error, it logs and carries on.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Key holding the favorites list (JSON array of movie snapshots).
pub const FAVORITES_KEY: &str = "tmdb_favorites";
/// Key holding the view preference (JSON string).
pub const VIEW_MODE_KEY: &str = "tmdb_view_mode";
/// Key holding the theme preference (JSON string).
pub const THEME_KEY: &str = "app-theme";

/// Raw text storage. Implementations report failures; callers decide what to do.
pub trait KeyValueBackend: Send + Sync {
  /// Read the stored text for `key`, `None` if absent.
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

  /// Store `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Delete `key`. Removing an absent key is not an error.
  fn remove(&self, key: &str) -> Result<(), StorageError>;

  /// Delete every key.
  fn clear(&self) -> Result<(), StorageError>;
}

/// JSON-serializing, failure-containing wrapper over a [`KeyValueBackend`].
#[derive(Clone)]
pub struct PersistentStore {
  backend: Arc<dyn KeyValueBackend>,
}

impl PersistentStore {
  pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
    Self {
      backend: Arc::new(backend),
    }
  }

  /// Store that only lives as long as the process.
  pub fn in_memory() -> Self {
    Self::new(MemoryBackend::new())
  }

  /// Serialize and store `value`. Failures are logged, never returned.
  pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
    if let Err(e) = self.try_save(key, value) {
      warn!(key, error = %e, "failed to save to storage");
    }
  }

  fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
    let text = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
      key: key.to_string(),
      source,
    })?;
    self.backend.set(key, &text)
  }

  /// Load and deserialize the value under `key`.
  ///
  /// Absence, a backend failure and unparseable text all come back as `None`.
  pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    match self.try_load(key) {
      Ok(Some(value)) => Some(value),
      Ok(None) => {
        debug!(key, "no stored value");
        None
      }
      Err(e) => {
        warn!(key, error = %e, "failed to load from storage");
        None
      }
    }
  }

  fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
    let Some(text) = self.backend.get(key)? else {
      return Ok(None);
    };
    serde_json::from_str(&text)
      .map(Some)
      .map_err(|source| StorageError::Parse {
        key: key.to_string(),
        source,
      })
  }

  pub fn remove(&self, key: &str) {
    if let Err(e) = self.backend.remove(key) {
      warn!(key, error = %e, "failed to remove from storage");
    }
  }

  pub fn clear(&self) {
    if let Err(e) = self.backend.clear() {
      warn!(error = %e, "failed to clear storage");
    }
  }
}

impl std::fmt::Debug for PersistentStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PersistentStore").finish_non_exhaustive()
  }
}
