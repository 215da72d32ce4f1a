use std::collections::BTreeMap;
use std::sync::Mutex;

use super::KeyValueBackend;
use crate::error::StorageError;

/// Process-lifetime backend. Used for `--memory` sessions and in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
  values: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
    self
      .values
      .lock()
      .map_err(|e| StorageError::Backend(format!("Lock poisoned: {}", e)))
  }
}

impl KeyValueBackend for MemoryBackend {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.lock()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.lock()?.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<(), StorageError> {
    self.lock()?.clear();
    Ok(())
  }
}
