//! Persisted two-valued preferences: view mode and theme.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{PersistentStore, THEME_KEY, VIEW_MODE_KEY};

/// A preference with exactly two values and a storage slot of its own.
pub trait Toggle: Copy + PartialEq + fmt::Display + Serialize + DeserializeOwned {
  const STORAGE_KEY: &'static str;

  fn toggled(self) -> Self;
}

/// How much detail the movie list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  #[default]
  Simple,
  Advanced,
}

impl Toggle for ViewMode {
  const STORAGE_KEY: &'static str = VIEW_MODE_KEY;

  fn toggled(self) -> Self {
    match self {
      ViewMode::Simple => ViewMode::Advanced,
      ViewMode::Advanced => ViewMode::Simple,
    }
  }
}

impl fmt::Display for ViewMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ViewMode::Simple => write!(f, "simple"),
      ViewMode::Advanced => write!(f, "advanced"),
    }
  }
}

impl FromStr for ViewMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "simple" => Ok(ViewMode::Simple),
      "advanced" => Ok(ViewMode::Advanced),
      other => Err(format!("unknown view mode '{}' (expected simple or advanced)", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

impl Toggle for Theme {
  const STORAGE_KEY: &'static str = THEME_KEY;

  fn toggled(self) -> Self {
    match self {
      Theme::Light => Theme::Dark,
      Theme::Dark => Theme::Light,
    }
  }
}

impl fmt::Display for Theme {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Theme::Light => write!(f, "light"),
      Theme::Dark => write!(f, "dark"),
    }
  }
}

impl FromStr for Theme {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
    }
  }
}

/// Current value of one preference, written through to storage on change.
#[derive(Debug)]
pub struct PreferenceStore<T: Toggle> {
  value: T,
  storage: PersistentStore,
}

impl<T: Toggle> PreferenceStore<T> {
  /// Read the stored value, falling back to `default` when absent or corrupt.
  pub fn load(storage: PersistentStore, default: T) -> Self {
    let value = storage.load(T::STORAGE_KEY).unwrap_or(default);
    Self { value, storage }
  }

  pub fn get(&self) -> T {
    self.value
  }

  pub fn set(&mut self, value: T) {
    debug!(key = T::STORAGE_KEY, value = %value, "preference changed");
    self.value = value;
    self.storage.save(T::STORAGE_KEY, &self.value);
  }

  /// Flip to the other value and return it.
  pub fn toggle(&mut self) -> T {
    self.set(self.value.toggled());
    self.value
  }

  pub fn is(&self, value: T) -> bool {
    self.value == value
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::testing::FailingBackend;

  #[test]
  fn test_view_mode_defaults_to_simple() {
    let prefs = PreferenceStore::load(PersistentStore::in_memory(), ViewMode::default());
    assert_eq!(prefs.get(), ViewMode::Simple);
  }

  #[test]
  fn test_toggle_persists() {
    let storage = PersistentStore::in_memory();
    let mut prefs = PreferenceStore::load(storage.clone(), ViewMode::Simple);

    assert_eq!(prefs.toggle(), ViewMode::Advanced);
    let stored: Option<String> = storage.load(VIEW_MODE_KEY);
    assert_eq!(stored.as_deref(), Some("advanced"));

    let reloaded = PreferenceStore::load(storage, ViewMode::Simple);
    assert!(reloaded.is(ViewMode::Advanced));
  }

  #[test]
  fn test_theme_uses_own_key() {
    let storage = PersistentStore::in_memory();
    let mut theme = PreferenceStore::load(storage.clone(), Theme::Light);
    let view = PreferenceStore::load(storage.clone(), ViewMode::Simple);

    theme.set(Theme::Dark);
    let stored: Option<Theme> = storage.load(THEME_KEY);
    assert_eq!(stored, Some(Theme::Dark));
    assert_eq!(view.get(), ViewMode::Simple);
    assert_eq!(storage.load::<ViewMode>(VIEW_MODE_KEY), None);
  }

  #[test]
  fn test_storage_failure_still_toggles() {
    let mut prefs = PreferenceStore::load(PersistentStore::new(FailingBackend), Theme::Light);
    assert_eq!(prefs.toggle(), Theme::Dark);
    assert_eq!(prefs.get(), Theme::Dark);
  }

  #[test]
  fn test_parse() {
    assert_eq!("Advanced".parse::<ViewMode>(), Ok(ViewMode::Advanced));
    assert_eq!("dark".parse::<Theme>(), Ok(Theme::Dark));
    assert!("grid".parse::<ViewMode>().is_err());
  }
}
