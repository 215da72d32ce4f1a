//! Favorites: a uniqueness-enforcing, insertion-ordered list of movie
//! snapshots, persisted after every mutation.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::catalog::Movie;
use crate::storage::{PersistentStore, FAVORITES_KEY};

/// Projection used when listing favorites. Never changes stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
  TitleAsc,
  TitleDesc,
  RatingAsc,
  RatingDesc,
  DateAsc,
  #[default]
  DateDesc,
}

impl SortBy {
  pub const ALL: [SortBy; 6] = [
    SortBy::TitleAsc,
    SortBy::TitleDesc,
    SortBy::RatingAsc,
    SortBy::RatingDesc,
    SortBy::DateAsc,
    SortBy::DateDesc,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      SortBy::TitleAsc => "title-asc",
      SortBy::TitleDesc => "title-desc",
      SortBy::RatingAsc => "rating-asc",
      SortBy::RatingDesc => "rating-desc",
      SortBy::DateAsc => "date-asc",
      SortBy::DateDesc => "date-desc",
    }
  }

  fn compare(&self, a: &Movie, b: &Movie) -> Ordering {
    match self {
      SortBy::TitleAsc => compare_titles(&a.title, &b.title),
      SortBy::TitleDesc => compare_titles(&b.title, &a.title),
      SortBy::RatingAsc => a.vote_average.total_cmp(&b.vote_average),
      SortBy::RatingDesc => b.vote_average.total_cmp(&a.vote_average),
      // ISO 8601 dates order lexicographically
      SortBy::DateAsc => a.release_date.cmp(&b.release_date),
      SortBy::DateDesc => b.release_date.cmp(&a.release_date),
    }
  }
}

impl fmt::Display for SortBy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortBy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase();
    SortBy::ALL
      .into_iter()
      .find(|mode| mode.as_str() == wanted)
      .ok_or_else(|| {
        let valid: Vec<&str> = SortBy::ALL.iter().map(SortBy::as_str).collect();
        format!("unknown sort mode '{}' (expected one of: {})", s, valid.join(", "))
      })
  }
}

/// Accent- and case-insensitive key, so "Élite" sorts next to "elite".
fn collation_key(title: &str) -> String {
  title
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .flat_map(char::to_lowercase)
    .collect()
}

fn compare_titles(a: &str, b: &str) -> Ordering {
  collation_key(a)
    .cmp(&collation_key(b))
    .then_with(|| a.cmp(b))
}

/// The user's favorites.
///
/// The list itself keeps insertion order; `sorted` returns a view.
#[derive(Debug)]
pub struct FavoritesStore {
  items: Vec<Movie>,
  ids: HashSet<u64>,
  sort_by: SortBy,
  storage: PersistentStore,
}

impl FavoritesStore {
  /// Read persisted favorites. Absent or corrupt data starts an empty list.
  pub fn load(storage: PersistentStore, sort_by: SortBy) -> Self {
    let stored: Vec<Movie> = storage.load(FAVORITES_KEY).unwrap_or_default();

    let mut ids = HashSet::with_capacity(stored.len());
    let total = stored.len();
    let items: Vec<Movie> = stored
      .into_iter()
      .filter(|movie| ids.insert(movie.id))
      .collect();

    if items.len() != total {
      warn!(
        dropped = total - items.len(),
        "stored favorites contained duplicate ids"
      );
    }

    Self {
      items,
      ids,
      sort_by,
      storage,
    }
  }

  /// Insert the movie if absent, remove it if present.
  ///
  /// Returns whether the movie is a favorite afterwards.
  pub fn toggle(&mut self, movie: Movie) -> bool {
    if self.ids.contains(&movie.id) {
      self.remove(movie.id);
      false
    } else {
      self.add(movie);
      true
    }
  }

  /// Append the movie unless it is already a favorite.
  pub fn add(&mut self, movie: Movie) -> bool {
    if !self.ids.insert(movie.id) {
      return false;
    }
    info!(id = movie.id, title = %movie.title, "added favorite");
    self.items.push(movie);
    self.persist();
    true
  }

  pub fn remove(&mut self, id: u64) -> bool {
    if !self.ids.remove(&id) {
      return false;
    }
    self.items.retain(|movie| movie.id != id);
    info!(id, "removed favorite");
    self.persist();
    true
  }

  pub fn is_favorite(&self, id: u64) -> bool {
    self.ids.contains(&id)
  }

  pub fn get(&self, id: u64) -> Option<&Movie> {
    self.items.iter().find(|movie| movie.id == id)
  }

  /// Change the listing order. Not persisted.
  pub fn set_sort_by(&mut self, sort_by: SortBy) {
    self.sort_by = sort_by;
  }

  pub fn sort_by(&self) -> SortBy {
    self.sort_by
  }

  pub fn clear(&mut self) {
    self.items.clear();
    self.ids.clear();
    info!("cleared favorites");
    self.persist();
  }

  /// Favorites in insertion order.
  pub fn items(&self) -> &[Movie] {
    &self.items
  }

  /// Favorites ordered by the current sort mode. Ties keep insertion order.
  pub fn sorted(&self) -> Vec<&Movie> {
    let mut sorted: Vec<&Movie> = self.items.iter().collect();
    sorted.sort_by(|a, b| self.sort_by.compare(a, b));
    sorted
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  fn persist(&self) {
    self.storage.save(FAVORITES_KEY, &self.items);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::fixtures::movie;
  use crate::storage::testing::FailingBackend;
  use crate::storage::{KeyValueBackend, MemoryBackend};

  fn store() -> FavoritesStore {
    FavoritesStore::load(PersistentStore::in_memory(), SortBy::default())
  }

  fn ids(movies: &[&Movie]) -> Vec<u64> {
    movies.iter().map(|m| m.id).collect()
  }

  fn item_ids(store: &FavoritesStore) -> Vec<u64> {
    store.items().iter().map(|m| m.id).collect()
  }

  #[test]
  fn test_toggle_sequence() {
    let mut favorites = store();

    assert!(favorites.toggle(movie(1, "Alien", 8.5, "1979-05-25")));
    assert_eq!(item_ids(&favorites), vec![1]);

    assert!(favorites.toggle(movie(2, "Brazil", 7.9, "1985-02-20")));
    assert_eq!(item_ids(&favorites), vec![1, 2]);

    assert!(!favorites.toggle(movie(1, "Alien", 8.5, "1979-05-25")));
    assert_eq!(item_ids(&favorites), vec![2]);
    assert!(!favorites.is_favorite(1));
    assert!(favorites.is_favorite(2));
  }

  #[test]
  fn test_double_toggle_restores_state() {
    let mut favorites = store();
    for id in 1..=4 {
      favorites.add(movie(id, &format!("Movie {}", id), 7.0, "2020-01-01"));
    }
    let before = favorites.items().to_vec();

    favorites.toggle(movie(9, "Movie 9", 7.0, "2020-01-01"));
    favorites.toggle(movie(9, "Movie 9", 7.0, "2020-01-01"));
    assert_eq!(favorites.items(), before.as_slice());

    // A present item comes back at the end
    favorites.toggle(movie(3, "Movie 3", 7.0, "2020-01-01"));
    favorites.toggle(movie(3, "Movie 3", 7.0, "2020-01-01"));
    assert_eq!(item_ids(&favorites), vec![1, 2, 4, 3]);
  }

  #[test]
  fn test_ids_stay_unique() {
    let mut favorites = store();
    let sequence = [1, 2, 1, 3, 2, 2, 1, 3, 3, 4];
    for id in sequence {
      favorites.toggle(movie(id, "x", 5.0, ""));
      let unique: HashSet<u64> = favorites.items().iter().map(|m| m.id).collect();
      assert_eq!(unique.len(), favorites.len());
    }
    assert!(!favorites.add(movie(4, "again", 1.0, "")));
  }

  #[test]
  fn test_rating_sort_is_stable() {
    let mut favorites = store();
    favorites.add(movie(1, "First", 7.0, "2001-01-01"));
    favorites.add(movie(2, "Second", 9.0, "2002-01-01"));
    favorites.add(movie(3, "Third", 7.0, "2003-01-01"));

    favorites.set_sort_by(SortBy::RatingAsc);
    assert_eq!(ids(&favorites.sorted()), vec![1, 3, 2]);

    favorites.set_sort_by(SortBy::RatingDesc);
    assert_eq!(ids(&favorites.sorted()), vec![2, 1, 3]);
  }

  #[test]
  fn test_date_sort() {
    let mut favorites = store();
    favorites.add(movie(1, "a", 5.0, "1999-10-15"));
    favorites.add(movie(2, "b", 5.0, "2010-07-16"));
    favorites.add(movie(3, "c", 5.0, "1985-02-20"));

    assert_eq!(favorites.sort_by(), SortBy::DateDesc);
    assert_eq!(ids(&favorites.sorted()), vec![2, 1, 3]);

    favorites.set_sort_by(SortBy::DateAsc);
    assert_eq!(ids(&favorites.sorted()), vec![3, 1, 2]);
    assert_eq!(item_ids(&favorites), vec![1, 2, 3]);
  }

  #[test]
  fn test_title_sort_ignores_case_and_accents() {
    let mut favorites = store();
    favorites.add(movie(1, "zodiac", 5.0, ""));
    favorites.add(movie(2, "Élite", 5.0, ""));
    favorites.add(movie(3, "Amélie", 5.0, ""));
    favorites.add(movie(4, "elephant", 5.0, ""));

    favorites.set_sort_by(SortBy::TitleAsc);
    assert_eq!(ids(&favorites.sorted()), vec![3, 4, 2, 1]);

    favorites.set_sort_by(SortBy::TitleDesc);
    assert_eq!(ids(&favorites.sorted()), vec![1, 2, 4, 3]);
  }

  #[test]
  fn test_persists_across_loads() {
    let storage = PersistentStore::in_memory();
    let mut favorites = FavoritesStore::load(storage.clone(), SortBy::TitleAsc);
    favorites.add(movie(5, "Heat", 8.3, "1995-12-15"));
    favorites.add(movie(6, "Ronin", 7.3, "1998-09-25"));
    favorites.remove(5);

    let reloaded = FavoritesStore::load(storage.clone(), SortBy::TitleAsc);
    assert_eq!(item_ids(&reloaded), vec![6]);
    assert_eq!(reloaded.get(6).map(|m| m.title.as_str()), Some("Ronin"));

    let mut reloaded = reloaded;
    reloaded.clear();
    let empty: Option<Vec<Movie>> = storage.load(FAVORITES_KEY);
    assert_eq!(empty, Some(Vec::new()));
  }

  #[test]
  fn test_corrupt_storage_starts_empty() {
    let backend = MemoryBackend::new();
    backend.set(FAVORITES_KEY, "{not json").unwrap();

    let favorites = FavoritesStore::load(PersistentStore::new(backend), SortBy::default());
    assert!(favorites.is_empty());
  }

  #[test]
  fn test_duplicate_ids_dropped_on_load() {
    let storage = PersistentStore::in_memory();
    let stored = vec![
      movie(1, "One", 5.0, ""),
      movie(2, "Two", 5.0, ""),
      movie(1, "One again", 5.0, ""),
    ];
    storage.save(FAVORITES_KEY, &stored);

    let favorites = FavoritesStore::load(storage, SortBy::default());
    assert_eq!(item_ids(&favorites), vec![1, 2]);
    assert_eq!(favorites.get(1).map(|m| m.title.as_str()), Some("One"));
  }

  #[test]
  fn test_storage_failure_keeps_memory_state() {
    let mut favorites = FavoritesStore::load(PersistentStore::new(FailingBackend), SortBy::default());
    assert!(favorites.toggle(movie(1, "Alien", 8.5, "1979-05-25")));
    assert!(favorites.is_favorite(1));
    favorites.clear();
    assert!(favorites.is_empty());
  }

  #[test]
  fn test_parse_sort_mode() {
    assert_eq!("rating-desc".parse::<SortBy>(), Ok(SortBy::RatingDesc));
    assert_eq!(" Title-Asc ".parse::<SortBy>(), Ok(SortBy::TitleAsc));
    assert!("newest".parse::<SortBy>().is_err());
    for mode in SortBy::ALL {
      assert_eq!(mode.to_string().parse::<SortBy>(), Ok(mode));
    }
  }
}
