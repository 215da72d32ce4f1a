//! Query descriptors for catalog endpoints: cache keys, tags and request shapes.

use std::fmt;

use super::types::CatalogData;
use crate::cache::{CacheKey, QueryKey, Tag};

/// Entity types used as tag roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
  PopularMovies,
  TopRatedMovies,
  UpcomingMovies,
  NowPlayingMovies,
  SearchResults,
  MovieDetails,
}

impl EntityType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::PopularMovies => "PopularMovies",
      Self::TopRatedMovies => "TopRatedMovies",
      Self::UpcomingMovies => "UpcomingMovies",
      Self::NowPlayingMovies => "NowPlayingMovies",
      Self::SearchResults => "SearchResults",
      Self::MovieDetails => "MovieDetails",
    }
  }

  /// Tag covering every entry of this type.
  pub fn tag(&self) -> Tag {
    Tag::entity(self.as_str())
  }

  pub fn list_tag(&self) -> Tag {
    Tag::list(self.as_str())
  }

  pub fn id_tag(&self, id: u64) -> Tag {
    Tag::id(self.as_str(), id)
  }
}

impl fmt::Display for EntityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Curated movie lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovieList {
  Popular,
  TopRated,
  Upcoming,
  NowPlaying,
}

impl MovieList {
  pub const ALL: [MovieList; 4] = [
    MovieList::Popular,
    MovieList::TopRated,
    MovieList::Upcoming,
    MovieList::NowPlaying,
  ];

  pub fn path(&self) -> &'static str {
    match self {
      Self::Popular => "/movie/popular",
      Self::TopRated => "/movie/top_rated",
      Self::Upcoming => "/movie/upcoming",
      Self::NowPlaying => "/movie/now_playing",
    }
  }

  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::Popular => EntityType::PopularMovies,
      Self::TopRated => EntityType::TopRatedMovies,
      Self::Upcoming => EntityType::UpcomingMovies,
      Self::NowPlaying => EntityType::NowPlayingMovies,
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      Self::Popular => "Popular",
      Self::TopRated => "Top rated",
      Self::Upcoming => "Upcoming",
      Self::NowPlaying => "Now playing",
    }
  }

  fn key_name(&self) -> &'static str {
    match self {
      Self::Popular => "popular",
      Self::TopRated => "top_rated",
      Self::Upcoming => "upcoming",
      Self::NowPlaying => "now_playing",
    }
  }
}

/// A request against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
  /// One page of a curated list
  List { list: MovieList, page: u32 },
  /// One page of a free-text search
  Search { query: String, page: u32 },
  /// A single movie by id
  Details { id: u64 },
}

impl CatalogQuery {
  pub fn list(list: MovieList, page: u32) -> Self {
    Self::List {
      list,
      page: page.max(1),
    }
  }

  pub fn search(query: impl Into<String>, page: u32) -> Self {
    Self::Search {
      query: query.into().trim().to_string(),
      page: page.max(1),
    }
  }

  pub fn details(id: u64) -> Self {
    Self::Details { id }
  }

  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::List { list, .. } => list.entity_type(),
      Self::Search { .. } => EntityType::SearchResults,
      Self::Details { .. } => EntityType::MovieDetails,
    }
  }

  /// Path and query parameters for the HTTP request.
  pub fn request(&self) -> (String, Vec<(&'static str, String)>) {
    match self {
      Self::List { list, page } => (list.path().to_string(), vec![("page", page.to_string())]),
      Self::Search { query, page } => (
        "/search/movie".to_string(),
        vec![("query", query.clone()), ("page", page.to_string())],
      ),
      Self::Details { id } => (format!("/movie/{}", id), Vec::new()),
    }
  }

  /// Whether this is a search with nothing to search for.
  pub fn is_blank_search(&self) -> bool {
    matches!(self, Self::Search { query, .. } if normalize_query(query).is_empty())
  }
}

impl QueryKey for CatalogQuery {
  type Data = CatalogData;

  fn cache_key(&self) -> CacheKey {
    match self {
      Self::List { list, .. } => CacheKey::new(list.key_name()),
      Self::Search { query, .. } => CacheKey::new(format!("search:{}", normalize_query(query))),
      Self::Details { id } => CacheKey::new(format!("movie:{}", id)),
    }
  }

  fn page(&self) -> u32 {
    match self {
      Self::List { page, .. } | Self::Search { page, .. } => *page,
      Self::Details { .. } => 1,
    }
  }

  fn with_page(&self, page: u32) -> Self {
    let page = page.max(1);
    match self {
      Self::List { list, .. } => Self::List { list: *list, page },
      Self::Search { query, .. } => Self::Search {
        query: query.clone(),
        page,
      },
      Self::Details { id } => Self::Details { id: *id },
    }
  }

  fn provides_tags(&self, data: &CatalogData) -> Vec<Tag> {
    let entity = self.entity_type();
    let mut tags = vec![entity.tag()];

    match self {
      Self::Details { id } => tags.push(entity.id_tag(*id)),
      Self::List { .. } | Self::Search { .. } => {
        tags.push(entity.list_tag());
        if let Self::Search { query, .. } = self {
          tags.push(search_tag(query));
        }
        tags.extend(data.movies().iter().map(|movie| entity.id_tag(movie.id)));
      }
    }

    tags
  }

  fn description(&self) -> String {
    match self {
      Self::List { list, page } => format!("{} movies page {}", list.title(), page),
      Self::Search { query, page } => format!("search \"{}\" page {}", query, page),
      Self::Details { id } => format!("movie {}", id),
    }
  }
}

/// Marker tag for every page of one search term.
pub fn search_tag(query: &str) -> Tag {
  Tag::new(format!(
    "{}:SEARCH-{}",
    EntityType::SearchResults,
    normalize_query(query)
  ))
}

/// Normalize a search term for consistent keys.
/// Trims, collapses inner whitespace and lowercases.
pub fn normalize_query(query: &str) -> String {
  query
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}
