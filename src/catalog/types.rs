//! Catalog entities as returned by the remote API.
//!
//! Field names follow the API's JSON so the same types serve for decoding
//! responses and for persisting favorites. Missing optional fields fall back
//! to defaults rather than failing the whole page.

use serde::{Deserialize, Serialize};

use crate::cache::{Cacheable, Pagination};

/// Movie as it appears in list results. Also the favorites snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub original_title: String,
  #[serde(default)]
  pub overview: String,
  pub poster_path: Option<String>,
  pub backdrop_path: Option<String>,
  /// ISO 8601 date (`YYYY-MM-DD`), empty when unknown
  #[serde(default)]
  pub release_date: String,
  #[serde(default)]
  pub vote_average: f64,
  #[serde(default)]
  pub vote_count: u64,
  #[serde(default)]
  pub popularity: f64,
  #[serde(default)]
  pub adult: bool,
  #[serde(default)]
  pub genre_ids: Vec<u64>,
  #[serde(default)]
  pub original_language: String,
  #[serde(default)]
  pub video: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
  pub id: u64,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionCompany {
  pub id: u64,
  pub name: String,
  pub logo_path: Option<String>,
  #[serde(default)]
  pub origin_country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionCountry {
  pub iso_3166_1: String,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpokenLanguage {
  #[serde(default)]
  pub english_name: String,
  pub iso_639_1: String,
  #[serde(default)]
  pub name: String,
}

/// Full movie record from the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub original_title: String,
  #[serde(default)]
  pub overview: String,
  pub poster_path: Option<String>,
  pub backdrop_path: Option<String>,
  #[serde(default)]
  pub release_date: String,
  #[serde(default)]
  pub vote_average: f64,
  #[serde(default)]
  pub vote_count: u64,
  #[serde(default)]
  pub popularity: f64,
  #[serde(default)]
  pub adult: bool,
  #[serde(default)]
  pub original_language: String,
  #[serde(default)]
  pub video: bool,
  #[serde(default)]
  pub genres: Vec<Genre>,
  pub runtime: Option<u32>,
  #[serde(default)]
  pub budget: u64,
  #[serde(default)]
  pub revenue: u64,
  #[serde(default)]
  pub status: String,
  pub tagline: Option<String>,
  pub homepage: Option<String>,
  pub imdb_id: Option<String>,
  #[serde(default)]
  pub production_companies: Vec<ProductionCompany>,
  #[serde(default)]
  pub production_countries: Vec<ProductionCountry>,
  #[serde(default)]
  pub spoken_languages: Vec<SpokenLanguage>,
}

impl From<&MovieDetails> for Movie {
  /// Snapshot used when a movie is favorited from its detail view.
  fn from(details: &MovieDetails) -> Self {
    Movie {
      id: details.id,
      title: details.title.clone(),
      original_title: details.original_title.clone(),
      overview: details.overview.clone(),
      poster_path: details.poster_path.clone(),
      backdrop_path: details.backdrop_path.clone(),
      release_date: details.release_date.clone(),
      vote_average: details.vote_average,
      vote_count: details.vote_count,
      popularity: details.popularity,
      adult: details.adult,
      genre_ids: details.genres.iter().map(|g| g.id).collect(),
      original_language: details.original_language.clone(),
      video: details.video,
    }
  }
}

/// One page of a movie list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
  pub page: u32,
  #[serde(default)]
  pub results: Vec<Movie>,
  #[serde(default)]
  pub total_pages: u32,
  #[serde(default)]
  pub total_results: u64,
}

/// Payload stored in the query cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogData {
  /// Accumulated pages of a list or search
  Page(MoviePage),
  Details(Box<MovieDetails>),
}

impl CatalogData {
  pub fn as_page(&self) -> Option<&MoviePage> {
    match self {
      CatalogData::Page(page) => Some(page),
      CatalogData::Details(_) => None,
    }
  }

  pub fn as_details(&self) -> Option<&MovieDetails> {
    match self {
      CatalogData::Details(details) => Some(details),
      CatalogData::Page(_) => None,
    }
  }

  /// Movies in the payload, in fetch order.
  pub fn movies(&self) -> &[Movie] {
    match self {
      CatalogData::Page(page) => &page.results,
      CatalogData::Details(_) => &[],
    }
  }
}

impl Cacheable for CatalogData {
  fn append(&mut self, next: Self) {
    match (self, next) {
      (CatalogData::Page(current), CatalogData::Page(next)) => {
        // Trust the API not to repeat items across pages of one query
        current.results.extend(next.results);
        current.page = next.page;
        current.total_pages = next.total_pages;
        current.total_results = next.total_results;
      }
      (current, next) => *current = next,
    }
  }

  fn pagination(&self) -> Option<Pagination> {
    self.as_page().map(|page| Pagination {
      page: page.page,
      total_pages: page.total_pages,
      total_results: page.total_results,
    })
  }
}

#[cfg(test)]
pub(crate) mod fixtures {
  use super::*;

  pub fn movie(id: u64, title: &str, rating: f64, date: &str) -> Movie {
    Movie {
      id,
      title: title.to_string(),
      original_title: title.to_string(),
      overview: String::new(),
      poster_path: Some(format!("/poster{}.jpg", id)),
      backdrop_path: None,
      release_date: date.to_string(),
      vote_average: rating,
      vote_count: 100,
      popularity: 10.0,
      adult: false,
      genre_ids: vec![28],
      original_language: "en".to_string(),
      video: false,
    }
  }

  pub fn page(page: u32, ids: &[u64], total_pages: u32) -> MoviePage {
    MoviePage {
      page,
      results: ids
        .iter()
        .map(|id| movie(*id, &format!("Movie {}", id), 7.0, "2024-01-01"))
        .collect(),
      total_pages,
      total_results: u64::from(total_pages) * 20,
    }
  }
}
