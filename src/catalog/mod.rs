//! Remote movie catalog: REST client, entity types and cached accessors.

mod api;
mod client;
mod queries;
mod types;

pub use api::CatalogApi;
pub use client::CatalogClient;
pub use queries::{normalize_query, search_tag, CatalogQuery, EntityType, MovieList};
pub use types::{
  CatalogData, Genre, Movie, MovieDetails, MoviePage, ProductionCompany, ProductionCountry,
  SpokenLanguage,
};

#[cfg(test)]
pub(crate) use api::testing;
#[cfg(test)]
pub(crate) use types::fixtures;
