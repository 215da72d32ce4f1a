//! Plain-text rendering of cache entries, movies and favorites.

use chrono::{DateTime, Utc};
use std::io::{self, Write};

use crate::cache::CacheEntry;
use crate::catalog::{CatalogData, Movie, MovieDetails};
use crate::favorites::FavoritesStore;
use crate::format::{
  format_currency, format_rating, format_runtime, poster_url_or_placeholder, truncate, year,
  PosterSize,
};
use crate::preferences::ViewMode;

const OVERVIEW_WIDTH: usize = 120;

/// What a render needs besides the data itself.
pub struct RenderContext<'a> {
  pub favorites: &'a FavoritesStore,
  pub view_mode: ViewMode,
  pub image_base_url: &'a str,
}

pub fn movie_line<W: Write>(
  out: &mut W,
  index: usize,
  movie: &Movie,
  ctx: &RenderContext<'_>,
) -> io::Result<()> {
  let marker = if ctx.favorites.is_favorite(movie.id) {
    " ♥"
  } else {
    ""
  };
  let released = year(&movie.release_date);
  let released = if released.is_empty() { "n/a" } else { released };

  writeln!(
    out,
    "{:>3}. {} ({}) ★ {}{}  [#{}]",
    index,
    movie.title,
    released,
    format_rating(movie.vote_average),
    marker,
    movie.id
  )?;

  if ctx.view_mode == ViewMode::Advanced {
    if !movie.overview.is_empty() {
      writeln!(out, "     {}", truncate(&movie.overview, OVERVIEW_WIDTH))?;
    }
    writeln!(
      out,
      "     {} votes · poster {}",
      movie.vote_count,
      poster_url_or_placeholder(ctx.image_base_url, movie.poster_path.as_deref(), PosterSize::Small)
    )?;
  }
  Ok(())
}

/// How much of a paginated entry a view has already printed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Printed {
  pub movies: usize,
  pub page: u32,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl Printed {
  /// Whether `entry` holds a list that replaced the printed one.
  ///
  /// A newer response that did not move past the printed page is a
  /// replacement, since only later pages are appended.
  fn is_replaced_by(&self, entry: &CacheEntry<CatalogData>, len: usize) -> bool {
    len < self.movies || (entry.fetched_at != self.fetched_at && entry.page() <= self.page)
  }
}

/// Render a paginated entry, printing only movies past what `printed` covers.
///
/// A replaced list (after a refetch) is printed again from the top.
pub fn page<W: Write>(
  out: &mut W,
  title: &str,
  entry: &CacheEntry<CatalogData>,
  printed: &mut Printed,
  ctx: &RenderContext<'_>,
) -> io::Result<()> {
  let movies = entry.data().map(CatalogData::movies).unwrap_or_default();

  if let Some(err) = entry.error().filter(|_| entry.is_error()) {
    let hint = if entry.failed_next_page() && !movies.is_empty() {
      "Type `more` to retry"
    } else {
      "Type `refetch` to retry"
    };
    writeln!(out, "! {}: {}. {}.", title, err, hint)?;
    if !movies.is_empty() {
      writeln!(out, "  (showing the last loaded results)")?;
    }
    return Ok(());
  }

  if entry.is_loading() {
    if entry.is_first_load() {
      writeln!(out, "Loading {}...", title)?;
    } else {
      writeln!(out, "Updating {}...", title)?;
    }
    return Ok(());
  }

  if !entry.is_success() {
    return Ok(());
  }

  if printed.is_replaced_by(entry, movies.len()) {
    printed.movies = 0;
  }
  if printed.movies == 0 {
    writeln!(
      out,
      "{}: {} results (page {} of {})",
      title,
      entry.total_results(),
      entry.page(),
      entry.total_pages()
    )?;
    if movies.is_empty() {
      writeln!(out, "No movies found.")?;
    }
  }

  for (i, movie) in movies.iter().enumerate().skip(printed.movies) {
    movie_line(out, i + 1, movie, ctx)?;
  }
  *printed = Printed {
    movies: movies.len(),
    page: entry.page(),
    fetched_at: entry.fetched_at,
  };

  if entry.pagination.has_next_page() && printed.movies > 0 {
    writeln!(out, "-- page {} of {}, type `more` for the next page", entry.page(), entry.total_pages())?;
  }
  Ok(())
}

pub fn details<W: Write>(
  out: &mut W,
  id: u64,
  entry: &CacheEntry<CatalogData>,
  ctx: &RenderContext<'_>,
) -> io::Result<()> {
  if let Some(err) = entry.error().filter(|_| entry.is_error()) {
    return writeln!(out, "! movie {}: {}. Type `refetch` to retry.", id, err);
  }
  if entry.is_loading() && entry.is_first_load() {
    return writeln!(out, "Loading movie {}...", id);
  }
  match entry.data().and_then(CatalogData::as_details) {
    Some(movie) => movie_details(out, movie, ctx),
    None => Ok(()),
  }
}

pub fn movie_details<W: Write>(
  out: &mut W,
  movie: &MovieDetails,
  ctx: &RenderContext<'_>,
) -> io::Result<()> {
  let marker = if ctx.favorites.is_favorite(movie.id) {
    "  ♥ favorite"
  } else {
    ""
  };
  writeln!(out, "{} ({}){}", movie.title, year(&movie.release_date), marker)?;
  if let Some(tagline) = movie.tagline.as_deref().filter(|t| !t.is_empty()) {
    writeln!(out, "  \"{}\"", tagline)?;
  }
  writeln!(
    out,
    "  ★ {} ({} votes)  {}",
    format_rating(movie.vote_average),
    movie.vote_count,
    format_runtime(movie.runtime)
  )?;
  if !movie.genres.is_empty() {
    let genres: Vec<&str> = movie.genres.iter().map(|g| g.name.as_str()).collect();
    writeln!(out, "  Genres: {}", genres.join(", "))?;
  }
  if !movie.release_date.is_empty() {
    writeln!(out, "  Released: {} ({})", movie.release_date, movie.status)?;
  }
  if !movie.overview.is_empty() {
    writeln!(out)?;
    writeln!(out, "  {}", movie.overview)?;
  }

  if ctx.view_mode == ViewMode::Advanced {
    writeln!(out)?;
    if movie.budget > 0 {
      writeln!(out, "  Budget: {}", format_currency(movie.budget))?;
    }
    if movie.revenue > 0 {
      writeln!(out, "  Revenue: {}", format_currency(movie.revenue))?;
    }
    if !movie.production_companies.is_empty() {
      let names: Vec<&str> = movie
        .production_companies
        .iter()
        .map(|c| c.name.as_str())
        .collect();
      writeln!(out, "  Produced by: {}", names.join(", "))?;
    }
    if let Some(homepage) = movie.homepage.as_deref().filter(|h| !h.is_empty()) {
      writeln!(out, "  Homepage: {}", homepage)?;
    }
    writeln!(
      out,
      "  Poster: {}",
      poster_url_or_placeholder(ctx.image_base_url, movie.poster_path.as_deref(), PosterSize::Large)
    )?;
  }
  Ok(())
}

pub fn favorites<W: Write>(out: &mut W, ctx: &RenderContext<'_>) -> io::Result<()> {
  let store = ctx.favorites;
  if store.is_empty() {
    return writeln!(out, "No favorites yet. Use `fav <id>` to add one.");
  }

  writeln!(out, "Favorites: {} (sorted by {})", store.len(), store.sort_by())?;
  for (i, movie) in store.sorted().into_iter().enumerate() {
    movie_line(out, i + 1, movie, ctx)?;
  }
  Ok(())
}
