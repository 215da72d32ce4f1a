use crate::catalog::{CatalogApi, CatalogData, CatalogQuery, Movie, MovieList};
use crate::commands::{self, COMMANDS};
use crate::event::{Event, EventHandler};
use crate::favorites::{FavoritesStore, SortBy};
use crate::preferences::{PreferenceStore, Theme, ViewMode};
use crate::query::{QueryHandle, QueryOptions};
use crate::render::{self, Printed, RenderContext};
use color_eyre::Result;
use std::io::Write;

/// View state - each variant owns its query handle
pub enum Screen {
  Home,
  MovieList {
    list: MovieList,
    query: QueryHandle<CatalogQuery>,
    /// Movies already printed
    printed: Printed,
  },
  Search {
    term: String,
    query: QueryHandle<CatalogQuery>,
    printed: Printed,
  },
  MovieDetail {
    id: u64,
    query: QueryHandle<CatalogQuery>,
  },
  Favorites,
}

impl Screen {
  fn query_mut(&mut self) -> Option<&mut QueryHandle<CatalogQuery>> {
    match self {
      Screen::MovieList { query, .. }
      | Screen::Search { query, .. }
      | Screen::MovieDetail { query, .. } => Some(query),
      Screen::Home | Screen::Favorites => None,
    }
  }

  /// Movies visible on this screen, for `fav <id>` lookups.
  fn find_movie(&self, id: u64) -> Option<Movie> {
    match self {
      Screen::MovieList { query, .. } | Screen::Search { query, .. } => query
        .data()
        .and_then(|data| data.movies().iter().find(|m| m.id == id))
        .cloned(),
      Screen::MovieDetail { query, .. } => query
        .data()
        .and_then(CatalogData::as_details)
        .filter(|details| details.id == id)
        .map(Movie::from),
      Screen::Home | Screen::Favorites => None,
    }
  }

  /// Get the label for this view in the breadcrumb
  fn breadcrumb_label(&self) -> String {
    match self {
      Screen::Home => "Home".to_string(),
      Screen::MovieList { list, .. } => list.title().to_string(),
      Screen::Search { term, .. } => format!("Search [{}]", term),
      Screen::MovieDetail { id, .. } => format!("Movie #{}", id),
      Screen::Favorites => "Favorites".to_string(),
    }
  }
}

/// Interactive line-based browser
pub struct App<W: Write> {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Screen>,

  api: CatalogApi,
  favorites: FavoritesStore,
  view_mode: PreferenceStore<ViewMode>,
  theme: PreferenceStore<Theme>,
  image_base_url: String,

  out: W,

  /// Whether to quit
  should_quit: bool,
}

impl<W: Write> App<W> {
  pub fn new(
    api: CatalogApi,
    favorites: FavoritesStore,
    view_mode: PreferenceStore<ViewMode>,
    theme: PreferenceStore<Theme>,
    image_base_url: impl Into<String>,
    out: W,
  ) -> Self {
    Self {
      view_stack: vec![Screen::Home],
      api,
      favorites,
      view_mode,
      theme,
      image_base_url: image_base_url.into(),
      out,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    writeln!(
      self.out,
      "marquee: type `help` for commands ({} favorites, {} view, {} theme)",
      self.favorites.len(),
      self.view_mode.get(),
      self.theme.get()
    )?;
    self.prompt()?;

    while !self.should_quit {
      match events.next().await {
        Some(Event::Line(line)) => {
          self.handle_line(&line).await?;
          if !self.should_quit {
            self.prompt()?;
          }
        }
        Some(Event::Tick) => self.tick()?,
        Some(Event::Eof) | None => self.should_quit = true,
      }
    }

    self.leave_all();
    Ok(())
  }

  fn prompt(&mut self) -> Result<()> {
    write!(self.out, "{}> ", self.view_breadcrumb().join(" / "))?;
    self.out.flush()?;
    Ok(())
  }

  /// Pick up query state changes and print them.
  pub fn tick(&mut self) -> Result<()> {
    let changed = self
      .view_stack
      .last_mut()
      .and_then(Screen::query_mut)
      .is_some_and(|query| query.poll());
    if changed {
      self.render_current()?;
    }
    Ok(())
  }

  /// Wait until the current screen's query has resolved, then print it.
  pub async fn settle(&mut self) -> Result<()> {
    if let Some(query) = self.view_stack.last_mut().and_then(Screen::query_mut) {
      query.resolve().await;
    }
    self.render_current()
  }

  pub async fn handle_line(&mut self, line: &str) -> Result<()> {
    if line.trim().is_empty() {
      return Ok(());
    }
    let Some((cmd, arg)) = commands::parse(line) else {
      writeln!(self.out, "Unknown command: {}. Type `help`.", line.trim())?;
      return Ok(());
    };

    match cmd.name {
      "popular" => self.open_list(MovieList::Popular)?,
      "top-rated" => self.open_list(MovieList::TopRated)?,
      "upcoming" => self.open_list(MovieList::Upcoming)?,
      "now-playing" => self.open_list(MovieList::NowPlaying)?,
      "search" => self.open_search(arg)?,
      "more" => self.load_more()?,
      "refetch" => self.refetch()?,
      "movie" => match parse_id(arg) {
        Some(id) => self.open_movie(id)?,
        None => writeln!(self.out, "Usage: {}", cmd.usage)?,
      },
      "back" => self.go_back()?,
      "fav" => match parse_id(arg) {
        Some(id) => self.toggle_favorite(id).await?,
        None => writeln!(self.out, "Usage: {}", cmd.usage)?,
      },
      "favorites" => {
        self.replace_root(Screen::Favorites);
        self.render_current()?;
      }
      "sort" => self.set_sort(arg)?,
      "clear-favorites" => {
        self.favorites.clear();
        writeln!(self.out, "Favorites cleared.")?;
      }
      "view" => self.set_view(arg)?,
      "theme" => self.set_theme(arg)?,
      "help" => self.help()?,
      "quit" => self.should_quit = true,
      _ => {}
    }
    Ok(())
  }

  fn open_list(&mut self, list: MovieList) -> Result<()> {
    self.leave_all();
    let query = self.api.list(list, 1, QueryOptions::default());
    self.view_stack.push(Screen::MovieList {
      list,
      query,
      printed: Printed::default(),
    });
    self.render_current()
  }

  fn open_search(&mut self, term: &str) -> Result<()> {
    if term.trim().is_empty() {
      writeln!(self.out, "Usage: search <title>")?;
      return Ok(());
    }
    // Earlier results revalidate if the same term comes back
    self.leave_all();
    self.api.invalidate_searches();
    let query = self.api.search(term, 1, QueryOptions::default());
    self.view_stack.push(Screen::Search {
      term: term.trim().to_string(),
      query,
      printed: Printed::default(),
    });
    self.render_current()
  }

  fn open_movie(&mut self, id: u64) -> Result<()> {
    let query = self.api.details(id, QueryOptions::default());
    self.view_stack.push(Screen::MovieDetail { id, query });
    self.render_current()
  }

  fn load_more(&mut self) -> Result<()> {
    let Some(screen) = self.view_stack.last_mut() else {
      return Ok(());
    };
    let query = match screen {
      Screen::MovieList { query, .. } | Screen::Search { query, .. } => query,
      _ => {
        writeln!(self.out, "Nothing to page through here.")?;
        return Ok(());
      }
    };

    if query.fetch_next_page() {
      query.poll();
      return self.render_current();
    }
    if query.is_loading() {
      writeln!(self.out, "Still loading, try again in a moment.")?;
    } else {
      writeln!(self.out, "No more pages.")?;
    }
    Ok(())
  }

  fn refetch(&mut self) -> Result<()> {
    match self.view_stack.last_mut() {
      Some(Screen::MovieList { query, .. })
      | Some(Screen::Search { query, .. })
      | Some(Screen::MovieDetail { query, .. }) => {
        query.refetch();
        query.poll();
        self.render_current()
      }
      Some(Screen::Favorites) => self.render_current(),
      _ => {
        writeln!(self.out, "Nothing to reload here.")?;
        Ok(())
      }
    }
  }

  fn go_back(&mut self) -> Result<()> {
    if self.view_stack.len() > 1 {
      if let Some(screen) = self.view_stack.pop() {
        self.leave(&screen);
      }
      self.render_current()
    } else {
      writeln!(self.out, "Already at the top.")?;
      Ok(())
    }
  }

  async fn toggle_favorite(&mut self, id: u64) -> Result<()> {
    let movie = match self.visible_movie(id) {
      Some(movie) => movie,
      None => {
        let entry = self.api.fetch_details(id).await;
        match entry.data().and_then(CatalogData::as_details) {
          Some(details) => Movie::from(details),
          None => {
            let reason = entry
              .error()
              .map(|e| e.to_string())
              .unwrap_or_else(|| "not found".to_string());
            writeln!(self.out, "Could not load movie {}: {}", id, reason)?;
            return Ok(());
          }
        }
      }
    };

    let title = movie.title.clone();
    if self.favorites.toggle(movie) {
      writeln!(self.out, "♥ Added {} to favorites.", title)?;
    } else {
      writeln!(self.out, "Removed {} from favorites.", title)?;
    }
    if matches!(self.view_stack.last(), Some(Screen::Favorites)) {
      self.render_current()?;
    }
    Ok(())
  }

  fn visible_movie(&self, id: u64) -> Option<Movie> {
    self
      .view_stack
      .iter()
      .rev()
      .find_map(|screen| screen.find_movie(id))
      .or_else(|| self.favorites.get(id).cloned())
  }

  fn set_sort(&mut self, arg: &str) -> Result<()> {
    match arg.parse::<SortBy>() {
      Ok(mode) => {
        self.favorites.set_sort_by(mode);
        writeln!(self.out, "Favorites sorted by {}.", mode)?;
        if matches!(self.view_stack.last(), Some(Screen::Favorites)) {
          self.render_current()?;
        }
      }
      Err(e) => writeln!(self.out, "{}", e)?,
    }
    Ok(())
  }

  fn set_view(&mut self, arg: &str) -> Result<()> {
    let mode = if arg.is_empty() {
      self.view_mode.toggle()
    } else {
      match arg.parse::<ViewMode>() {
        Ok(mode) => {
          self.view_mode.set(mode);
          mode
        }
        Err(e) => {
          writeln!(self.out, "{}", e)?;
          return Ok(());
        }
      }
    };
    writeln!(self.out, "View mode: {}", mode)?;
    Ok(())
  }

  fn set_theme(&mut self, arg: &str) -> Result<()> {
    let theme = if arg.is_empty() {
      self.theme.toggle()
    } else {
      match arg.parse::<Theme>() {
        Ok(theme) => {
          self.theme.set(theme);
          theme
        }
        Err(e) => {
          writeln!(self.out, "{}", e)?;
          return Ok(());
        }
      }
    };
    writeln!(self.out, "Theme: {}", theme)?;
    Ok(())
  }

  fn help(&mut self) -> Result<()> {
    writeln!(self.out, "Commands:")?;
    for cmd in COMMANDS {
      let aliases = if cmd.aliases.is_empty() {
        String::new()
      } else {
        format!(" ({})", cmd.aliases.join(", "))
      };
      writeln!(self.out, "  {:<24}{}{}", cmd.usage, cmd.description, aliases)?;
    }
    Ok(())
  }

  /// Swap the root view, leaving everything on the stack.
  fn replace_root(&mut self, screen: Screen) {
    self.leave_all();
    self.view_stack.push(screen);
  }

  fn leave_all(&mut self) {
    while let Some(screen) = self.view_stack.pop() {
      self.leave(&screen);
    }
  }

  /// A list that is no longer shown gets refetched when it comes back.
  fn leave(&self, screen: &Screen) {
    if let Screen::MovieList { list, .. } = screen {
      self.api.invalidate_list(*list);
    }
  }

  fn render_current(&mut self) -> Result<()> {
    let Self {
      view_stack,
      favorites,
      view_mode,
      image_base_url,
      out,
      ..
    } = self;
    let ctx = RenderContext {
      favorites: &*favorites,
      view_mode: view_mode.get(),
      image_base_url: image_base_url.as_str(),
    };

    match view_stack.last_mut() {
      Some(Screen::MovieList {
        list, query, printed, ..
      }) => render::page(out, list.title(), query.state(), printed, &ctx)?,
      Some(Screen::Search {
        term, query, printed, ..
      }) => render::page(out, &format!("Search \"{}\"", term), query.state(), printed, &ctx)?,
      Some(Screen::MovieDetail { id, query }) => render::details(out, *id, query.state(), &ctx)?,
      Some(Screen::Favorites) => render::favorites(out, &ctx)?,
      Some(Screen::Home) | None => {}
    }
    Ok(())
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn current_view(&self) -> Option<&Screen> {
    self.view_stack.last()
  }

  pub fn favorites(&self) -> &FavoritesStore {
    &self.favorites
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }

  pub fn output(&self) -> &W {
    &self.out
  }
}

fn parse_id(arg: &str) -> Option<u64> {
  arg.trim().trim_start_matches('#').parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheConfig, CacheKey};
  use crate::catalog::testing::FakeCatalog;
  use crate::storage::PersistentStore;
  use std::sync::Arc;

  fn app(fake: &FakeCatalog) -> App<Vec<u8>> {
    let storage = PersistentStore::in_memory();
    App::new(
      CatalogApi::with_fetcher(Arc::new(fake.clone()), CacheConfig::default()),
      FavoritesStore::load(storage.clone(), SortBy::default()),
      PreferenceStore::load(storage.clone(), ViewMode::Simple),
      PreferenceStore::load(storage, Theme::Light),
      "https://image.tmdb.org/t/p",
      Vec::new(),
    )
  }

  fn text(app: &App<Vec<u8>>) -> String {
    String::from_utf8_lossy(app.output()).into_owned()
  }

  #[tokio::test]
  async fn test_browse_popular_and_load_more() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("popular").await.unwrap();
    app.settle().await.unwrap();
    app.handle_line("more").await.unwrap();
    app.settle().await.unwrap();

    let out = text(&app);
    assert!(out.contains("Loading Popular..."));
    assert!(out.contains("[#101]"));
    assert!(out.contains("  4. Movie 202"));
    assert_eq!(fake.calls(), 2);
  }

  #[tokio::test]
  async fn test_more_retries_failed_page() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("popular").await.unwrap();
    app.settle().await.unwrap();
    fake.fail_on(
      "Popular movies page 2",
      crate::error::HttpError::Network("connection reset".to_string()),
    );
    app.handle_line("more").await.unwrap();
    app.settle().await.unwrap();
    assert!(text(&app).contains("Type `more` to retry."));
    assert_eq!(fake.calls(), 2);

    fake.clear_failures();
    app.handle_line("more").await.unwrap();
    app.settle().await.unwrap();

    assert_eq!(fake.calls(), 3);
    let out = text(&app);
    assert!(out.contains("  3. Movie 201"));
    assert!(out.contains("  4. Movie 202"));
    let entry = app
      .api
      .cache()
      .snapshot(&CacheKey::new("popular"))
      .unwrap();
    let ids: Vec<u64> = entry
      .data()
      .map(|d| d.movies().iter().map(|m| m.id).collect())
      .unwrap_or_default();
    assert_eq!(ids, vec![101, 102, 201, 202]);
  }

  #[tokio::test]
  async fn test_refetch_prints_list_again() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("popular").await.unwrap();
    app.settle().await.unwrap();
    let before = text(&app).matches("  1. Movie 101").count();

    app.handle_line("refetch").await.unwrap();
    app.settle().await.unwrap();

    assert_eq!(fake.calls(), 2);
    assert_eq!(text(&app).matches("  1. Movie 101").count(), before + 1);
  }

  #[tokio::test]
  async fn test_leaving_list_invalidates_it() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("popular").await.unwrap();
    app.settle().await.unwrap();
    app.handle_line("favorites").await.unwrap();

    let entry = app
      .api
      .cache()
      .snapshot(&CacheKey::new("popular"))
      .unwrap();
    assert!(entry.stale);

    app.handle_line("popular").await.unwrap();
    app.settle().await.unwrap();
    assert_eq!(fake.calls(), 2);
  }

  #[tokio::test]
  async fn test_fav_from_list_and_details() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("popular").await.unwrap();
    app.settle().await.unwrap();
    app.handle_line("fav 102").await.unwrap();
    assert!(app.favorites().is_favorite(102));

    // Not on screen: fetched through the details endpoint
    app.handle_line("fav 550").await.unwrap();
    assert!(app.favorites().is_favorite(550));

    app.handle_line("f #102").await.unwrap();
    assert!(!app.favorites().is_favorite(102));
    assert!(text(&app).contains("Removed Movie 102 from favorites."));
  }

  #[tokio::test]
  async fn test_details_push_and_back() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("upcoming").await.unwrap();
    app.settle().await.unwrap();
    app.handle_line("movie 77").await.unwrap();
    app.settle().await.unwrap();
    assert_eq!(app.view_breadcrumb(), vec!["Upcoming", "Movie #77"]);

    app.handle_line("back").await.unwrap();
    assert_eq!(app.view_breadcrumb(), vec!["Upcoming"]);
    assert!(text(&app).contains("Movie 77"));
  }

  #[tokio::test]
  async fn test_search_blank_shows_usage() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("search   ").await.unwrap();
    assert!(text(&app).contains("Usage: search <title>"));
    assert_eq!(fake.calls(), 0);
  }

  #[tokio::test]
  async fn test_failed_list_offers_retry() {
    let fake = FakeCatalog::default();
    fake.fail_on(
      "Top rated",
      crate::error::HttpError::Status {
        status: 500,
        message: "Internal Server Error".to_string(),
      },
    );
    let mut app = app(&fake);

    app.handle_line("top").await.unwrap();
    app.settle().await.unwrap();
    assert!(text(&app).contains("Type `refetch` to retry."));
  }

  #[tokio::test]
  async fn test_preferences_and_sort_commands() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("view").await.unwrap();
    app.handle_line("theme dark").await.unwrap();
    app.handle_line("sort rating-asc").await.unwrap();
    app.handle_line("sort sideways").await.unwrap();

    let out = text(&app);
    assert!(out.contains("View mode: advanced"));
    assert!(out.contains("Theme: dark"));
    assert!(out.contains("Favorites sorted by rating-asc."));
    assert!(out.contains("unknown sort mode 'sideways'"));
    assert_eq!(app.favorites().sort_by(), SortBy::RatingAsc);
  }

  #[tokio::test]
  async fn test_quit_and_unknown() {
    let fake = FakeCatalog::default();
    let mut app = app(&fake);

    app.handle_line("xyzzy").await.unwrap();
    assert!(text(&app).contains("Unknown command: xyzzy"));
    app.handle_line("q").await.unwrap();
    assert!(app.should_quit());
  }
}
