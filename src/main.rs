use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use marquee::app::App;
use marquee::catalog::{CatalogApi, CatalogClient, CatalogData, MovieList};
use marquee::config::Config;
use marquee::event::EventHandler;
use marquee::favorites::{FavoritesStore, SortBy};
use marquee::preferences::{PreferenceStore, Toggle, ViewMode};
use marquee::render::{self, Printed, RenderContext};
use marquee::storage::{PersistentStore, SqliteBackend};

#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(about = "Browse a movie catalog and keep a list of favorites")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/marquee/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Catalog API base URL
  #[arg(long, global = true)]
  base_url: Option<String>,

  /// SQLite file for favorites and preferences
  #[arg(long, global = true)]
  storage: Option<PathBuf>,

  /// Keep favorites and preferences in memory for this session only
  #[arg(long, global = true, conflicts_with = "storage")]
  memory: bool,

  /// Log at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Interactive browser (default)
  Browse,
  /// Popular movies
  Popular {
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Top rated movies
  TopRated {
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Upcoming releases
  Upcoming {
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Movies in theaters
  NowPlaying {
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Search movies by title
  Search {
    #[arg(required = true)]
    query: Vec<String>,
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Movie details
  Movie { id: u64 },
  /// Manage favorites
  Favorites {
    #[command(subcommand)]
    action: Option<FavoritesAction>,
  },
  /// Show, toggle or set the view mode (simple|advanced)
  View { mode: Option<String> },
  /// Show, toggle or set the theme (light|dark)
  Theme { mode: Option<String> },
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
  /// List favorites
  List,
  /// Add or remove a movie by id
  Toggle { id: u64 },
  /// Remove all favorites
  Clear,
  /// List favorites in the given order
  Sort { mode: SortBy },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(base_url) = args.base_url.clone() {
    config.catalog.base_url = base_url;
  }
  if let Some(path) = args.storage.clone() {
    config.storage.path = Some(path);
  }

  let _log_guard = marquee::logging::init(&config.logging, args.verbose)?;

  let storage = open_storage(&config, args.memory);
  let client = CatalogClient::new(
    &config.catalog.base_url,
    Config::get_api_token(),
    config.catalog.timeout(),
  )
  .map_err(|e| eyre!("Failed to create catalog client: {}", e))?;
  if !client.has_token() {
    tracing::warn!("no API token set (MARQUEE_TMDB_TOKEN or TMDB_READ_TOKEN)");
  }
  let api = CatalogApi::new(client, config.cache.to_cache_config());

  let mut favorites = FavoritesStore::load(storage.clone(), config.favorites.default_sort);
  let mut view_mode = PreferenceStore::load(storage.clone(), config.preferences.default_view);
  let mut theme = PreferenceStore::load(storage, config.preferences.default_theme);
  let image_base_url = config.catalog.image_base_url.clone();

  let mut out = std::io::stdout();

  match args.command.unwrap_or(Commands::Browse) {
    Commands::Browse => {
      let mut app = App::new(api, favorites, view_mode, theme, image_base_url, out);
      app.run(EventHandler::stdin(Duration::from_millis(100))).await?;
    }
    Commands::Popular { pages } => {
      let ctx = context(&favorites, &view_mode, &image_base_url);
      show_list(&api, MovieList::Popular, pages, &ctx).await?
    }
    Commands::TopRated { pages } => {
      let ctx = context(&favorites, &view_mode, &image_base_url);
      show_list(&api, MovieList::TopRated, pages, &ctx).await?
    }
    Commands::Upcoming { pages } => {
      let ctx = context(&favorites, &view_mode, &image_base_url);
      show_list(&api, MovieList::Upcoming, pages, &ctx).await?
    }
    Commands::NowPlaying { pages } => {
      let ctx = context(&favorites, &view_mode, &image_base_url);
      show_list(&api, MovieList::NowPlaying, pages, &ctx).await?
    }
    Commands::Search { query, pages } => {
      let term = query.join(" ");
      if term.trim().is_empty() {
        return Err(eyre!("Search needs a title"));
      }
      let entry = api.fetch_search(&term, pages).await;
      let ctx = context(&favorites, &view_mode, &image_base_url);
      render::page(&mut out, &format!("Search \"{}\"", term), &entry, &mut Printed::default(), &ctx)?;
      fail_on_error(&entry)?;
    }
    Commands::Movie { id } => {
      let entry = api.fetch_details(id).await;
      let ctx = context(&favorites, &view_mode, &image_base_url);
      render::details(&mut out, id, &entry, &ctx)?;
      fail_on_error(&entry)?;
    }
    Commands::Favorites { action } => match action.unwrap_or(FavoritesAction::List) {
      FavoritesAction::List => {
        render::favorites(&mut out, &context(&favorites, &view_mode, &image_base_url))?;
      }
      FavoritesAction::Sort { mode } => {
        favorites.set_sort_by(mode);
        render::favorites(&mut out, &context(&favorites, &view_mode, &image_base_url))?;
      }
      FavoritesAction::Clear => {
        favorites.clear();
        writeln!(out, "Favorites cleared.")?;
      }
      FavoritesAction::Toggle { id } => {
        let movie = match favorites.get(id) {
          Some(movie) => movie.clone(),
          None => {
            let entry = api.fetch_details(id).await;
            fail_on_error(&entry)?;
            entry
              .data()
              .and_then(CatalogData::as_details)
              .map(marquee::catalog::Movie::from)
              .ok_or_else(|| eyre!("Movie {} not found", id))?
          }
        };
        let title = movie.title.clone();
        if favorites.toggle(movie) {
          writeln!(out, "♥ Added {} to favorites.", title)?;
        } else {
          writeln!(out, "Removed {} from favorites.", title)?;
        }
      }
    },
    Commands::View { mode } => {
      let mode = apply_toggle(&mut view_mode, mode.as_deref())?;
      writeln!(out, "View mode: {}", mode)?;
    }
    Commands::Theme { mode } => {
      let theme = apply_toggle(&mut theme, mode.as_deref())?;
      writeln!(out, "Theme: {}", theme)?;
    }
  }

  Ok(())
}

/// Open the configured SQLite store, degrading to memory when it is unusable.
fn open_storage(config: &Config, memory: bool) -> PersistentStore {
  if memory {
    return PersistentStore::in_memory();
  }

  let backend = match &config.storage.path {
    Some(path) => SqliteBackend::open(path),
    None => SqliteBackend::open_default(),
  };

  match backend {
    Ok(backend) => PersistentStore::new(backend),
    Err(e) => {
      tracing::warn!(error = %e, "storage unavailable; favorites will not persist this session");
      PersistentStore::in_memory()
    }
  }
}

fn context<'a>(
  favorites: &'a FavoritesStore,
  view_mode: &PreferenceStore<ViewMode>,
  image_base_url: &'a str,
) -> RenderContext<'a> {
  RenderContext {
    favorites,
    view_mode: view_mode.get(),
    image_base_url,
  }
}

async fn show_list(
  api: &CatalogApi,
  list: MovieList,
  pages: u32,
  ctx: &RenderContext<'_>,
) -> Result<()> {
  let entry = api.fetch_list(list, pages).await;
  render::page(&mut std::io::stdout(), list.title(), &entry, &mut Printed::default(), ctx)?;
  fail_on_error(&entry)
}

fn fail_on_error(entry: &marquee::cache::CacheEntry<CatalogData>) -> Result<()> {
  match entry.error().filter(|_| entry.is_error()) {
    Some(err) => Err(eyre!("{}", err)),
    None => Ok(()),
  }
}

/// `None` or "toggle" flips; anything else must parse as a value.
fn apply_toggle<T>(store: &mut PreferenceStore<T>, mode: Option<&str>) -> Result<T>
where
  T: Toggle + std::str::FromStr<Err = String>,
{
  match mode {
    None => Ok(store.get()),
    Some("toggle") => Ok(store.toggle()),
    Some(value) => {
      let value: T = value.parse().map_err(|e: String| eyre!(e))?;
      store.set(value);
      Ok(value)
    }
  }
}
