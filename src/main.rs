use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use reel::cache::{CacheLayer, CacheResult, CacheSource, SqliteStorage};
use reel::config::Config;
use reel::logging;
use reel::query::{Query, QueryState};
use reel::tmdb::{Catalog, Category, Movie, MovieDetail, Repository, TmdbClient};

#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(about = "Offline-first movie catalogue backed by TMDb")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./reel.yaml or $XDG_CONFIG_HOME/reel/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep the cache in memory for this run only
  #[arg(long)]
  no_persist: bool,

  /// Mirror log output to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Popular movies
  Popular {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
  },
  /// Top rated movies
  TopRated {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
  },
  /// Upcoming releases
  Upcoming {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
  },
  /// Search movies by title (never cached)
  Search {
    text: String,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
  },
  /// Show details for one movie
  Detail { id: u64 },
  /// Refresh the first page of every curated list
  Warm,
  /// Remove cached data past the retention window
  Purge {
    /// Remove everything instead
    #[arg(long)]
    all: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let _log_guard = logging::init(&logging::default_log_dir()?, args.verbose)?;

  let storage = if args.no_persist {
    SqliteStorage::open_in_memory()?
  } else {
    SqliteStorage::open(&config.cache.db_path()?)?
  };
  let cache = CacheLayer::new(storage)
    .with_ttl(config.cache.ttl())
    .with_retention(config.cache.retention());

  // Maintenance needs no API key
  if let Command::Purge { all } = args.command {
    return purge(&cache, all);
  }

  let client = TmdbClient::new(&config)?;
  let repo = Repository::new(Arc::new(client), cache, config.retry.policy());
  let catalog = Catalog::new(repo);

  match args.command {
    Command::Popular { page } => print_movies(catalog.query_popular(page)).await,
    Command::TopRated { page } => print_movies(catalog.query_top_rated(page)).await,
    Command::Upcoming { page } => print_movies(catalog.query_upcoming(page)).await,
    Command::Search { text, page } => print_movies(catalog.query_search(&text, page)).await,
    Command::Detail { id } => print_detail(catalog.query_detail(id)).await,
    Command::Warm => {
      let mut queries: Vec<_> = Category::ALL
        .iter()
        .map(|&category| catalog.query_list(category, 1))
        .collect();

      let states = join_all(queries.iter_mut().map(|query| query.settle())).await;

      let mut failed = 0;
      for (category, state) in Category::ALL.iter().zip(states) {
        match state {
          QueryState::Success(result) => {
            println!("{:<10} {:>3} movies ({})", category, result.data.len(), describe(result));
          }
          QueryState::Error(e) => {
            failed += 1;
            println!("{:<10} failed: {}", category, e);
          }
          _ => {}
        }
      }

      if failed > 0 {
        return Err(eyre!("Failed to refresh {} of {} lists", failed, Category::ALL.len()));
      }
      Ok(())
    }
    Command::Purge { .. } => Ok(()),
  }
}

fn purge(cache: &CacheLayer<SqliteStorage>, all: bool) -> Result<()> {
  if all {
    cache.clear()?;
    info!("cache cleared");
    println!("Cache cleared");
  } else {
    let removed = cache.purge_expired()?;
    println!("Removed {} expired entries", removed);
  }
  Ok(())
}

async fn print_movies(mut query: Query<CacheResult<Vec<Movie>>>) -> Result<()> {
  match query.settle().await {
    QueryState::Success(result) => {
      print_source_notice(result);
      if result.data.is_empty() {
        println!("No movies found");
      }
      for movie in &result.data {
        println!(
          "{:>8}  {:<40}  {:<10}  {:.1} ({} votes)",
          movie.id, movie.title, movie.release_date, movie.vote_average, movie.vote_count
        );
      }
      Ok(())
    }
    QueryState::Error(e) => Err(eyre!("Failed to load movies: {}", e)),
    _ => Err(eyre!("Query did not complete")),
  }
}

async fn print_detail(mut query: Query<CacheResult<MovieDetail>>) -> Result<()> {
  match query.settle().await {
    QueryState::Success(result) => {
      print_source_notice(result);
      let movie = &result.data;
      println!("{} ({})", movie.title, movie.release_date);
      if let Some(tagline) = &movie.tagline {
        println!("{}", tagline);
      }
      println!();
      println!("Rating:   {:.1} ({} votes)", movie.vote_average, movie.vote_count);
      if let Some(runtime) = movie.runtime {
        println!("Runtime:  {} min", runtime);
      }
      if !movie.genres.is_empty() {
        println!("Genres:   {}", movie.genres.join(", "));
      }
      if !movie.poster_url.is_empty() {
        println!("Poster:   {}", movie.poster_url);
      }
      if !movie.backdrop_url.is_empty() {
        println!("Backdrop: {}", movie.backdrop_url);
      }
      if !movie.overview.is_empty() {
        println!();
        println!("{}", movie.overview);
      }
      Ok(())
    }
    QueryState::Error(e) => Err(eyre!("Failed to load movie: {}", e)),
    _ => Err(eyre!("Query did not complete")),
  }
}

fn print_source_notice<T>(result: &CacheResult<T>) {
  if result.is_offline() {
    eprintln!("Offline: {}", describe(result));
  }
}

fn describe<T>(result: &CacheResult<T>) -> String {
  match (result.source, result.cached_at) {
    (CacheSource::Network, _) => "fresh from network".to_string(),
    (CacheSource::CacheFresh, Some(at)) => format!("cached at {}", at.format("%Y-%m-%d %H:%M UTC")),
    (CacheSource::Offline, Some(at)) => {
      format!("showing data cached at {}", at.format("%Y-%m-%d %H:%M UTC"))
    }
    (_, None) => "cached".to_string(),
  }
}
