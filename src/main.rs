mod aggregator;
mod app;
mod cache;
mod commands;
mod config;
mod connectivity;
mod db;
mod detail;
mod event;
mod logging;
mod pokeapi;
mod preferences;
mod render;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "A terminal Pokédex backed by PokéAPI, usable offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pokedex/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Serve only cached data, never touch the network
  #[arg(long)]
  offline: bool,

  /// Do not read or write the local record cache
  #[arg(long)]
  no_cache: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Browse the Pokédex interactively (default)
  Browse,
  /// Show one Pokémon by number
  Show { id: u32 },
  /// Look up one Pokémon by name
  Search { name: String },
  /// Print one page of the list
  List {
    /// Zero-based page number
    #[arg(short, long, default_value_t = 0)]
    page: u32,
  },
  /// Inspect or reset the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Entry counts and ages
  Stats,
  /// Delete every cached record
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let _log_guard = logging::init(config.log_level.as_deref())?;
  info!(api = %config.api.base_url, "Starting pokedex");

  let task = match args.command.unwrap_or(Commands::Browse) {
    Commands::Browse => app::Task::Browse,
    Commands::Show { id } => app::Task::Show(id),
    Commands::Search { name } => app::Task::Search(name),
    Commands::List { page } => app::Task::List(page),
    Commands::Cache { action } => match action {
      CacheAction::Stats => app::Task::CacheStats,
      CacheAction::Clear => app::Task::CacheClear,
    },
  };

  let options = app::Options {
    offline: args.offline,
    no_cache: args.no_cache,
  };

  app::run(config, options, task).await
}
