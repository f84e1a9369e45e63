use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};

use crate::aggregator::{Aggregator, ListState};
use crate::cache::{CacheStorage, NoopStorage, SqliteStorage};
use crate::commands::{self, Action};
use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityMonitor, ConnectivityStatus, ManualConnectivity};
use crate::db::Database;
use crate::detail::{DetailController, DetailState};
use crate::event::{Event, EventHandler};
use crate::pokeapi::{PokeApiClient, Pokemon, RemoteSource};
use crate::preferences::PreferenceStore;
use crate::render;
use crate::sync::{ResyncWorker, SyncState, Synchronizer};

/// Cached records older than this count as stale in `cache stats`
const STALE_AFTER_DAYS: i64 = 7;

/// What to do once everything is wired up
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
  /// Interactive browser
  Browse,
  Show(u32),
  Search(String),
  /// Print one list page (zero-based)
  List(u32),
  CacheStats,
  CacheClear,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
  /// Never touch the network
  pub offline: bool,
  /// Neither read nor write the record cache
  pub no_cache: bool,
}

pub async fn run(config: Config, options: Options, task: Task) -> Result<()> {
  let db = Database::open(config.cache.path.as_deref())?;

  match task {
    Task::CacheStats => return cache_stats(&SqliteStorage::new(db)),
    Task::CacheClear => {
      SqliteStorage::new(db).clear::<Pokemon>()?;
      println!("Cache cleared.");
      return Ok(());
    }
    _ => {}
  }

  let client = Arc::new(PokeApiClient::new(&config.api)?);

  if options.no_cache || !config.cache.enabled {
    info!("Record cache disabled");
    with_storage(config, options, db, client, Arc::new(NoopStorage), task).await
  } else {
    let storage = Arc::new(SqliteStorage::new(db.clone()));
    with_storage(config, options, db, client, storage, task).await
  }
}

async fn with_storage<S: CacheStorage>(
  config: Config,
  options: Options,
  db: Database,
  client: Arc<PokeApiClient>,
  storage: Arc<S>,
  task: Task,
) -> Result<()> {
  if options.offline {
    info!("Running offline");
    let connectivity = Arc::new(ManualConnectivity::new(ConnectivityStatus::Unavailable));
    let sync = Synchronizer::new(client, storage, connectivity);
    return execute(config, db, sync, task).await;
  }

  let monitor = ConnectivityMonitor::spawn(
    client.base_url(),
    Duration::from_secs(config.connectivity.probe_interval_secs),
    Duration::from_secs(config.connectivity.probe_timeout_secs),
  )?;
  let sync = Synchronizer::new(client, storage, Arc::new(monitor));
  execute(config, db, sync, task).await
}

async fn execute<R: RemoteSource, S: CacheStorage, C: Connectivity>(
  config: Config,
  db: Database,
  sync: Synchronizer<R, S, C>,
  task: Task,
) -> Result<()> {
  match task {
    Task::Browse => {
      let resync = ResyncWorker::spawn(sync.clone(), config.page_size);
      let preferences = Arc::new(PreferenceStore::open(db)?);
      let mut browser = Browser::new(sync, preferences, &config);
      let result = browser.run().await;
      resync.abort();
      result
    }
    Task::Show(id) => show(sync, id).await,
    Task::Search(name) => search(sync, &name).await,
    Task::List(page) => list(sync, page, config.page_size).await,
    Task::CacheStats | Task::CacheClear => Err(eyre!("Cache tasks run before wiring")),
  }
}

async fn show<R: RemoteSource, S: CacheStorage, C: Connectivity>(
  sync: Synchronizer<R, S, C>,
  id: u32,
) -> Result<()> {
  let mut detail = DetailController::new(sync);
  detail.load(id);
  detail.settle().await;

  for line in render::detail_state_lines(detail.state()) {
    println!("{}", line);
  }
  match detail.state() {
    DetailState::Error(message) => Err(eyre!("{}", message)),
    _ => Ok(()),
  }
}

/// Last meaningful emission of a one-shot stream. A remote value follows a
/// cached one, so the latest success wins.
fn settle_states<T>(states: Vec<SyncState<T>>) -> SyncState<T> {
  states
    .into_iter()
    .filter(|s| !s.is_loading())
    .last()
    .unwrap_or(SyncState::Empty)
}

async fn search<R: RemoteSource, S: CacheStorage, C: Connectivity>(
  sync: Synchronizer<R, S, C>,
  name: &str,
) -> Result<()> {
  match settle_states(sync.by_name(name).collect().await) {
    SyncState::Success { data, source } => {
      info!(?source, "Search hit");
      for line in render::detail_lines(&data) {
        println!("{}", line);
      }
      Ok(())
    }
    SyncState::Error(e) => Err(eyre!("{}", e)),
    SyncState::Empty | SyncState::Loading => Err(eyre!("No Pokémon named '{}'", name)),
  }
}

async fn list<R: RemoteSource, S: CacheStorage, C: Connectivity>(
  sync: Synchronizer<R, S, C>,
  page: u32,
  page_size: u32,
) -> Result<()> {
  let offset = page.saturating_mul(page_size);
  match settle_states(sync.list_page(offset, page_size).collect().await) {
    SyncState::Success { data, .. } => {
      for pokemon in &data {
        println!("{}", render::pokemon_row(pokemon));
      }
      Ok(())
    }
    SyncState::Error(e) => Err(eyre!("{}", e)),
    SyncState::Empty | SyncState::Loading => {
      println!("No Pokémon on page {}.", page);
      Ok(())
    }
  }
}

fn cache_stats<S: CacheStorage>(storage: &S) -> Result<()> {
  let entries = storage.list_all::<Pokemon>()?;
  let stale = storage.stale_before::<Pokemon>(Utc::now() - ChronoDuration::days(STALE_AFTER_DAYS))?;

  println!("Cached Pokémon: {}", storage.count::<Pokemon>()?);
  println!("Stale (> {} days): {}", STALE_AFTER_DAYS, stale.len());
  if let Some(oldest) = entries.iter().map(|e| e.fetched_at).min() {
    println!("Oldest entry:   {}", oldest.format("%Y-%m-%d %H:%M"));
  }
  if let Some(newest) = entries.iter().map(|e| e.fetched_at).max() {
    println!("Newest entry:   {}", newest.format("%Y-%m-%d %H:%M"));
  }
  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
  List,
  Detail,
}

/// Line-oriented interactive browser
struct Browser<R, S, C> {
  sync: Synchronizer<R, S, C>,
  aggregator: Aggregator<R, S, C>,
  detail: DetailController<R, S, C>,
  view: View,
  /// Last list state printed, to avoid reprinting identical output
  shown: Option<ListState>,
  should_quit: bool,
}

impl<R: RemoteSource, S: CacheStorage, C: Connectivity> Browser<R, S, C> {
  fn new(sync: Synchronizer<R, S, C>, preferences: Arc<PreferenceStore>, config: &Config) -> Self {
    Self {
      aggregator: Aggregator::new(
        sync.clone(),
        preferences,
        config.page_size,
        config.load_more_threshold,
      ),
      detail: DetailController::new(sync.clone()),
      sync,
      view: View::List,
      shown: None,
      should_quit: false,
    }
  }

  async fn run(&mut self) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(100));
    events.read_stdin();
    events.watch_connectivity(self.sync.connectivity().subscribe());

    println!("Pokédex. Type 'help' for commands, Enter for more.");
    if !self.sync.is_online() {
      println!("(offline: showing cached data)");
    }
    self.aggregator.start();

    while !self.should_quit {
      match events.next().await {
        Some(Event::Line(line)) => self.handle_line(&line)?,
        Some(Event::Tick) => self.refresh(),
        Some(Event::Connectivity(status)) => {
          if status.is_available() {
            println!("(back online)");
          } else {
            println!("(offline: showing cached data)");
          }
        }
        Some(Event::Eof) | None => break,
      }
    }

    Ok(())
  }

  /// Print whatever changed since the last tick
  fn refresh(&mut self) {
    let list_changed = self.aggregator.poll();
    let detail_changed = self.detail.poll();

    match self.view {
      View::List if list_changed => self.print_list(),
      View::Detail if detail_changed => self.print_detail(),
      _ => {}
    }
  }

  fn print_list(&mut self) {
    let state = self.aggregator.state();
    if self.shown.as_ref() == Some(state) {
      return;
    }
    for line in render::list_lines(state) {
      println!("{}", line);
    }
    self.shown = Some(state.clone());
  }

  fn print_detail(&self) {
    for line in render::detail_state_lines(self.detail.state()) {
      println!("{}", line);
    }
  }

  fn handle_line(&mut self, line: &str) -> Result<()> {
    // A bare Enter means the reader reached the bottom of the list
    if line.trim().is_empty() {
      if self.view == View::List {
        let last = self.aggregator.state().items().len().saturating_sub(1);
        if !self.aggregator.on_scroll(last) {
          println!("Nothing more to load right now.");
        }
      }
      return Ok(());
    }

    let action = match commands::parse(line) {
      Ok(action) => action,
      Err(e) => {
        println!("Error: {}", e);
        return Ok(());
      }
    };

    match action {
      Action::More => {
        self.view = View::List;
        if !self.aggregator.load_more() {
          println!("Cannot load more right now.");
        }
      }
      Action::Search(query) => {
        self.view = View::List;
        self.aggregator.search(&query);
      }
      Action::Clear => {
        self.view = View::List;
        self.aggregator.clear_search();
        self.shown = None;
        self.print_list();
      }
      Action::Sort(preference) => {
        self.view = View::List;
        if let Err(e) = self.aggregator.set_sort(preference) {
          warn!(error = %e, "Failed to save sort preference");
          println!("Error: {}", e);
        }
        println!("Sorted by {}", self.aggregator.sort());
        self.print_list();
      }
      Action::Show(id) => {
        self.view = View::Detail;
        self.detail.load(id);
      }
      Action::Retry => match self.view {
        View::List => {
          self.shown = None;
          self.aggregator.retry();
          self.print_list();
        }
        View::Detail => self.detail.retry(),
      },
      Action::Status => self.print_status(),
      Action::Help => {
        for line in render::help_lines() {
          println!("{}", line);
        }
      }
      Action::Quit => self.should_quit = true,
    }

    Ok(())
  }

  fn print_status(&self) {
    let status = if self.sync.is_online() {
      "online"
    } else {
      "offline"
    };
    let cached = match self.sync.storage().count::<Pokemon>() {
      Ok(count) => count.to_string(),
      Err(e) => format!("unknown ({})", e),
    };

    println!("Connectivity: {}", status);
    println!("Cached:       {}", cached);
    println!("Loaded:       {}", self.aggregator.accumulated().len());
    println!("Next offset:  {}", self.aggregator.cursor());
    println!("Sort:         {}", self.aggregator.sort());
    if let Some(query) = self.aggregator.search_query() {
      println!("Search:       {}", query);
    }
    if self.aggregator.is_busy() {
      println!("(loading)");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::testing::fixture;
  use crate::sync::{DataSource, SyncError};

  #[test]
  fn test_settle_states_prefers_latest() {
    let states = vec![
      SyncState::Loading,
      SyncState::Success {
        data: 1,
        source: DataSource::Cache,
      },
      SyncState::Success {
        data: 2,
        source: DataSource::Remote,
      },
    ];
    assert!(matches!(settle_states(states), SyncState::Success { data: 2, .. }));
  }

  #[test]
  fn test_settle_states_error_and_nothing() {
    let states: Vec<SyncState<u32>> = vec![
      SyncState::Loading,
      SyncState::Error(SyncError::NoConnectivityNoCache),
    ];
    assert!(matches!(settle_states(states), SyncState::Error(_)));
    assert!(matches!(settle_states::<u32>(Vec::new()), SyncState::Empty));
  }

  #[tokio::test]
  async fn test_show_missing_is_error() {
    let (sync, _, _) = fixture(1..=3, true);
    assert!(show(sync, 42).await.is_err());
  }

  #[tokio::test]
  async fn test_search_and_list_one_shots() {
    let (sync, _, _) = fixture(1..=30, true);
    assert!(search(sync.clone(), "P12").await.is_ok());
    assert!(list(sync.clone(), 1, 20).await.is_ok());
    assert!(search(sync, "nobody").await.is_err());
  }

  #[test]
  fn test_cache_stats_over_empty_cache() {
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    assert!(cache_stats(&storage).is_ok());
  }

  #[tokio::test]
  async fn test_browser_commands_drive_aggregator() {
    let (sync, _, _) = fixture(1..=40, true);
    let preferences =
      Arc::new(PreferenceStore::open(Database::open_in_memory().unwrap()).unwrap());
    let mut browser = Browser::new(sync, preferences, &Config::default());

    browser.aggregator.start();
    browser.aggregator.settle().await;
    assert_eq!(browser.aggregator.accumulated().len(), 20);

    browser.handle_line("").unwrap();
    browser.aggregator.settle().await;
    assert_eq!(browser.aggregator.accumulated().len(), 40);

    browser.handle_line("sort name desc").unwrap();
    assert_eq!(browser.aggregator.state().items()[0].name, "p9");

    browser.handle_line("show 5").unwrap();
    assert_eq!(browser.view, View::Detail);
    browser.detail.settle().await;
    assert!(matches!(browser.detail.state(), DetailState::Success(p) if p.id == 5));

    browser.handle_line("quit").unwrap();
    assert!(browser.should_quit);
  }
}
