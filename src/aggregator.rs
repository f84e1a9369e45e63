//! Paginated, sortable, searchable Pokémon list for one browsing session.
//!
//! The [`Aggregator`] owns the accumulated records and the page cursor. What
//! it shows is always the accumulated list sorted by the current preference,
//! or the single search hit while a search is active.
//!
//! Synchronizer operations run in spawned tasks and report back over one
//! channel. Every operation gets a fresh sequence token and emissions tagged
//! with an older token are dropped, so a slow superseded response can never
//! overwrite a newer one.

use std::collections::HashSet;
use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::cache::CacheStorage;
use crate::connectivity::Connectivity;
use crate::pokeapi::{Pokemon, RemoteSource};
use crate::preferences::{PreferenceStore, SortField, SortPreference};
use crate::sync::{DataSource, SyncState, Synchronizer};

/// What the list screen should show
#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
  Loading,
  Empty,
  Error(String),
  Success {
    items: Vec<Pokemon>,
    is_search_result: bool,
    /// Set when loading another page failed; the items are still valid
    error_message: Option<String>,
  },
  LoadingMore(Vec<Pokemon>),
}

impl ListState {
  pub fn items(&self) -> &[Pokemon] {
    match self {
      ListState::Success { items, .. } | ListState::LoadingMore(items) => items,
      _ => &[],
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
  Initial,
  LoadMore,
  Search,
}

enum Payload {
  Page(SyncState<Vec<Pokemon>>),
  Single(SyncState<Pokemon>),
}

enum Message {
  State { token: u64, payload: Payload },
  Finished { token: u64 },
}

struct InFlight {
  token: u64,
  op: Operation,
  /// The accumulated list before a load-more began. Each page emission is
  /// applied on top of this, so a remote page replaces the cached one.
  base: Vec<Pokemon>,
  cursor_advanced: bool,
}

struct Search {
  query: String,
  hit: Option<Pokemon>,
}

pub struct Aggregator<R, S, C> {
  sync: Synchronizer<R, S, C>,
  preferences: Arc<PreferenceStore>,
  preference_rx: watch::Receiver<SortPreference>,
  sort: SortPreference,
  page_size: u32,
  load_more_threshold: usize,
  accumulated: Vec<Pokemon>,
  cursor: u32,
  search: Option<Search>,
  state: ListState,
  token: u64,
  in_flight: Option<InFlight>,
  tx: mpsc::UnboundedSender<Message>,
  rx: mpsc::UnboundedReceiver<Message>,
}

impl<R: RemoteSource, S: CacheStorage, C: Connectivity> Aggregator<R, S, C> {
  pub fn new(
    sync: Synchronizer<R, S, C>,
    preferences: Arc<PreferenceStore>,
    page_size: u32,
    load_more_threshold: usize,
  ) -> Self {
    let preference_rx = preferences.subscribe();
    let sort = preferences.current();
    let (tx, rx) = mpsc::unbounded_channel();

    Self {
      sync,
      preferences,
      preference_rx,
      sort,
      page_size,
      load_more_threshold,
      accumulated: Vec::new(),
      cursor: 0,
      search: None,
      state: ListState::Loading,
      token: 0,
      in_flight: None,
      tx,
      rx,
    }
  }

  pub fn state(&self) -> &ListState {
    &self.state
  }

  pub fn accumulated(&self) -> &[Pokemon] {
    &self.accumulated
  }

  pub fn cursor(&self) -> u32 {
    self.cursor
  }

  pub fn sort(&self) -> SortPreference {
    self.sort
  }

  pub fn search_query(&self) -> Option<&str> {
    self.search.as_ref().map(|s| s.query.as_str())
  }

  /// Whether an operation is still delivering emissions
  pub fn is_busy(&self) -> bool {
    self.in_flight.is_some()
  }

  /// The accumulated records in the current sort order
  pub fn projection(&self) -> Vec<Pokemon> {
    let mut items = self.accumulated.clone();
    sort_records(&mut items, self.sort);
    items
  }

  /// Load the first page. Any active search is dropped.
  pub fn start(&mut self) {
    self.search = None;
    self.state = ListState::Loading;
    let token = self.begin(Operation::Initial);
    self.spawn_page(token, 0);
  }

  /// Request the page at the cursor. Returns false when no request was made,
  /// e.g. while a search is showing or another request is running.
  pub fn load_more(&mut self) -> bool {
    if matches!(self.state, ListState::LoadingMore(_)) || self.in_flight.is_some() {
      debug!("Load more ignored; a request is already running");
      return false;
    }
    if !matches!(
      self.state,
      ListState::Success {
        is_search_result: false,
        ..
      }
    ) {
      return false;
    }
    if !self.sync.is_online() {
      debug!("Load more ignored while offline");
      return false;
    }

    self.state = ListState::LoadingMore(self.projection());
    // Nothing beyond a partial cached window has been loaded yet, so the
    // first page is still owed
    let op = if self.cursor == 0 {
      Operation::Initial
    } else {
      Operation::LoadMore
    };
    let token = self.begin(op);
    self.spawn_page(token, self.cursor);
    true
  }

  /// Consumer reports the index of the last visible row.
  pub fn on_scroll(&mut self, position: usize) -> bool {
    let len = self.state.items().len();
    if len > 0 && position + self.load_more_threshold >= len {
      self.load_more()
    } else {
      false
    }
  }

  /// Look a single Pokémon up by name, bypassing pagination.
  pub fn search(&mut self, query: &str) {
    let query = query.trim();
    if query.is_empty() {
      self.clear_search();
      return;
    }

    self.search = Some(Search {
      query: query.to_string(),
      hit: None,
    });
    self.state = ListState::Loading;
    let token = self.begin(Operation::Search);
    self.spawn_search(token, query.to_string());
  }

  /// Drop the search and show the accumulated list again, without fetching.
  pub fn clear_search(&mut self) {
    self.search = None;
    if matches!(
      self.in_flight,
      Some(InFlight {
        op: Operation::Search,
        ..
      })
    ) {
      // Whatever the lookup still emits is stale from here on
      self.token += 1;
      self.in_flight = None;
    }
    self.show_projection(None);
  }

  /// Persist a new sort order and re-sort what is shown. No I/O besides the
  /// preference write.
  pub fn set_sort(&mut self, preference: SortPreference) -> Result<()> {
    self.preferences.save(preference)?;
    self.preference_rx.mark_unchanged();
    self.apply_sort(preference);
    Ok(())
  }

  pub fn retry(&mut self) {
    if self.accumulated.is_empty() || self.cursor == 0 {
      self.start();
    } else {
      self.show_projection(None);
    }
  }

  /// Apply everything that arrived since the last call. Returns whether the
  /// visible state may have changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = self.observe_preferences();
    while let Ok(message) = self.rx.try_recv() {
      changed |= self.apply(message);
    }
    changed
  }

  /// Wait until the current operation has delivered all of its emissions.
  pub async fn settle(&mut self) {
    while self.in_flight.is_some() {
      match self.rx.recv().await {
        Some(message) => {
          self.apply(message);
        }
        None => break,
      }
    }
    self.poll();
  }

  fn begin(&mut self, op: Operation) -> u64 {
    self.token += 1;
    let base = match op {
      Operation::LoadMore => self.accumulated.clone(),
      Operation::Initial | Operation::Search => Vec::new(),
    };
    self.in_flight = Some(InFlight {
      token: self.token,
      op,
      base,
      cursor_advanced: false,
    });
    self.token
  }

  fn spawn_page(&self, token: u64, offset: u32) {
    let sync = self.sync.clone();
    let tx = self.tx.clone();
    let limit = self.page_size;

    tokio::spawn(async move {
      let emit_tx = tx.clone();
      sync
        .run_list_page(offset, limit, move |state| {
          let _ = emit_tx.send(Message::State {
            token,
            payload: Payload::Page(state),
          });
        })
        .await;
      let _ = tx.send(Message::Finished { token });
    });
  }

  fn spawn_search(&self, token: u64, query: String) {
    let sync = self.sync.clone();
    let tx = self.tx.clone();

    tokio::spawn(async move {
      let emit_tx = tx.clone();
      sync
        .run_by_name(&query, move |state| {
          let _ = emit_tx.send(Message::State {
            token,
            payload: Payload::Single(state),
          });
        })
        .await;
      let _ = tx.send(Message::Finished { token });
    });
  }

  fn observe_preferences(&mut self) -> bool {
    if !self.preference_rx.has_changed().unwrap_or(false) {
      return false;
    }
    let preference = *self.preference_rx.borrow_and_update();
    if preference == self.sort {
      return false;
    }
    self.apply_sort(preference);
    true
  }

  fn apply_sort(&mut self, preference: SortPreference) {
    self.sort = preference;
    let projection = self.projection();
    match &mut self.state {
      ListState::Success {
        items,
        is_search_result: false,
        ..
      } => *items = projection,
      ListState::LoadingMore(items) => *items = projection,
      _ => {}
    }
  }

  /// The search hit if a search is showing one, else the sorted list.
  fn show_projection(&mut self, error_message: Option<String>) {
    if let Some(hit) = self.search.as_ref().and_then(|s| s.hit.clone()) {
      self.state = ListState::Success {
        items: vec![hit],
        is_search_result: true,
        error_message: None,
      };
      return;
    }

    self.state = if self.accumulated.is_empty() {
      ListState::Empty
    } else {
      ListState::Success {
        items: self.projection(),
        is_search_result: false,
        error_message,
      }
    };
  }

  fn apply(&mut self, message: Message) -> bool {
    match message {
      Message::Finished { token } => {
        if token != self.token {
          return false;
        }
        if self.in_flight.take().is_none() {
          return false;
        }
        if matches!(self.state, ListState::LoadingMore(_)) {
          self.show_projection(None);
          return true;
        }
        false
      }
      Message::State { token, payload } => {
        if token != self.token {
          debug!(token, current = self.token, "Discarding stale emission");
          return false;
        }
        let Some(op) = self
          .in_flight
          .as_ref()
          .filter(|f| f.token == token)
          .map(|f| f.op)
        else {
          return false;
        };
        match (op, payload) {
          (Operation::Initial, Payload::Page(state)) => self.apply_initial(state),
          (Operation::LoadMore, Payload::Page(state)) => self.apply_load_more(state),
          (Operation::Search, Payload::Single(state)) => self.apply_search(state),
          _ => return false,
        }
        true
      }
    }
  }

  fn apply_initial(&mut self, state: SyncState<Vec<Pokemon>>) {
    match state {
      SyncState::Loading => {
        if self.accumulated.is_empty() {
          self.state = ListState::Loading;
        }
      }
      SyncState::Success { data, source } => {
        debug!(?source, count = data.len(), "Initial page");
        // A later emission replaces an earlier one wholesale
        self.accumulated = append_new(Vec::new(), data);
        // A short cached window is not the first page, only whatever the
        // cache happens to hold
        let full_page = self.accumulated.len() >= self.page_size as usize;
        self.cursor = if source == DataSource::Remote || full_page {
          self.page_size
        } else {
          0
        };
        self.show_projection(None);
      }
      SyncState::Error(e) if !self.accumulated.is_empty() => {
        self.show_projection(Some(format!("Failed to load more: {}", e)));
      }
      SyncState::Error(e) => self.state = ListState::Error(e.to_string()),
      SyncState::Empty if !self.accumulated.is_empty() => self.show_projection(None),
      SyncState::Empty => {
        self.accumulated.clear();
        self.state = ListState::Empty;
      }
    }
  }

  fn apply_load_more(&mut self, state: SyncState<Vec<Pokemon>>) {
    match state {
      SyncState::Loading => {}
      SyncState::Success { data, source } => {
        debug!(?source, count = data.len(), cursor = self.cursor, "Next page");
        let Some(flight) = self.in_flight.as_mut() else {
          return;
        };
        self.accumulated = append_new(flight.base.clone(), data);
        if !flight.cursor_advanced {
          flight.cursor_advanced = true;
          self.cursor += self.page_size;
        }
        self.show_projection(None);
      }
      SyncState::Error(e) => {
        self.show_projection(Some(format!("Failed to load more: {}", e)));
      }
      // End of the list; nothing to add and the cursor stays put
      SyncState::Empty => self.show_projection(None),
    }
  }

  fn apply_search(&mut self, state: SyncState<Pokemon>) {
    match state {
      SyncState::Loading => self.state = ListState::Loading,
      SyncState::Success { data, .. } => {
        if let Some(search) = self.search.as_mut() {
          search.hit = Some(data.clone());
        }
        self.state = ListState::Success {
          items: vec![data],
          is_search_result: true,
          error_message: None,
        };
      }
      SyncState::Error(e) if e.is_not_found() => self.state = ListState::Empty,
      SyncState::Error(e) => self.state = ListState::Error(e.to_string()),
      SyncState::Empty => self.state = ListState::Empty,
    }
  }

}

/// Append the records whose id is not in `list` yet. Records already
/// present keep their current values.
fn append_new(mut list: Vec<Pokemon>, records: Vec<Pokemon>) -> Vec<Pokemon> {
  let mut seen: HashSet<u32> = list.iter().map(|p| p.id).collect();
  list.extend(records.into_iter().filter(|p| seen.insert(p.id)));
  list
}

/// Stable sort, so records with equal keys keep their relative order in
/// either direction.
pub fn sort_records(records: &mut [Pokemon], preference: SortPreference) {
  records.sort_by(|a, b| {
    let ordering = match preference.field {
      SortField::Id => a.id.cmp(&b.id),
      SortField::Name => a.name.cmp(&b.name),
    };
    if preference.ascending {
      ordering
    } else {
      ordering.reverse()
    }
  });
}
