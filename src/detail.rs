//! Single Pokémon view.

use tracing::debug;

use crate::cache::CacheStorage;
use crate::connectivity::Connectivity;
use crate::pokeapi::{Pokemon, RemoteSource};
use crate::sync::{SyncState, SyncStream, Synchronizer};

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
  Loading,
  Success(Pokemon),
  Error(String),
}

/// Follows one `by_id` stream at a time. Loading another id drops the old
/// stream, so its late emissions never show up.
pub struct DetailController<R, S, C> {
  sync: Synchronizer<R, S, C>,
  id: Option<u32>,
  state: DetailState,
  stream: Option<SyncStream<Pokemon>>,
}

impl<R: RemoteSource, S: CacheStorage, C: Connectivity> DetailController<R, S, C> {
  pub fn new(sync: Synchronizer<R, S, C>) -> Self {
    Self {
      sync,
      id: None,
      state: DetailState::Loading,
      stream: None,
    }
  }

  pub fn state(&self) -> &DetailState {
    &self.state
  }

  pub fn load(&mut self, id: u32) {
    debug!(id, "Loading detail");
    self.id = Some(id);
    self.state = DetailState::Loading;
    self.stream = Some(self.sync.by_id(id));
  }

  pub fn retry(&mut self) {
    if let Some(id) = self.id {
      self.load(id);
    }
  }

  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Some(state) = self.stream.as_mut().and_then(SyncStream::try_next) {
      self.apply(state);
      changed = true;
    }
    changed
  }

  /// Wait for the current load to finish.
  pub async fn settle(&mut self) {
    if let Some(mut stream) = self.stream.take() {
      while let Some(state) = stream.next().await {
        self.apply(state);
      }
    }
  }

  fn apply(&mut self, state: SyncState<Pokemon>) {
    self.state = match state {
      SyncState::Loading => DetailState::Loading,
      SyncState::Success { data, .. } => DetailState::Success(data),
      SyncState::Error(e) => DetailState::Error(e.to_string()),
      SyncState::Empty => DetailState::Error("Pokémon not found".to_string()),
    };
  }
}
