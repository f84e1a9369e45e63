//! Cache-first synchronization of Pokémon records.

use std::future::Future;
use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStorage};
use crate::connectivity::Connectivity;
use crate::pokeapi::{FetchError, Pokemon, RemoteSource};

use super::state::{DataSource, SyncError, SyncState};

/// Ordered emissions of one synchronizer operation.
///
/// Dropping the stream discards whatever the operation emits afterwards.
pub struct SyncStream<T> {
  rx: mpsc::UnboundedReceiver<SyncState<T>>,
}

impl<T> SyncStream<T> {
  /// Next emission, or `None` once the operation has finished
  pub async fn next(&mut self) -> Option<SyncState<T>> {
    self.rx.recv().await
  }

  /// Next emission if one is already queued
  pub fn try_next(&mut self) -> Option<SyncState<T>> {
    self.rx.try_recv().ok()
  }

  /// Wait for the operation to finish and return everything it emitted
  pub async fn collect(mut self) -> Vec<SyncState<T>> {
    let mut states = Vec::new();
    while let Some(state) = self.next().await {
      states.push(state);
    }
    states
  }
}

/// Merges the local cache, connectivity and the remote source.
///
/// Every operation emits `Loading`, then the cached value if there is one,
/// then the remote value if the network is reachable and the fetch succeeds.
/// An error is emitted only when nothing was served from cache. Successful
/// remote results are written back to the cache before they are emitted.
pub struct Synchronizer<R, S, C> {
  remote: Arc<R>,
  storage: Arc<S>,
  connectivity: Arc<C>,
}

impl<R, S, C> Clone for Synchronizer<R, S, C> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      storage: Arc::clone(&self.storage),
      connectivity: Arc::clone(&self.connectivity),
    }
  }
}

impl<R: RemoteSource, S: CacheStorage, C: Connectivity> Synchronizer<R, S, C> {
  pub fn new(remote: Arc<R>, storage: Arc<S>, connectivity: Arc<C>) -> Self {
    Self {
      remote,
      storage,
      connectivity,
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  pub fn connectivity(&self) -> &C {
    &self.connectivity
  }

  pub fn is_online(&self) -> bool {
    self.connectivity.status().is_available()
  }

  /// One list page in the background
  pub fn list_page(&self, offset: u32, limit: u32) -> SyncStream<Vec<Pokemon>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let sync = self.clone();
    tokio::spawn(async move {
      sync
        .run_list_page(offset, limit, move |state| {
          let _ = tx.send(state);
        })
        .await;
    });
    SyncStream { rx }
  }

  /// A single record by id in the background
  pub fn by_id(&self, id: u32) -> SyncStream<Pokemon> {
    let (tx, rx) = mpsc::unbounded_channel();
    let sync = self.clone();
    tokio::spawn(async move {
      sync
        .run_by_id(id, move |state| {
          let _ = tx.send(state);
        })
        .await;
    });
    SyncStream { rx }
  }

  /// A single record by name in the background
  pub fn by_name(&self, name: &str) -> SyncStream<Pokemon> {
    let (tx, rx) = mpsc::unbounded_channel();
    let sync = self.clone();
    let name = name.to_string();
    tokio::spawn(async move {
      sync
        .run_by_name(&name, move |state| {
          let _ = tx.send(state);
        })
        .await;
    });
    SyncStream { rx }
  }

  /// List page at `offset`. The cached value is the id-ordered cache window
  /// of the same size.
  pub async fn run_list_page(
    &self,
    offset: u32,
    limit: u32,
    mut emit: impl FnMut(SyncState<Vec<Pokemon>>) + Send,
  ) {
    emit(SyncState::Loading);

    let cached = self
      .read_cache("page", |s| s.list_range::<Pokemon>(offset, limit))
      .map(|entries| {
        entries
          .into_iter()
          .map(CacheEntry::into_entity)
          .collect::<Vec<_>>()
      })
      .filter(|page| !page.is_empty());

    self
      .resolve(
        "page",
        cached,
        || self.remote.fetch_page(limit, offset),
        |s, page| s.upsert_many(page),
        |page| page.is_empty(),
        &mut emit,
      )
      .await;
  }

  pub async fn run_by_id(&self, id: u32, mut emit: impl FnMut(SyncState<Pokemon>) + Send) {
    emit(SyncState::Loading);

    let cached = self
      .read_cache("by_id", |s| s.get::<Pokemon>(i64::from(id)))
      .flatten()
      .map(CacheEntry::into_entity);

    self
      .resolve(
        "by_id",
        cached,
        || self.remote.fetch_by_id(id),
        |s, pokemon| s.upsert(pokemon),
        |_| false,
        &mut emit,
      )
      .await;
  }

  /// Name lookups are lower-cased before both the cache query and the
  /// remote call, so "Pikachu" and "pikachu" share a cache key.
  pub async fn run_by_name(&self, name: &str, mut emit: impl FnMut(SyncState<Pokemon>) + Send) {
    emit(SyncState::Loading);

    let key = name.trim().to_lowercase();
    if key.is_empty() {
      emit(SyncState::Error(SyncError::NotFound));
      return;
    }

    let cached = self
      .read_cache("by_name", |s| s.get_by_name::<Pokemon>(&key))
      .flatten()
      .map(CacheEntry::into_entity);

    self
      .resolve(
        "by_name",
        cached,
        || self.remote.fetch_by_name(&key),
        |s, pokemon| s.upsert(pokemon),
        |_| false,
        &mut emit,
      )
      .await;
  }

  /// Re-fetch every page the cache currently covers and upsert the results.
  ///
  /// Returns how many records were refreshed. Stops at the first failed page.
  pub async fn refresh_cached(&self, page_size: u32) -> Result<usize, SyncError> {
    if !self.is_online() {
      debug!("Skipping refresh while offline");
      return Ok(0);
    }

    let count = self
      .read_cache("count", |s| s.count::<Pokemon>())
      .unwrap_or(0);
    let pages = count.div_ceil(u64::from(page_size.max(1)));

    let mut refreshed = 0;
    for page in 0..pages {
      let offset = u32::try_from(page * u64::from(page_size)).unwrap_or(u32::MAX);
      let records = self.remote.fetch_page(page_size, offset).await?;
      if records.is_empty() {
        break;
      }
      self
        .storage
        .upsert_many(&records)
        .map_err(|e| SyncError::Unknown(e.to_string()))?;
      refreshed += records.len();
    }

    Ok(refreshed)
  }

  /// Cache reads never fail from the caller's point of view.
  fn read_cache<T>(&self, label: &str, read: impl FnOnce(&S) -> Result<T>) -> Option<T> {
    match read(self.storage.as_ref()) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(label, error = %e, "Cache read failed; treating as a miss");
        None
      }
    }
  }

  async fn resolve<T, F, Fut>(
    &self,
    label: &str,
    cached: Option<T>,
    fetch: F,
    persist: impl FnOnce(&S, &T) -> Result<()>,
    is_empty: impl Fn(&T) -> bool,
    emit: &mut (impl FnMut(SyncState<T>) + Send),
  ) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
  {
    let has_cache = cached.is_some();
    if let Some(data) = cached {
      debug!(label, "Serving cached value");
      emit(SyncState::Success {
        data,
        source: DataSource::Cache,
      });
    }

    if !self.is_online() {
      if has_cache {
        debug!(label, "Offline; cached value stands");
      } else {
        emit(SyncState::Error(SyncError::NoConnectivityNoCache));
      }
      return;
    }

    match fetch().await {
      Ok(data) if is_empty(&data) => {
        if has_cache {
          debug!(label, "Remote returned nothing; cached value stands");
        } else {
          emit(SyncState::Empty);
        }
      }
      Ok(data) => {
        if let Err(e) = persist(self.storage.as_ref(), &data) {
          warn!(label, error = %e, "Failed to cache remote result");
        }
        info!(label, "Fetched from remote");
        emit(SyncState::Success {
          data,
          source: DataSource::Remote,
        });
      }
      Err(e) if has_cache => {
        warn!(label, error = %e, "Remote fetch failed; cached value stands");
      }
      Err(e) => emit(SyncState::Error(e.into())),
    }
  }
}
