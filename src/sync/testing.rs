//! Scripted remote source and fixtures shared by synchronizer-level tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::SqliteStorage;
use crate::connectivity::{ConnectivityStatus, ManualConnectivity};
use crate::db::Database;
use crate::pokeapi::types::artwork_url;
use crate::pokeapi::{FetchError, Pokemon, RemoteSource};

use super::Synchronizer;

pub type TestSync = Synchronizer<FakeRemote, SqliteStorage, ManualConnectivity>;

pub fn pokemon(id: u32, name: &str) -> Pokemon {
  Pokemon {
    id,
    name: name.to_string(),
    types: vec!["normal".to_string()],
    weight: id as f32 / 10.0,
    height: 1.0,
    stats: Vec::new(),
    image_url: artwork_url(id),
  }
}

/// In-memory stand-in for PokéAPI. Records are named `p{id}` unless given.
#[derive(Default)]
pub struct FakeRemote {
  records: Mutex<BTreeMap<u32, Pokemon>>,
  /// Explicit pages by offset, served instead of slicing `records`
  pages: Mutex<HashMap<u32, Vec<Pokemon>>>,
  failure: Mutex<Option<FetchError>>,
  delay: Mutex<Option<Duration>>,
  page_calls: AtomicUsize,
}

impl FakeRemote {
  pub fn with_ids(ids: RangeInclusive<u32>) -> Self {
    let records = ids.map(|id| (id, pokemon(id, &format!("p{}", id)))).collect();
    Self {
      records: Mutex::new(records),
      ..Self::default()
    }
  }

  pub fn insert(&self, record: Pokemon) {
    self.records.lock().unwrap().insert(record.id, record);
  }

  pub fn set_page(&self, offset: u32, records: Vec<Pokemon>) {
    self.pages.lock().unwrap().insert(offset, records);
  }

  pub fn fail_with(&self, failure: Option<FetchError>) {
    *self.failure.lock().unwrap() = failure;
  }

  pub fn set_delay(&self, delay: Option<Duration>) {
    *self.delay.lock().unwrap() = delay;
  }

  pub fn page_calls(&self) -> usize {
    self.page_calls.load(Ordering::SeqCst)
  }

  async fn pause_and_check(&self) -> Result<(), FetchError> {
    let delay = *self.delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    let failure = self.failure.lock().unwrap().clone();
    match failure {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

impl RemoteSource for FakeRemote {
  async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Vec<Pokemon>, FetchError> {
    self.page_calls.fetch_add(1, Ordering::SeqCst);
    self.pause_and_check().await?;

    if let Some(page) = self.pages.lock().unwrap().get(&offset) {
      return Ok(page.clone());
    }
    Ok(
      self
        .records
        .lock()
        .unwrap()
        .values()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect(),
    )
  }

  async fn fetch_by_id(&self, id: u32) -> Result<Pokemon, FetchError> {
    self.pause_and_check().await?;
    self
      .records
      .lock()
      .unwrap()
      .get(&id)
      .cloned()
      .ok_or(FetchError::NotFound)
  }

  async fn fetch_by_name(&self, name: &str) -> Result<Pokemon, FetchError> {
    self.pause_and_check().await?;
    self
      .records
      .lock()
      .unwrap()
      .values()
      .find(|p| p.name == name)
      .cloned()
      .ok_or(FetchError::NotFound)
  }
}

/// Synchronizer over an in-memory cache and a fake remote holding `ids`.
pub fn fixture(
  ids: RangeInclusive<u32>,
  online: bool,
) -> (TestSync, Arc<FakeRemote>, Arc<ManualConnectivity>) {
  let remote = Arc::new(FakeRemote::with_ids(ids));
  let storage = Arc::new(SqliteStorage::new(Database::open_in_memory().unwrap()));
  let status = if online {
    ConnectivityStatus::Available
  } else {
    ConnectivityStatus::Unavailable
  };
  let connectivity = Arc::new(ManualConnectivity::new(status));

  let sync = Synchronizer::new(Arc::clone(&remote), storage, Arc::clone(&connectivity));
  (sync, remote, connectivity)
}
