//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Params};
use tracing::warn;

use crate::db::Database;

use super::traits::{CacheEntry, Cacheable};

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync + 'static {
  /// Get a single entity by id.
  fn get<T: Cacheable>(&self, id: i64) -> Result<Option<CacheEntry<T>>>;

  /// Get a single entity by exact, case-folded name.
  fn get_by_name<T: Cacheable>(&self, name: &str) -> Result<Option<CacheEntry<T>>>;

  /// All cached entities of a type, ordered by id ascending.
  fn list_all<T: Cacheable>(&self) -> Result<Vec<CacheEntry<T>>>;

  /// A window of the id-ordered entities.
  fn list_range<T: Cacheable>(&self, offset: u32, limit: u32) -> Result<Vec<CacheEntry<T>>>;

  /// Number of cached entities of a type.
  fn count<T: Cacheable>(&self) -> Result<u64>;

  /// Insert or replace a single entity.
  fn upsert<T: Cacheable>(&self, entity: &T) -> Result<()>;

  /// Insert or replace many entities in one transaction.
  fn upsert_many<T: Cacheable>(&self, entities: &[T]) -> Result<()>;

  /// Delete every cached entity of a type.
  fn clear<T: Cacheable>(&self) -> Result<()>;

  /// Entities last fetched strictly before `cutoff`.
  fn stale_before<T: Cacheable>(&self, cutoff: DateTime<Utc>) -> Result<Vec<CacheEntry<T>>>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get<T: Cacheable>(&self, _id: i64) -> Result<Option<CacheEntry<T>>> {
    Ok(None) // Always miss
  }

  fn get_by_name<T: Cacheable>(&self, _name: &str) -> Result<Option<CacheEntry<T>>> {
    Ok(None) // Always miss
  }

  fn list_all<T: Cacheable>(&self) -> Result<Vec<CacheEntry<T>>> {
    Ok(Vec::new())
  }

  fn list_range<T: Cacheable>(&self, _offset: u32, _limit: u32) -> Result<Vec<CacheEntry<T>>> {
    Ok(Vec::new())
  }

  fn count<T: Cacheable>(&self) -> Result<u64> {
    Ok(0)
  }

  fn upsert<T: Cacheable>(&self, _entity: &T) -> Result<()> {
    Ok(()) // Discard
  }

  fn upsert_many<T: Cacheable>(&self, _entities: &[T]) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear<T: Cacheable>(&self) -> Result<()> {
    Ok(())
  }

  fn stale_before<T: Cacheable>(&self, _cutoff: DateTime<Utc>) -> Result<Vec<CacheEntry<T>>> {
    Ok(Vec::new())
  }
}

/// SQLite-based cache storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
  db: Database,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  /// Run a query returning (data, fetched_at) rows and decode them.
  ///
  /// Rows that no longer deserialize are skipped: absence is a valid cache
  /// answer, a broken row is not worth failing the caller for.
  fn query_entries<T: Cacheable, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
  ) -> Result<Vec<CacheEntry<T>>> {
    let mut stmt = conn
      .prepare(sql)
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(Vec<u8>, i64)> = stmt
      .query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to query entities: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(
      rows
        .into_iter()
        .filter_map(|(data, fetched_at)| decode_entry(&data, fetched_at))
        .collect(),
    )
  }

  fn write_entity<T: Cacheable>(conn: &Connection, entity: &T, now: i64) -> Result<()> {
    let data =
      serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_id, lookup_name, data, fetched_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          T::entity_type(),
          entity.cache_id(),
          entity.lookup_name(),
          data,
          now
        ],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

    Ok(())
  }
}

impl CacheStorage for SqliteStorage {
  fn get<T: Cacheable>(&self, id: i64) -> Result<Option<CacheEntry<T>>> {
    let conn = self.db.lock()?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT data, fetched_at FROM entity_cache
         WHERE entity_type = ? AND entity_id = ?",
        params![T::entity_type(), id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read entity {}: {}", id, e))?;

    Ok(row.and_then(|(data, fetched_at)| decode_entry(&data, fetched_at)))
  }

  fn get_by_name<T: Cacheable>(&self, name: &str) -> Result<Option<CacheEntry<T>>> {
    let conn = self.db.lock()?;
    let mut entries = Self::query_entries(
      &conn,
      "SELECT data, fetched_at FROM entity_cache
       WHERE entity_type = ? AND lookup_name = ?
       ORDER BY entity_id
       LIMIT 1",
      params![T::entity_type(), name.trim().to_lowercase()],
    )?;
    Ok(entries.pop())
  }

  fn list_all<T: Cacheable>(&self) -> Result<Vec<CacheEntry<T>>> {
    let conn = self.db.lock()?;
    Self::query_entries(
      &conn,
      "SELECT data, fetched_at FROM entity_cache
       WHERE entity_type = ?
       ORDER BY entity_id",
      params![T::entity_type()],
    )
  }

  fn list_range<T: Cacheable>(&self, offset: u32, limit: u32) -> Result<Vec<CacheEntry<T>>> {
    let conn = self.db.lock()?;
    Self::query_entries(
      &conn,
      "SELECT data, fetched_at FROM entity_cache
       WHERE entity_type = ?
       ORDER BY entity_id
       LIMIT ? OFFSET ?",
      params![T::entity_type(), limit, offset],
    )
  }

  fn count<T: Cacheable>(&self) -> Result<u64> {
    let conn = self.db.lock()?;
    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM entity_cache WHERE entity_type = ?",
        params![T::entity_type()],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entities: {}", e))?;
    Ok(count.max(0) as u64)
  }

  fn upsert<T: Cacheable>(&self, entity: &T) -> Result<()> {
    let conn = self.db.lock()?;
    Self::write_entity(&conn, entity, Utc::now().timestamp_millis())
  }

  fn upsert_many<T: Cacheable>(&self, entities: &[T]) -> Result<()> {
    let mut conn = self.db.lock()?;
    let now = Utc::now().timestamp_millis();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for entity in entities {
      Self::write_entity(&tx, entity, now)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn clear<T: Cacheable>(&self) -> Result<()> {
    let conn = self.db.lock()?;
    conn
      .execute(
        "DELETE FROM entity_cache WHERE entity_type = ?",
        params![T::entity_type()],
      )
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
    Ok(())
  }

  fn stale_before<T: Cacheable>(&self, cutoff: DateTime<Utc>) -> Result<Vec<CacheEntry<T>>> {
    let conn = self.db.lock()?;
    Self::query_entries(
      &conn,
      "SELECT data, fetched_at FROM entity_cache
       WHERE entity_type = ? AND fetched_at < ?
       ORDER BY entity_id",
      params![T::entity_type(), cutoff.timestamp_millis()],
    )
  }
}

fn decode_entry<T: Cacheable>(data: &[u8], fetched_at: i64) -> Option<CacheEntry<T>> {
  let entity = match serde_json::from_slice(data) {
    Ok(entity) => entity,
    Err(e) => {
      warn!(entity_type = T::entity_type(), error = %e, "Skipping undecodable cache row");
      return None;
    }
  };
  let fetched_at = DateTime::from_timestamp_millis(fetched_at)?;
  Some(CacheEntry { entity, fetched_at })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pokeapi::types::{artwork_url, Pokemon};
  use chrono::Duration;

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Database::open_in_memory().unwrap())
  }

  fn pokemon(id: u32, name: &str) -> Pokemon {
    Pokemon {
      id,
      name: name.to_string(),
      types: vec!["normal".to_string()],
      weight: 1.5,
      height: 0.3,
      stats: Vec::new(),
      image_url: artwork_url(id),
    }
  }

  #[test]
  fn test_upsert_and_get() {
    let storage = storage();
    let record = pokemon(25, "pikachu");

    storage.upsert(&record).unwrap();
    let entry = storage.get::<Pokemon>(25).unwrap().unwrap();
    assert_eq!(entry.entity, record);
    assert!(storage.get::<Pokemon>(26).unwrap().is_none());
  }

  #[test]
  fn test_upsert_twice_keeps_one_latest_entry() {
    let storage = storage();
    storage.upsert(&pokemon(1, "bulbasaur")).unwrap();

    let mut updated = pokemon(1, "bulbasaur");
    updated.weight = 6.9;
    storage.upsert(&updated).unwrap();

    assert_eq!(storage.count::<Pokemon>().unwrap(), 1);
    let entry = storage.get::<Pokemon>(1).unwrap().unwrap();
    assert_eq!(entry.entity.weight, 6.9);
  }

  #[test]
  fn test_get_by_name_is_case_folded() {
    let storage = storage();
    storage.upsert(&pokemon(25, "pikachu")).unwrap();

    let entry = storage.get_by_name::<Pokemon>("Pikachu").unwrap().unwrap();
    assert_eq!(entry.entity.id, 25);
    assert!(storage.get_by_name::<Pokemon>("pika").unwrap().is_none());
  }

  #[test]
  fn test_list_all_ordered_by_id() {
    let storage = storage();
    storage
      .upsert_many(&[pokemon(3, "venusaur"), pokemon(1, "bulbasaur"), pokemon(2, "ivysaur")])
      .unwrap();

    let ids: Vec<u32> = storage
      .list_all::<Pokemon>()
      .unwrap()
      .into_iter()
      .map(|e| e.entity.id)
      .collect();
    assert_eq!(ids, vec![1, 2, 3]);
  }

  #[test]
  fn test_list_range_windows() {
    let storage = storage();
    let records: Vec<Pokemon> = (1..=10).map(|id| pokemon(id, &format!("p{}", id))).collect();
    storage.upsert_many(&records).unwrap();

    let ids: Vec<u32> = storage
      .list_range::<Pokemon>(4, 3)
      .unwrap()
      .into_iter()
      .map(|e| e.entity.id)
      .collect();
    assert_eq!(ids, vec![5, 6, 7]);
    assert!(storage.list_range::<Pokemon>(20, 5).unwrap().is_empty());
  }

  #[test]
  fn test_clear_removes_everything() {
    let storage = storage();
    storage
      .upsert_many(&[pokemon(1, "bulbasaur"), pokemon(4, "charmander")])
      .unwrap();

    storage.clear::<Pokemon>().unwrap();
    assert_eq!(storage.count::<Pokemon>().unwrap(), 0);
    assert!(storage.list_all::<Pokemon>().unwrap().is_empty());
  }

  #[test]
  fn test_stale_before() {
    let storage = storage();
    storage.upsert(&pokemon(1, "bulbasaur")).unwrap();

    let past = Utc::now() - Duration::hours(1);
    let future = Utc::now() + Duration::hours(1);
    assert!(storage.stale_before::<Pokemon>(past).unwrap().is_empty());
    assert_eq!(storage.stale_before::<Pokemon>(future).unwrap().len(), 1);
  }

  #[test]
  fn test_corrupt_rows_are_skipped() {
    let storage = storage();
    storage.upsert(&pokemon(1, "bulbasaur")).unwrap();
    storage
      .db
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO entity_cache (entity_type, entity_id, lookup_name, data, fetched_at)
         VALUES ('pokemon', 2, 'broken', X'00FF', 0)",
        [],
      )
      .unwrap();

    assert_eq!(storage.list_all::<Pokemon>().unwrap().len(), 1);
    assert!(storage.get::<Pokemon>(2).unwrap().is_none());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.upsert(&pokemon(1, "bulbasaur")).unwrap();
    assert!(storage.get::<Pokemon>(1).unwrap().is_none());
    assert_eq!(storage.count::<Pokemon>().unwrap(), 0);
  }
}
