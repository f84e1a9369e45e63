//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for entities that can be cached.
///
/// Entities are keyed by a stable integer id and can also be looked up by a
/// case-folded name.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier for this entity (e.g., pokédex number)
  fn cache_id(&self) -> i64;

  /// Case-folded name used for exact name lookups
  fn lookup_name(&self) -> String;

  /// Entity type name for storage organization (e.g., "pokemon")
  fn entity_type() -> &'static str;
}

/// A cached entity together with the time it was last fetched.
///
/// Entries are only ever replaced wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
  pub entity: T,
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn into_entity(self) -> T {
    self.entity
  }
}
