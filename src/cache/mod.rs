//! Local record cache for offline support.
//!
//! This module provides a domain-agnostic store that:
//! - Keeps one serialized row per entity, keyed by (entity type, id)
//! - Supports lookup by id, by case-folded name, and id-ordered windows
//! - Tracks when each entity was last fetched so stale rows can be found
//! - Replaces rows wholesale on upsert (last write wins per id)

mod storage;
mod traits;

pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheEntry, Cacheable};
