//! Persisted sort preference.
//!
//! Stored as two named settings in the `preferences` table. Writers update
//! both in one transaction and then publish the new value, so every live
//! subscriber sees the change.

use std::fmt;
use std::str::FromStr;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::db::Database;

const SORT_FIELD_KEY: &str = "sort_field";
const SORT_ASCENDING_KEY: &str = "sort_ascending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
  /// Pokédex number
  #[default]
  Id,
  Name,
}

impl SortField {
  pub fn as_str(self) -> &'static str {
    match self {
      SortField::Id => "id",
      SortField::Name => "name",
    }
  }
}

impl fmt::Display for SortField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortField {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "id" | "number" | "#" => Ok(SortField::Id),
      "name" => Ok(SortField::Name),
      other => Err(eyre!("Unknown sort field '{}' (expected id or name)", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortPreference {
  pub field: SortField,
  pub ascending: bool,
}

impl Default for SortPreference {
  fn default() -> Self {
    Self {
      field: SortField::Id,
      ascending: true,
    }
  }
}

impl fmt::Display for SortPreference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let direction = if self.ascending { "asc" } else { "desc" };
    write!(f, "{} {}", self.field, direction)
  }
}

pub struct PreferenceStore {
  db: Database,
  tx: watch::Sender<SortPreference>,
}

impl PreferenceStore {
  pub fn open(db: Database) -> Result<Self> {
    let initial = Self::read(&db)?;
    debug!(%initial, "Loaded sort preference");
    let (tx, _rx) = watch::channel(initial);
    Ok(Self { db, tx })
  }

  fn read(db: &Database) -> Result<SortPreference> {
    let conn = db.lock()?;
    let get = |key: &str| -> Result<Option<String>> {
      conn
        .query_row(
          "SELECT value FROM preferences WHERE key = ?",
          params![key],
          |row| row.get(0),
        )
        .optional()
        .map_err(|e| eyre!("Failed to read preference {}: {}", key, e))
    };

    let mut preference = SortPreference::default();
    if let Some(field) = get(SORT_FIELD_KEY)? {
      match field.parse() {
        Ok(field) => preference.field = field,
        Err(e) => warn!(error = %e, "Ignoring stored sort field"),
      }
    }
    if let Some(ascending) = get(SORT_ASCENDING_KEY)? {
      preference.ascending = ascending != "false";
    }
    Ok(preference)
  }

  pub fn current(&self) -> SortPreference {
    *self.tx.borrow()
  }

  pub fn subscribe(&self) -> watch::Receiver<SortPreference> {
    self.tx.subscribe()
  }

  pub fn save(&self, preference: SortPreference) -> Result<()> {
    {
      let mut conn = self.db.lock()?;
      let tx = conn
        .transaction()
        .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

      for (key, value) in [
        (SORT_FIELD_KEY, preference.field.as_str().to_string()),
        (SORT_ASCENDING_KEY, preference.ascending.to_string()),
      ] {
        tx.execute(
          "INSERT OR REPLACE INTO preferences (key, value, updated_at)
           VALUES (?, ?, datetime('now'))",
          params![key, value],
        )
        .map_err(|e| eyre!("Failed to store preference {}: {}", key, e))?;
      }

      tx.commit()
        .map_err(|e| eyre!("Failed to commit preferences: {}", e))?;
    }

    self.tx.send_replace(preference);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_when_nothing_stored() {
    let store = PreferenceStore::open(Database::open_in_memory().unwrap()).unwrap();
    assert_eq!(store.current(), SortPreference::default());
  }

  #[test]
  fn test_save_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let preference = SortPreference {
      field: SortField::Name,
      ascending: false,
    };

    {
      let store = PreferenceStore::open(Database::open(Some(&path)).unwrap()).unwrap();
      store.save(preference).unwrap();
    }

    let store = PreferenceStore::open(Database::open(Some(&path)).unwrap()).unwrap();
    assert_eq!(store.current(), preference);
  }

  #[test]
  fn test_save_notifies_subscribers() {
    let store = PreferenceStore::open(Database::open_in_memory().unwrap()).unwrap();
    let mut rx = store.subscribe();

    store
      .save(SortPreference {
        field: SortField::Name,
        ascending: true,
      })
      .unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().field, SortField::Name);
  }

  #[test]
  fn test_sort_field_parsing() {
    assert_eq!("NAME".parse::<SortField>().unwrap(), SortField::Name);
    assert_eq!("number".parse::<SortField>().unwrap(), SortField::Id);
    assert_eq!("id".parse::<SortField>().unwrap(), SortField::Id);
    assert!("weight".parse::<SortField>().is_err());
  }
}
