/// Schema for the cache and preference tables.
pub const SCHEMA: &str = r#"
-- Cached entities, one row per (type, id), stored as serialized JSON
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    lookup_name TEXT NOT NULL,
    data BLOB NOT NULL,
    fetched_at INTEGER NOT NULL, -- unix milliseconds
    PRIMARY KEY (entity_type, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_entity_cache_name
    ON entity_cache(entity_type, lookup_name);

CREATE INDEX IF NOT EXISTS idx_entity_cache_fetched
    ON entity_cache(entity_type, fetched_at);

-- Named user settings that survive restarts
CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
