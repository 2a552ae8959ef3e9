//! Pattern store DDL and version stamping.

use super::StoreError;
use lc_common::schema::{is_store_compatible, STORE_SCHEMA_VERSION};
use rusqlite::Connection;
use tracing::debug;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS pattern (
    message               TEXT    NOT NULL PRIMARY KEY,
    seen_on_primary       INTEGER NOT NULL DEFAULT 0,
    seen_on_primary_count INTEGER NOT NULL DEFAULT 0,
    seen_on_secondary     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS pattern_missing_idx
    ON pattern (seen_on_primary, seen_on_secondary, seen_on_primary_count DESC);

CREATE TABLE IF NOT EXISTS merge_run (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      TEXT    NOT NULL UNIQUE,
    source      TEXT    NOT NULL,
    merged_at   TEXT    NOT NULL,
    templates   INTEGER NOT NULL,
    occurrences INTEGER NOT NULL
);
";

/// Insert a primary observation, or flag it and add to its count.
pub(super) const UPSERT_PRIMARY: &str = "
INSERT INTO pattern (message, seen_on_primary, seen_on_primary_count)
VALUES (?1, 1, ?2)
ON CONFLICT(message) DO UPDATE SET
    seen_on_primary = 1,
    seen_on_primary_count = seen_on_primary_count + excluded.seen_on_primary_count
";

/// Insert a secondary observation, or flag it. Primary columns are untouched.
pub(super) const UPSERT_SECONDARY: &str = "
INSERT INTO pattern (message, seen_on_secondary)
VALUES (?1, 1)
ON CONFLICT(message) DO UPDATE SET seen_on_secondary = 1
";

pub(super) const INSERT_RUN: &str = "
INSERT INTO merge_run (run_id, source, merged_at, templates, occurrences)
VALUES (?1, ?2, ?3, ?4, ?5)
";

/// Create tables if missing and stamp a fresh database with the schema version.
pub(super) fn bootstrap(conn: &Connection) -> Result<(), StoreError> {
    let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if !is_store_compatible(found) {
        return Err(StoreError::SchemaMismatch {
            expected: STORE_SCHEMA_VERSION,
            found,
        });
    }

    conn.execute_batch(SCHEMA_SQL)?;

    if found == 0 {
        conn.pragma_update(None, "user_version", STORE_SCHEMA_VERSION)?;
        debug!(version = STORE_SCHEMA_VERSION, "stamped pattern store schema");
    }
    Ok(())
}
