//! Differential pattern store.
//!
//! One SQLite table keyed by template text holds, per template, whether it was
//! ever seen in the primary source, how often in total, and whether it was
//! ever seen in the secondary source. Each merge applies a whole
//! [`FrequencyMapping`] inside one transaction using the native
//! `INSERT ... ON CONFLICT DO UPDATE` primitive:
//!
//! | merge      | absent template                         | present template |
//! |------------|-----------------------------------------|------------------|
//! | primary    | `seen_on_primary=1, count=n`            | `seen_on_primary=1, count+=n` |
//! | secondary  | `seen_on_secondary=1`, primary defaults | `seen_on_secondary=1` |
//!
//! The two merges touch disjoint columns, so neither can disturb the other's
//! data. Transactions are opened `IMMEDIATE`, taking the write lock up front so
//! concurrent merges from other connections serialize instead of interleaving.

mod schema;

use crate::aggregate::FrequencyMapping;
use crate::normalize::Template;
use chrono::Utc;
use lc_common::Source;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// How long a merge waits for another writer before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from pattern store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { expected: i64, found: i64 },

    #[error("count {count} for template '{template}' does not fit in the store")]
    CountOverflow { template: String, count: u64 },
}

impl From<StoreError> for lc_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SchemaMismatch { expected, found } => {
                lc_common::Error::SchemaMismatch { expected, found }
            }
            other => lc_common::Error::Store(other.to_string()),
        }
    }
}

/// The durable record for one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedPattern {
    pub message: Template,
    pub seen_on_primary: bool,
    pub seen_on_primary_count: u64,
    pub seen_on_secondary: bool,
}

impl PersistedPattern {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message: Template::from(row.get::<_, String>(0)?),
            seen_on_primary: row.get(1)?,
            seen_on_primary_count: non_negative(row, 2)?,
            seen_on_secondary: row.get(3)?,
        })
    }
}

/// Summary of one committed merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub run_id: Uuid,
    pub source: Source,
    /// Distinct templates upserted.
    pub templates: u64,
    /// Sum of the mapping's counts.
    pub occurrences: u64,
}

/// Handle to an open pattern store.
///
/// The connection is released by [`PatternStore::close`] or on drop.
#[derive(Debug)]
pub struct PatternStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl PatternStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "opened pattern store");
        Ok(store)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::bootstrap(&conn)?;
        Ok(Self { conn, path })
    }

    /// Database file backing this store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Merge a primary-source mapping: flag every template as primary and
    /// add its count.
    pub fn merge_primary(&mut self, mapping: &FrequencyMapping) -> Result<MergeOutcome, StoreError> {
        self.merge(Source::Primary, mapping)
    }

    /// Merge a secondary-source mapping: flag every template as secondary.
    /// Counts are not persisted for this source.
    pub fn merge_secondary(
        &mut self,
        mapping: &FrequencyMapping,
    ) -> Result<MergeOutcome, StoreError> {
        self.merge(Source::Secondary, mapping)
    }

    /// Apply a whole mapping for `source` atomically.
    ///
    /// # Errors
    ///
    /// Any failure rolls back the entire batch; no template from this call is
    /// recorded.
    pub fn merge(
        &mut self,
        source: Source,
        mapping: &FrequencyMapping,
    ) -> Result<MergeOutcome, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut templates = 0u64;
        let mut occurrences = 0u64;
        {
            let sql = match source {
                Source::Primary => schema::UPSERT_PRIMARY,
                Source::Secondary => schema::UPSERT_SECONDARY,
            };
            let mut stmt = tx.prepare(sql)?;
            for (template, count) in mapping.iter() {
                match source {
                    Source::Primary => {
                        let stored = to_sql_count(template.as_str(), count)?;
                        stmt.execute(params![template.as_str(), stored])?;
                    }
                    Source::Secondary => {
                        stmt.execute(params![template.as_str()])?;
                    }
                }
                templates += 1;
                occurrences = occurrences.saturating_add(count);
            }
        }

        let run_id = Uuid::new_v4();
        tx.execute(
            schema::INSERT_RUN,
            params![
                run_id.to_string(),
                source.as_str(),
                Utc::now().to_rfc3339(),
                i64::try_from(templates).unwrap_or(i64::MAX),
                i64::try_from(occurrences).unwrap_or(i64::MAX),
            ],
        )?;
        tx.commit()?;

        info!(%source, %run_id, templates, occurrences, "merged mapping into pattern store");
        Ok(MergeOutcome {
            run_id,
            source,
            templates,
            occurrences,
        })
    }

    /// Look up one template.
    pub fn get(&self, message: &str) -> Result<Option<PersistedPattern>, StoreError> {
        let pattern = self
            .conn
            .query_row(
                "SELECT message, seen_on_primary, seen_on_primary_count, seen_on_secondary
                 FROM pattern WHERE message = ?1",
                params![message],
                PersistedPattern::from_row,
            )
            .optional()?;
        debug!(template = message, found = pattern.is_some(), "pattern lookup");
        Ok(pattern)
    }
}

fn to_sql_count(template: &str, count: u64) -> Result<i64, StoreError> {
    i64::try_from(count).map_err(|_| StoreError::CountOverflow {
        template: template.to_string(),
        count,
    })
}

/// Read a column that must hold a non-negative integer.
pub(crate) fn non_negative(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, u64)]) -> FrequencyMapping {
        entries.iter().map(|(t, c)| (*t, *c)).collect()
    }

    #[test]
    fn primary_merges_accumulate() {
        let mut store = PatternStore::open_in_memory().unwrap();
        store.merge_primary(&mapping(&[("T", 3)])).unwrap();
        store.merge_primary(&mapping(&[("T", 2)])).unwrap();

        let row = store.get("T").unwrap().unwrap();
        assert!(row.seen_on_primary);
        assert_eq!(row.seen_on_primary_count, 5);
        assert!(!row.seen_on_secondary);
    }

    #[test]
    fn secondary_merge_leaves_primary_columns_alone() {
        let mut store = PatternStore::open_in_memory().unwrap();
        store.merge_primary(&mapping(&[("T", 3)])).unwrap();
        store.merge_secondary(&mapping(&[("T", 40)])).unwrap();
        store.merge_primary(&mapping(&[("T", 2)])).unwrap();

        let row = store.get("T").unwrap().unwrap();
        assert!(row.seen_on_primary);
        assert!(row.seen_on_secondary);
        assert_eq!(row.seen_on_primary_count, 5);
    }

    #[test]
    fn secondary_first_sight_uses_primary_defaults() {
        let mut store = PatternStore::open_in_memory().unwrap();
        store.merge_secondary(&mapping(&[("only secondary", 9)])).unwrap();

        let row = store.get("only secondary").unwrap().unwrap();
        assert_eq!(
            row,
            PersistedPattern {
                message: Template::from("only secondary"),
                seen_on_primary: false,
                seen_on_primary_count: 0,
                seen_on_secondary: true,
            }
        );

        store.merge_primary(&mapping(&[("only secondary", 4)])).unwrap();
        let row = store.get("only secondary").unwrap().unwrap();
        assert!(row.seen_on_primary && row.seen_on_secondary);
        assert_eq!(row.seen_on_primary_count, 4);
    }

    #[test]
    fn merge_outcome_describes_batch() {
        let mut store = PatternStore::open_in_memory().unwrap();
        let outcome = store
            .merge(Source::Primary, &mapping(&[("a", 2), ("b", 5)]))
            .unwrap();
        assert_eq!(outcome.source, Source::Primary);
        assert_eq!(outcome.templates, 2);
        assert_eq!(outcome.occurrences, 7);

        let runs: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM merge_run", [], |r| r.get(0))
            .unwrap();
        assert_eq!(runs, 1);
    }

    #[test]
    fn empty_mapping_is_a_valid_batch() {
        let mut store = PatternStore::open_in_memory().unwrap();
        let outcome = store.merge_secondary(&FrequencyMapping::new()).unwrap();
        assert_eq!(outcome.templates, 0);
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn failed_batch_records_nothing() {
        let mut store = PatternStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_poison BEFORE INSERT ON pattern
                 WHEN NEW.message = 'poison'
                 BEGIN SELECT RAISE(ABORT, 'poisoned template'); END;",
            )
            .unwrap();

        let batch = mapping(&[("alpha", 1), ("beta", 2), ("poison", 3), ("gamma", 4)]);
        let err = store.merge_primary(&batch).unwrap_err();
        assert!(err.to_string().contains("poisoned template"));

        for t in ["alpha", "beta", "poison", "gamma"] {
            assert_eq!(store.get(t).unwrap(), None, "{t} leaked from a failed batch");
        }
        let runs: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM merge_run", [], |r| r.get(0))
            .unwrap();
        assert_eq!(runs, 0);
    }

    #[test]
    fn oversized_count_rejects_whole_batch() {
        let mut store = PatternStore::open_in_memory().unwrap();
        let batch = mapping(&[("fine", 1), ("huge", u64::MAX)]);
        let err = store.merge_primary(&batch).unwrap_err();
        assert!(matches!(err, StoreError::CountOverflow { count: u64::MAX, .. }));
        assert_eq!(store.get("fine").unwrap(), None);
    }

    #[test]
    fn reopening_a_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.db");

        let mut store = PatternStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        store.merge_primary(&mapping(&[("kept", 7)])).unwrap();
        store.close().unwrap();

        let store = PatternStore::open(&path).unwrap();
        assert_eq!(store.get("kept").unwrap().unwrap().seen_on_primary_count, 7);
    }

    #[test]
    fn concurrent_handles_serialize_merges() {
        const THREADS: u64 = 4;
        const ROUNDS: u64 = 25;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        PatternStore::open(&path).unwrap().close().unwrap();

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                let path = &path;
                s.spawn(move || {
                    let mut store = PatternStore::open(path).unwrap();
                    let batch = mapping(&[("T", 1), ("U", 2)]);
                    for _ in 0..ROUNDS {
                        store.merge_primary(&batch).unwrap();
                        store.merge_secondary(&batch).unwrap();
                    }
                    store.close().unwrap();
                });
            }
        });

        let store = PatternStore::open(&path).unwrap();
        let t = store.get("T").unwrap().unwrap();
        let u = store.get("U").unwrap().unwrap();
        assert_eq!(t.seen_on_primary_count, THREADS * ROUNDS);
        assert_eq!(u.seen_on_primary_count, 2 * THREADS * ROUNDS);
        assert!(t.seen_on_secondary && u.seen_on_secondary);
        let runs = store.recent_runs(1_000).unwrap();
        assert_eq!(runs.len() as u64, 2 * THREADS * ROUNDS);
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99i64).unwrap();
        }
        let err = PatternStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { found: 99, .. }));
        let common: lc_common::Error = err.into();
        assert_eq!(common.code(), 41);
    }
}
