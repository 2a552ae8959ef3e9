//! Coverage reporting over the pattern store.
//!
//! Coverage is the share of primary templates that were also observed in the
//! secondary source, computed with truncating integer division.

use crate::normalize::Template;
use crate::store::{non_negative, PatternStore, StoreError};
use chrono::{DateTime, Utc};
use lc_common::Source;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::Serialize;
use thiserror::Error;

/// Errors from report queries.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("limit must not be negative, got {0}")]
    InvalidLimit(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ReportError {
    fn from(err: rusqlite::Error) -> Self {
        ReportError::Store(StoreError::Sqlite(err))
    }
}

impl From<ReportError> for lc_common::Error {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidLimit(_) => lc_common::Error::InvalidArgument(err.to_string()),
            ReportError::Store(inner) => inner.into(),
        }
    }
}

/// Pattern counts over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub total: u64,
    pub seen_primary: u64,
    pub seen_secondary: u64,
    pub seen_both: u64,
    pub primary_only: u64,
    pub secondary_only: u64,
}

impl CoverageSummary {
    /// `seen_both * 100 / seen_primary`, truncated; `None` with no primary
    /// templates.
    pub fn coverage_percent(&self) -> Option<u64> {
        if self.seen_primary == 0 {
            return None;
        }
        Some(self.seen_both * 100 / self.seen_primary)
    }
}

/// A primary template never seen in the secondary source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPattern {
    pub message: Template,
    /// Cumulative primary occurrences.
    pub count: u64,
}

/// One committed merge, as recorded in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRun {
    pub run_id: String,
    pub source: Source,
    pub merged_at: DateTime<Utc>,
    pub templates: u64,
    pub occurrences: u64,
}

impl MergeRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let source: String = row.get(1)?;
        let source = source.parse::<Source>().map_err(|msg| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, msg.into())
        })?;
        let merged_at: String = row.get(2)?;
        let merged_at = DateTime::parse_from_rfc3339(&merged_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        Ok(Self {
            run_id: row.get(0)?,
            source,
            merged_at,
            templates: non_negative(row, 3)?,
            occurrences: non_negative(row, 4)?,
        })
    }
}

fn check_limit(limit: i64) -> Result<i64, ReportError> {
    if limit < 0 {
        return Err(ReportError::InvalidLimit(limit));
    }
    Ok(limit)
}

impl PatternStore {
    /// Count templates by which sources observed them.
    pub fn summarize(&self) -> Result<CoverageSummary, ReportError> {
        let summary = self.connection().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(seen_on_primary = 1), 0),
                    COALESCE(SUM(seen_on_secondary = 1), 0),
                    COALESCE(SUM(seen_on_primary = 1 AND seen_on_secondary = 1), 0),
                    COALESCE(SUM(seen_on_primary = 1 AND seen_on_secondary = 0), 0),
                    COALESCE(SUM(seen_on_secondary = 1 AND seen_on_primary = 0), 0)
             FROM pattern",
            [],
            |row| {
                Ok(CoverageSummary {
                    total: non_negative(row, 0)?,
                    seen_primary: non_negative(row, 1)?,
                    seen_secondary: non_negative(row, 2)?,
                    seen_both: non_negative(row, 3)?,
                    primary_only: non_negative(row, 4)?,
                    secondary_only: non_negative(row, 5)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Up to `limit` primary-only templates, most frequent first.
    ///
    /// Ties are broken by template text so the order is stable for a given
    /// store state.
    pub fn top_missing(&self, limit: i64) -> Result<Vec<MissingPattern>, ReportError> {
        let limit = check_limit(limit)?;
        let mut stmt = self.connection().prepare(
            "SELECT message, seen_on_primary_count
             FROM pattern
             WHERE seen_on_primary = 1 AND seen_on_secondary = 0
             ORDER BY seen_on_primary_count DESC, message ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(MissingPattern {
                message: Template::from(row.get::<_, String>(0)?),
                count: non_negative(row, 1)?,
            })
        })?;
        let missing = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(missing)
    }

    /// The `limit` most recent merges, newest first.
    pub fn recent_runs(&self, limit: i64) -> Result<Vec<MergeRun>, ReportError> {
        let limit = check_limit(limit)?;
        let mut stmt = self.connection().prepare(
            "SELECT run_id, source, merged_at, templates, occurrences
             FROM merge_run
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], MergeRun::from_row)?;
        let runs = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FrequencyMapping;

    fn mapping(entries: &[(&str, u64)]) -> FrequencyMapping {
        entries.iter().map(|(t, c)| (*t, *c)).collect()
    }

    fn populated_store() -> PatternStore {
        let mut store = PatternStore::open_in_memory().unwrap();
        store
            .merge_primary(&mapping(&[
                ("both a", 10),
                ("both b", 1),
                ("missing hot", 50),
                ("missing tie x", 7),
                ("missing tie a", 7),
                ("missing cold", 1),
            ]))
            .unwrap();
        store
            .merge_secondary(&mapping(&[("both a", 1), ("both b", 1), ("runtime only", 3)]))
            .unwrap();
        store
    }

    #[test]
    fn summary_counts_each_bucket() {
        let summary = populated_store().summarize().unwrap();
        assert_eq!(
            summary,
            CoverageSummary {
                total: 7,
                seen_primary: 6,
                seen_secondary: 3,
                seen_both: 2,
                primary_only: 4,
                secondary_only: 1,
            }
        );
        assert_eq!(summary.coverage_percent(), Some(33));
    }

    #[test]
    fn empty_store_has_no_coverage() {
        let store = PatternStore::open_in_memory().unwrap();
        let summary = store.summarize().unwrap();
        assert_eq!(summary, CoverageSummary::default());
        assert_eq!(summary.coverage_percent(), None);
    }

    #[test]
    fn coverage_truncates() {
        let summary = CoverageSummary {
            seen_primary: 7,
            seen_both: 3,
            ..CoverageSummary::default()
        };
        assert_eq!(summary.coverage_percent(), Some(42));
    }

    #[test]
    fn top_missing_ranks_by_count_then_text() {
        let store = populated_store();
        let missing = store.top_missing(10).unwrap();
        let ranked: Vec<_> = missing
            .iter()
            .map(|m| (m.message.as_str(), m.count))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("missing hot", 50),
                ("missing tie a", 7),
                ("missing tie x", 7),
                ("missing cold", 1),
            ]
        );
        assert_eq!(store.top_missing(2).unwrap().len(), 2);
        assert!(store.top_missing(0).unwrap().is_empty());
    }

    #[test]
    fn negative_limit_fails_fast() {
        let store = populated_store();
        assert!(matches!(
            store.top_missing(-1),
            Err(ReportError::InvalidLimit(-1))
        ));
        assert!(matches!(
            store.recent_runs(-5),
            Err(ReportError::InvalidLimit(-5))
        ));
        let common: lc_common::Error = ReportError::InvalidLimit(-1).into();
        assert_eq!(common.code(), 11);
    }

    #[test]
    fn recent_runs_are_newest_first() {
        let store = populated_store();
        let runs = store.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].source, Source::Secondary);
        assert_eq!(runs[0].templates, 3);
        assert_eq!(runs[0].occurrences, 5);
        assert_eq!(runs[1].source, Source::Primary);
        assert_eq!(runs[1].occurrences, 76);
        assert!(runs[0].merged_at >= runs[1].merged_at);
        assert_eq!(store.recent_runs(1).unwrap().len(), 1);
    }
}
