//! Rendering coverage reports for the console.

use crate::report::{CoverageSummary, MergeRun, MissingPattern};
use crate::store::MergeOutcome;
use lc_common::{OutputFormat, SCHEMA_VERSION};
use serde::Serialize;
use std::io::{self, Write};

const SUMMARY_RULE: usize = 60;
const MISSING_RULE: usize = 80;

/// Everything a coverage report shows.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub schema_version: &'static str,
    pub summary: CoverageSummary,
    pub coverage_percent: Option<u64>,
    pub missing_limit: i64,
    pub missing: Vec<MissingPattern>,
}

impl CoverageReport {
    pub fn new(summary: CoverageSummary, missing_limit: i64, missing: Vec<MissingPattern>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            coverage_percent: summary.coverage_percent(),
            summary,
            missing_limit,
            missing,
        }
    }
}

/// Write a report in the requested format.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &CoverageReport,
    format: OutputFormat,
) -> lc_common::Result<()> {
    match format {
        OutputFormat::Text => render_text(out, report)?,
        OutputFormat::Json => write_json(out, report)?,
    }
    Ok(())
}

/// Write any serializable value as one pretty JSON document.
pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> lc_common::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn render_text<W: Write>(out: &mut W, report: &CoverageReport) -> io::Result<()> {
    let s = &report.summary;
    let rule = "=".repeat(SUMMARY_RULE);

    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "LOG MESSAGE STATISTICS")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Total unique patterns: {}", s.total)?;
    writeln!(out, "Seen in primary log: {}", s.seen_primary)?;
    writeln!(out, "Seen in secondary log: {}", s.seen_secondary)?;
    writeln!(
        out,
        "Only in primary (missing from secondary): {}",
        s.primary_only
    )?;
    writeln!(out, "Only in secondary: {}", s.secondary_only)?;
    writeln!(out, "Seen in both: {}", s.seen_both)?;
    if let Some(pct) = report.coverage_percent {
        writeln!(out)?;
        writeln!(
            out,
            "Coverage: {}/{} = {}%",
            s.seen_both, s.seen_primary, pct
        )?;
    }
    writeln!(out, "{rule}")?;
    writeln!(out)?;

    let rule = "=".repeat(MISSING_RULE);
    writeln!(
        out,
        "TOP {} MISSING PATTERNS (in primary, not in secondary)",
        report.missing_limit
    )?;
    writeln!(out, "{rule}")?;
    for (i, m) in report.missing.iter().enumerate() {
        writeln!(out, "{:2}. [{:3}x] {}", i + 1, m.count, m.message)?;
    }
    writeln!(out, "{rule}")?;
    writeln!(out)?;
    Ok(())
}

/// Describe one merge.
pub fn write_merge<W: Write>(
    out: &mut W,
    outcome: &MergeOutcome,
    origin: &str,
    format: OutputFormat,
) -> lc_common::Result<()> {
    match format {
        OutputFormat::Text => writeln!(
            out,
            "Merged {} templates ({} occurrences) from {} as {} [run {}]",
            outcome.templates, outcome.occurrences, origin, outcome.source, outcome.run_id
        )?,
        OutputFormat::Json => write_json(out, outcome)?,
    }
    Ok(())
}

/// List recorded merges.
pub fn write_runs<W: Write>(
    out: &mut W,
    runs: &[MergeRun],
    format: OutputFormat,
) -> lc_common::Result<()> {
    match format {
        OutputFormat::Text => {
            for run in runs {
                writeln!(
                    out,
                    "{}  {:<9}  {:>8} templates  {:>10} occurrences  {}",
                    run.merged_at.format("%Y-%m-%d %H:%M:%S"),
                    run.source.as_str(),
                    run.templates,
                    run.occurrences,
                    run.run_id
                )?;
            }
        }
        OutputFormat::Json => write_json(out, &runs)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Template;

    fn report() -> CoverageReport {
        let summary = CoverageSummary {
            total: 9,
            seen_primary: 7,
            seen_secondary: 5,
            seen_both: 3,
            primary_only: 4,
            secondary_only: 2,
        };
        let missing = vec![
            MissingPattern {
                message: Template::from("upstream timed out"),
                count: 120,
            },
            MissingPattern {
                message: Template::from("client closed connection"),
                count: 4,
            },
        ];
        CoverageReport::new(summary, 50, missing)
    }

    #[test]
    fn text_layout_matches_console_format() {
        let mut buf = Vec::new();
        write_report(&mut buf, &report(), OutputFormat::Text).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("LOG MESSAGE STATISTICS"));
        assert!(text.contains("Total unique patterns: 9"));
        assert!(text.contains("Coverage: 3/7 = 42%"));
        assert!(text.contains("TOP 50 MISSING PATTERNS"));
        assert!(text.contains(" 1. [120x] upstream timed out"));
        assert!(text.contains(" 2. [  4x] client closed connection"));
    }

    #[test]
    fn text_omits_coverage_without_primary() {
        let empty = CoverageReport::new(CoverageSummary::default(), 10, Vec::new());
        let mut buf = Vec::new();
        write_report(&mut buf, &empty, OutputFormat::Text).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Coverage:"));
    }

    #[test]
    fn json_carries_schema_and_percent() {
        let mut buf = Vec::new();
        write_report(&mut buf, &report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["coverage_percent"], 42);
        assert_eq!(value["summary"]["primary_only"], 4);
        assert_eq!(value["missing"][0]["message"], "upstream timed out");
        assert_eq!(value["missing"][0]["count"], 120);
    }
}
