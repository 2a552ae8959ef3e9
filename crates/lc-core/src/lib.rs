//! Log Coverage core.
//!
//! Reduces raw server log lines to templates, counts them in parallel, and
//! keeps a differential record of which templates each of two sources has
//! produced:
//!
//! ```text
//! lines ─▶ normalize (per line, in workers) ─▶ aggregate ─▶ store.merge(source) ─▶ report
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lc_core::aggregate::{AggregateConfig, Aggregator};
//! use lc_core::store::PatternStore;
//!
//! let primary = vec!["812#812: *1 upstream timed out (110: Connection timed out)"];
//! let runtime = vec!["9#9: *77 client closed connection"];
//!
//! let aggregator = Aggregator::new(AggregateConfig::default());
//! let mut store = PatternStore::open("log_messages.db").unwrap();
//! store.merge_primary(&aggregator.run(&primary).unwrap().mapping).unwrap();
//! store.merge_secondary(&aggregator.run(&runtime).unwrap().mapping).unwrap();
//!
//! let summary = store.summarize().unwrap();
//! println!("coverage: {:?}%", summary.coverage_percent());
//! for missing in store.top_missing(10).unwrap() {
//!     println!("[{}x] {}", missing.count, missing.message);
//! }
//! ```

pub mod aggregate;
pub mod exit_codes;
pub mod input;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod report;
pub mod store;

pub use aggregate::{aggregate, AggregateConfig, AggregateError, Aggregator, FrequencyMapping};
pub use normalize::{normalize, LineNormalizer, MessageNormalizer, Template};
pub use report::{CoverageSummary, MissingPattern, ReportError};
pub use store::{MergeOutcome, PatternStore, PersistedPattern, StoreError};
