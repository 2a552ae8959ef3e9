//! Chunked parallel aggregation of templates.
//!
//! The input lines are cut into contiguous chunks which a bounded pool of
//! scoped worker threads claims one at a time from a shared cursor. Each
//! chunk is normalized into its own map inside an unwind guard and only
//! folded into the worker's running map once the whole chunk succeeded, so a
//! panicking chunk never leaves half its counts behind. Worker maps are summed
//! after the join barrier; no map is shared between threads while they run.
//!
//! Chunking is purely a unit-of-work device: because the normalizer is a pure
//! per-line function and counts are additive, any chunk size yields the same
//! [`FrequencyMapping`].

mod frequency;

pub use frequency::FrequencyMapping;

use crate::normalize::{default_normalizer, LineNormalizer, MessageNormalizer};
use lc_config::AnalyzerConfig;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of lines per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = lc_config::analyzer::DEFAULT_CHUNK_SIZE;

/// Errors from an aggregation run.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,

    #[error("worker pool needs at least 1 worker")]
    ZeroWorkers,

    #[error("{} of {total_chunks} chunks failed", .failures.len())]
    ChunksFailed {
        failures: Vec<ChunkFailure>,
        total_chunks: usize,
        /// Counts from the chunks that completed.
        partial: Box<AggregateReport>,
    },

    #[error("worker {worker} panicked outside its chunk guard")]
    WorkerPanicked { worker: usize },
}

impl From<AggregateError> for lc_common::Error {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::ChunksFailed {
                failures,
                total_chunks,
                ..
            } => lc_common::Error::PartialAggregation {
                failed: failures.len(),
                total: total_chunks,
            },
            AggregateError::ZeroChunkSize | AggregateError::ZeroWorkers => {
                lc_common::Error::Config(err.to_string())
            }
            other => lc_common::Error::Aggregation(other.to_string()),
        }
    }
}

/// A chunk whose processing faulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    /// Chunk index, in input order.
    pub chunk: usize,
    /// Zero-based index of the chunk's first line.
    pub first_line: usize,
    /// Panic payload rendered as text.
    pub message: String,
}

/// Pool and chunk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateConfig {
    pub chunk_size: usize,
    pub workers: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl From<&AnalyzerConfig> for AggregateConfig {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            workers: config.effective_workers(),
        }
    }
}

impl AggregateConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    fn validate(&self) -> Result<(), AggregateError> {
        if self.chunk_size == 0 {
            return Err(AggregateError::ZeroChunkSize);
        }
        if self.workers == 0 {
            return Err(AggregateError::ZeroWorkers);
        }
        Ok(())
    }
}

/// Result of a completed aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateReport {
    pub mapping: FrequencyMapping,
    /// Lines handed to workers.
    pub lines_total: usize,
    /// Lines that produced a template.
    pub lines_counted: usize,
    /// Lines dropped by the normalizer.
    pub lines_discarded: usize,
    pub chunks: usize,
}

/// What one worker accumulated across the chunks it claimed.
#[derive(Debug, Default)]
struct WorkerOutcome {
    mapping: FrequencyMapping,
    lines_counted: usize,
    lines_discarded: usize,
    failures: Vec<ChunkFailure>,
}

/// Counts for a single chunk.
#[derive(Debug, Default)]
struct ChunkTally {
    mapping: FrequencyMapping,
    counted: usize,
    discarded: usize,
}

/// Parallel template counter.
#[derive(Debug, Clone)]
pub struct Aggregator<N = MessageNormalizer> {
    config: AggregateConfig,
    normalizer: N,
}

impl Aggregator<MessageNormalizer> {
    /// Aggregator using the built-in rewrite chain.
    ///
    /// Shares the compiled patterns of [`default_normalizer`]; cloning a
    /// compiled regex does not recompile it.
    pub fn new(config: AggregateConfig) -> Self {
        Self::with_normalizer(config, default_normalizer().clone())
    }
}

impl<N: LineNormalizer> Aggregator<N> {
    pub fn with_normalizer(config: AggregateConfig, normalizer: N) -> Self {
        Self { config, normalizer }
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Normalize and count every line, blocking until all chunks finish.
    ///
    /// # Errors
    ///
    /// [`AggregateError::ChunksFailed`] if any chunk faulted. Sibling chunks
    /// still run to completion and their counts are returned in `partial`.
    pub fn run<S>(&self, lines: &[S]) -> Result<AggregateReport, AggregateError>
    where
        S: AsRef<str> + Sync,
    {
        self.config.validate()?;

        let chunk_size = self.config.chunk_size;
        let chunks: Vec<&[S]> = lines.chunks(chunk_size).collect();
        let worker_count = self.config.workers.min(chunks.len());
        let cursor = AtomicUsize::new(0);
        let started = Instant::now();

        debug!(
            lines = lines.len(),
            chunks = chunks.len(),
            workers = worker_count,
            chunk_size,
            "starting aggregation"
        );

        let outcomes: Vec<Result<WorkerOutcome, usize>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..worker_count)
                .map(|_| {
                    let chunks = &chunks;
                    let cursor = &cursor;
                    let normalizer = &self.normalizer;
                    s.spawn(move || run_worker(chunks, cursor, normalizer, chunk_size))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(worker, handle)| handle.join().map_err(|_| worker))
                .collect()
        });

        let mut report = AggregateReport {
            lines_total: lines.len(),
            chunks: chunks.len(),
            ..AggregateReport::default()
        };
        let mut failures = Vec::new();

        for outcome in outcomes {
            let outcome = outcome.map_err(|worker| AggregateError::WorkerPanicked { worker })?;
            report.mapping.absorb(outcome.mapping);
            report.lines_counted += outcome.lines_counted;
            report.lines_discarded += outcome.lines_discarded;
            failures.extend(outcome.failures);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.chunk);
            warn!(
                failed = failures.len(),
                total = report.chunks,
                partial_templates = report.mapping.len(),
                elapsed_ms,
                "aggregation finished with failed chunks; completed chunk counts kept as a partial result"
            );
            return Err(AggregateError::ChunksFailed {
                failures,
                total_chunks: report.chunks,
                partial: Box::new(report),
            });
        }

        info!(
            lines = report.lines_total,
            counted = report.lines_counted,
            templates = report.mapping.len(),
            elapsed_ms,
            "aggregation complete"
        );
        Ok(report)
    }
}

/// Aggregate with default sizing and the built-in normalizer.
pub fn aggregate<S>(lines: &[S]) -> Result<FrequencyMapping, AggregateError>
where
    S: AsRef<str> + Sync,
{
    Aggregator::new(AggregateConfig::default())
        .run(lines)
        .map(|report| report.mapping)
}

fn run_worker<S, N>(
    chunks: &[&[S]],
    cursor: &AtomicUsize,
    normalizer: &N,
    chunk_size: usize,
) -> WorkerOutcome
where
    S: AsRef<str>,
    N: LineNormalizer + ?Sized,
{
    let mut outcome = WorkerOutcome::default();

    loop {
        let index = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(chunk) = chunks.get(index) else {
            break;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| count_chunk(chunk, normalizer))) {
            Ok(tally) => {
                outcome.mapping.absorb(tally.mapping);
                outcome.lines_counted += tally.counted;
                outcome.lines_discarded += tally.discarded;
            }
            Err(payload) => {
                let failure = ChunkFailure {
                    chunk: index,
                    first_line: index * chunk_size,
                    message: panic_message(payload.as_ref()),
                };
                warn!(
                    chunk = failure.chunk,
                    first_line = failure.first_line,
                    error = %failure.message,
                    "chunk failed"
                );
                outcome.failures.push(failure);
            }
        }
    }

    outcome
}

fn count_chunk<S, N>(chunk: &[S], normalizer: &N) -> ChunkTally
where
    S: AsRef<str>,
    N: LineNormalizer + ?Sized,
{
    let mut tally = ChunkTally::default();
    for line in chunk {
        match normalizer.normalize(line.as_ref()) {
            Some(template) => {
                tally.mapping.increment(template);
                tally.counted += 1;
            }
            None => tally.discarded += 1,
        }
    }
    tally
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
