//! logcov: template coverage between a reference log and a runtime log.

use clap::{Args, Parser, Subcommand};
use lc_common::{OutputFormat, Source};
use lc_config::{resolve_config, AnalyzerConfig, ConfigOverrides, ConfigPaths, DB_ENV};
use lc_core::aggregate::{AggregateConfig, Aggregator};
use lc_core::exit_codes::ExitCode;
use lc_core::input::read_lines;
use lc_core::logging::init_logging;
use lc_core::output::{self, CoverageReport};
use lc_core::store::{MergeOutcome, PatternStore};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

const DEFAULT_RUNS_LIMIT: i64 = 20;

#[derive(Parser, Debug)]
#[command(
    name = "logcov",
    version,
    about = "Normalize log lines into templates and report which reference templates a runtime log never produced"
)]
struct Cli {
    /// Pattern store database (overrides config and LOGCOV_DB)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (overrides LOGCOV_CONFIG and the user config)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv). Default INFO.
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq).
    #[arg(short = 'q', long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge the primary log (and optionally a secondary log), then report
    Analyze {
        /// Reference log whose templates should be covered
        primary: PathBuf,
        /// Runtime log checked against the reference
        secondary: Option<PathBuf>,
        #[command(flatten)]
        sizing: SizingArgs,
        /// Number of missing patterns to list
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },

    /// Report on the current store without ingesting anything
    Stats {
        /// Number of missing patterns to list
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },

    /// Merge a single log under one source
    Ingest {
        /// Which side of the comparison the file belongs to
        #[arg(long, value_enum)]
        source: Source,
        /// Log file to ingest
        file: PathBuf,
        #[command(flatten)]
        sizing: SizingArgs,
    },

    /// List recorded merges, newest first
    Runs {
        #[arg(long, default_value_t = DEFAULT_RUNS_LIMIT, allow_negative_numbers = true)]
        limit: i64,
    },
}

#[derive(Args, Debug, Default, Clone, Copy)]
struct SizingArgs {
    /// Lines per work unit
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    let verbosity = i16::from(cli.verbose) - i16::from(cli.quiet);
    init_logging(verbosity, cli.log_json);

    let code = match run(cli) {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::for_error(&err)
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: Cli) -> lc_common::Result<()> {
    let (sizing, limit) = match &cli.command {
        Command::Analyze { sizing, limit, .. } => (*sizing, *limit),
        Command::Stats { limit } => (SizingArgs::default(), *limit),
        Command::Ingest { sizing, .. } => (*sizing, None),
        Command::Runs { .. } => (SizingArgs::default(), None),
    };
    let overrides = ConfigOverrides {
        database: cli.db.clone(),
        chunk_size: sizing.chunk_size,
        workers: sizing.workers,
        missing_limit: limit,
    };
    let paths = ConfigPaths::discover(cli.config.clone());
    let db_env = std::env::var_os(DB_ENV).map(PathBuf::from);
    let config = resolve_config(&paths, db_env, &overrides)?;
    debug!(?config, "resolved configuration");

    let mut store = PatternStore::open(&config.database)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Analyze {
            primary, secondary, ..
        } => {
            let started = Instant::now();
            let aggregator = Aggregator::new(AggregateConfig::from(&config));
            ingest(&aggregator, &mut store, &primary, Source::Primary)?;
            if let Some(secondary) = &secondary {
                ingest(&aggregator, &mut store, secondary, Source::Secondary)?;
            }
            report(&store, &config, cli.format, &mut out)?;
            if cli.format == OutputFormat::Text {
                writeln!(
                    out,
                    "Total time: {:.3}s",
                    started.elapsed().as_secs_f64()
                )?;
            }
        }
        Command::Stats { .. } => report(&store, &config, cli.format, &mut out)?,
        Command::Ingest { source, file, .. } => {
            let aggregator = Aggregator::new(AggregateConfig::from(&config));
            let outcome = ingest(&aggregator, &mut store, &file, source)?;
            output::write_merge(&mut out, &outcome, &file.display().to_string(), cli.format)?;
        }
        Command::Runs { limit } => {
            let runs = store.recent_runs(limit)?;
            output::write_runs(&mut out, &runs, cli.format)?;
        }
    }

    out.flush()?;
    store.close()?;
    Ok(())
}

/// Read, aggregate, and merge one file. Nothing is merged if aggregation fails.
fn ingest(
    aggregator: &Aggregator,
    store: &mut PatternStore,
    path: &Path,
    source: Source,
) -> lc_common::Result<MergeOutcome> {
    info!(path = %path.display(), %source, "processing log");
    let lines = read_lines(path)?;
    let report = aggregator.run(&lines)?;
    info!(
        %source,
        templates = report.mapping.len(),
        discarded = report.lines_discarded,
        "found unique patterns"
    );
    let outcome = store.merge(source, &report.mapping)?;
    Ok(outcome)
}

fn report<W: Write>(
    store: &PatternStore,
    config: &AnalyzerConfig,
    format: OutputFormat,
    out: &mut W,
) -> lc_common::Result<()> {
    let summary = store.summarize()?;
    let missing = store.top_missing(config.missing_limit)?;
    let report = CoverageReport::new(summary, config.missing_limit, missing);
    output::write_report(out, &report, format)
}
