//! Structured logging setup for the CLI.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Map net verbosity (`-v` count minus `-q` count) to a level. Default INFO.
pub fn level_for(verbosity: i16) -> LevelFilter {
    match verbosity {
        i16::MIN..=-3 => LevelFilter::OFF,
        -2 => LevelFilter::ERROR,
        -1 => LevelFilter::WARN,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr so stdout carries only the report. `RUST_LOG`
/// directives are honoured on top of the verbosity level. Calling this
/// twice is harmless.
pub fn init_logging(verbosity: i16, json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Ignore error if already set in tests
    let _ = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_steps_through_levels() {
        assert_eq!(level_for(0), LevelFilter::INFO);
        assert_eq!(level_for(1), LevelFilter::DEBUG);
        assert_eq!(level_for(5), LevelFilter::TRACE);
        assert_eq!(level_for(-1), LevelFilter::WARN);
        assert_eq!(level_for(-2), LevelFilter::ERROR);
        assert_eq!(level_for(-9), LevelFilter::OFF);
    }
}
