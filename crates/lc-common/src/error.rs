//! Error types for Log Coverage.

use thiserror::Error;

/// Result type alias for Log Coverage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Log Coverage.
///
/// Module-level errors in `lc-core` and `lc-config` convert into this type at
/// the binary boundary so every failure carries a stable code.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Input errors (20-29)
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Aggregation errors (30-39)
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    #[error("{failed} of {total} chunks failed while aggregating")]
    PartialAggregation { failed: usize, total: usize },

    // Store errors (40-49)
    #[error("pattern store error: {0}")]
    Store(String),

    #[error("store schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { expected: i64, found: i64 },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidArgument(_) => 11,
            Error::Read { .. } => 20,
            Error::Aggregation(_) => 30,
            Error::PartialAggregation { .. } => 31,
            Error::Store(_) => 40,
            Error::SchemaMismatch { .. } => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
