//! Analyzer configuration types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of lines handed to one worker as a unit of work.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default number of missing patterns listed in a report.
pub const DEFAULT_MISSING_LIMIT: i64 = 50;

/// Default pattern store file, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "log_messages.db";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,

    #[error("workers must be at least 1 when set")]
    ZeroWorkers,

    #[error("missing_limit must not be negative, got {0}")]
    NegativeLimit(i64),
}

impl From<ConfigError> for lc_common::Error {
    fn from(err: ConfigError) -> Self {
        lc_common::Error::Config(err.to_string())
    }
}

/// Complete analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Path of the SQLite pattern store.
    pub database: PathBuf,

    /// Lines per chunk of parallel work.
    pub chunk_size: usize,

    /// Worker pool size; `None` uses the host's available parallelism.
    pub workers: Option<usize>,

    /// How many primary-only patterns a report lists.
    pub missing_limit: i64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: None,
            missing_limit: DEFAULT_MISSING_LIMIT,
        }
    }
}

impl AnalyzerConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.missing_limit < 0 {
            return Err(ConfigError::NegativeLimit(self.missing_limit));
        }
        Ok(())
    }

    /// Worker count to use, falling back to host parallelism.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.missing_limit, 50);
        assert_eq!(config.database, PathBuf::from("log_messages.db"));
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config =
            AnalyzerConfig::from_toml_str("chunk_size = 500\n", Path::new("inline.toml")).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.missing_limit, DEFAULT_MISSING_LIMIT);
        assert_eq!(config.workers, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AnalyzerConfig::from_toml_str("chunk = 5\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn validation_rejects_degenerate_values() {
        let mut config = AnalyzerConfig {
            chunk_size: 0,
            ..AnalyzerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroChunkSize)));

        config.chunk_size = 10;
        config.workers = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWorkers)));

        config.workers = Some(2);
        config.missing_limit = -1;
        assert!(matches!(config.validate(), Err(ConfigError::NegativeLimit(-1))));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database = \"patterns.db\"\nworkers = 3\n").unwrap();
        let config = AnalyzerConfig::from_file(&path).unwrap();
        assert_eq!(config.database, PathBuf::from("patterns.db"));
        assert_eq!(config.effective_workers(), 3);

        std::fs::write(&path, "chunk_size = 0\n").unwrap();
        assert!(AnalyzerConfig::from_file(&path).is_err());
    }
}
