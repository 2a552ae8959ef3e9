//! Config resolution: CLI → env → XDG → defaults.

use crate::analyzer::{AnalyzerConfig, ConfigError};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LOGCOV_CONFIG";

/// Environment variable overriding the pattern store path.
pub const DB_ENV: &str = "LOGCOV_DB";

const CONFIG_DIR_NAME: &str = "logcov";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Where configuration may come from, in priority order.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// `--config` on the command line.
    pub explicit: Option<PathBuf>,
    /// Value of [`CONFIG_ENV`].
    pub env: Option<PathBuf>,
    /// `<config_dir>/logcov/config.toml`, used only if it exists.
    pub user: Option<PathBuf>,
}

impl ConfigPaths {
    /// Collect candidate paths from the CLI value, environment, and XDG dir.
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env: std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            user: dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
        }
    }

    /// First configured file. Explicit and env paths must exist; the XDG
    /// path is optional.
    fn selected(&self) -> Option<PathBuf> {
        if let Some(path) = self.explicit.as_ref().or(self.env.as_ref()) {
            return Some(path.clone());
        }
        self.user.as_ref().filter(|p| p.is_file()).cloned()
    }
}

/// Values supplied on the command line, applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub workers: Option<usize>,
    pub missing_limit: Option<i64>,
}

/// Resolve the effective configuration.
///
/// The chosen file (if any) is loaded, `LOGCOV_DB` replaces the database
/// path, CLI overrides are applied, and the result is validated.
pub fn resolve_config(
    paths: &ConfigPaths,
    db_env: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<AnalyzerConfig, ConfigError> {
    let mut config = match paths.selected() {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            AnalyzerConfig::from_file(&path)?
        }
        None => {
            debug!("no config file found, using defaults");
            AnalyzerConfig::default()
        }
    };

    if let Some(db) = db_env {
        config.database = db;
    }
    if let Some(db) = &overrides.database {
        config.database = db.clone();
    }
    if let Some(chunk_size) = overrides.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(workers) = overrides.workers {
        config.workers = Some(workers);
    }
    if let Some(limit) = overrides.missing_limit {
        config.missing_limit = limit;
    }

    config.validate()?;
    Ok(config)
}
