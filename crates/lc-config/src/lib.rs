//! Log Coverage configuration loading and validation.
//!
//! This crate provides:
//! - The typed [`AnalyzerConfig`] read from `config.toml`
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod analyzer;
pub mod resolve;

pub use analyzer::{AnalyzerConfig, ConfigError};
pub use resolve::{resolve_config, ConfigOverrides, ConfigPaths, CONFIG_ENV, DB_ENV};
