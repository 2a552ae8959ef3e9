//! Log Coverage common types and errors.
//!
//! This crate provides the vocabulary shared by the config and core crates:
//! - The [`Source`] tag selecting which side of the differential a run feeds
//! - Output format selection for reports
//! - The unified error type with stable numeric codes
//! - Store schema versioning

pub mod error;
pub mod output;
pub mod schema;
pub mod source;

pub use error::{Error, Result};
pub use output::OutputFormat;
pub use schema::{SCHEMA_VERSION, STORE_SCHEMA_VERSION};
pub use source::Source;
