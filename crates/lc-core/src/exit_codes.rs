//! Exit codes for the logcov CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.

/// Exit codes for logcov operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed
    Clean = 0,

    /// Configuration or argument error
    ConfigError = 10,

    /// A log file could not be read
    InputError = 11,

    /// Aggregation failed (including partial results)
    AggregationError = 12,

    /// Pattern store error
    StoreError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map a failure to its exit code.
    pub fn for_error(err: &lc_common::Error) -> Self {
        use lc_common::Error;
        match err {
            Error::Config(_) | Error::InvalidArgument(_) => ExitCode::ConfigError,
            Error::Read { .. } => ExitCode::InputError,
            Error::Aggregation(_) | Error::PartialAggregation { .. } => {
                ExitCode::AggregationError
            }
            Error::Store(_) | Error::SchemaMismatch { .. } => ExitCode::StoreError,
            Error::Io(_) | Error::Json(_) => ExitCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_documented_codes() {
        let cases = [
            (lc_common::Error::Config("x".into()), 10),
            (lc_common::Error::InvalidArgument("x".into()), 10),
            (
                lc_common::Error::Read {
                    path: "a".into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                },
                11,
            ),
            (
                lc_common::Error::PartialAggregation {
                    failed: 1,
                    total: 2,
                },
                12,
            ),
            (lc_common::Error::Store("locked".into()), 13),
        ];
        for (err, code) in cases {
            assert_eq!(ExitCode::for_error(&err).as_i32(), code, "{err}");
        }
    }

    #[test]
    fn clean_and_internal_codes() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(
            ExitCode::for_error(&lc_common::Error::Io(std::io::Error::other("x"))).as_i32(),
            99
        );
    }
}
