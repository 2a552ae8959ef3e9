//! Report and store schema versions.

/// Version carried by JSON reports. MAJOR changes when fields are removed or
/// change type; MINOR when fields are added.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Version stamped into the pattern store via `PRAGMA user_version`.
pub const STORE_SCHEMA_VERSION: i64 = 1;

/// Check whether a store stamped with `found` can be opened.
///
/// Zero means a fresh database that has not been stamped yet.
pub fn is_store_compatible(found: i64) -> bool {
    found == 0 || found == STORE_SCHEMA_VERSION
}
