mod versioned_schema;

pub use versioned_schema::*;

/// Offset applied to `PRAGMA user_version`, so a database stamped by another
/// tool is never mistaken for one of our schema versions.
pub const BASE_DB_VERSION: usize = 31000;
