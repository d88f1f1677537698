mod versioned_schema;

pub use versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

/// Offset applied to `PRAGMA user_version` so a ledger database is never
/// confused with an unrelated SQLite file that happens to be at version 0.
pub const BASE_DB_VERSION: usize = 271;
