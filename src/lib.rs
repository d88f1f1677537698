//! Canonical music catalog reconciliation.
//!
//! One SQLite-backed store holds canonical tracks, artists and collections;
//! platform crosswalk tables link canonical entities to the ids the
//! streaming platforms use for them. On top of the store sit a fuzzy
//! matching engine for resolving tracks against a platform search endpoint,
//! and export workflows that mirror the ledger outward.

pub mod export;
pub mod ledger_store;
pub mod matching;
pub mod sqlite_persistence;
