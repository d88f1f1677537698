mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{
    Artist, ArtistNamePolicy, Collection, CollectionEntry, CollectionInput, MappedCollectionEntry,
    MappingExtra, MediaKind, PlatformMapping, Track, TrackArtistEntry, TrackInput, UNKNOWN_ARTIST,
};
pub use store::SqliteLedgerStore;
pub use trait_def::LedgerStore;

use thiserror::Error;

/// Validation failures: rejected fast, with no partial state change.
///
/// Identity conflicts are never errors; they are resolved by the upsert
/// rules of the store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} is required")]
    EmptyField(&'static str),
    #[error("artist_order must be >= 0, got {0}")]
    NegativeOrder(i64),
    #[error("position must be >= 0, got {0}")]
    NegativePosition(i64),
    #[error("limit must be > 0")]
    InvalidLimit,
    #[error("match confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}
