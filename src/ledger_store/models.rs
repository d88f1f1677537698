//! Canonical ledger entities and the input records resolvers accept.
//!
//! Canonical ids are opaque UUID strings minted once per entity and never
//! reused. All timestamps are unix seconds (UTC).

use serde::{Deserialize, Serialize};

/// Sentinel used when an empty artist name is resolved under
/// [`ArtistNamePolicy::Sentinel`].
pub const UNKNOWN_ARTIST: &str = "UNKNOWN ARTIST";

/// What a resolver does with an empty or whitespace-only artist name.
///
/// This is an explicit per-call decision, not a store-wide default: bulk
/// ingesters typically pick `Sentinel` so one nameless credit does not abort
/// a page, anything validating user input picks `Strict`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArtistNamePolicy {
    /// Reject the resolution with a validation error.
    Strict,
    /// Coerce the name to [`UNKNOWN_ARTIST`].
    Sentinel,
}

/// Media kind of a canonical track.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    Song,
    Video,
}

impl MediaKind {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "video" => MediaKind::Video,
            _ => MediaKind::Song,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MediaKind::Song => "song",
            MediaKind::Video => "video",
        }
    }
}

/// A canonical track.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub album: Option<String>,
    pub duration_ms: Option<i64>,
    pub isrc: Option<String>,
    pub explicit: Option<bool>,
    pub media_kind: MediaKind,
    pub source_url: Option<String>,
    /// Platform the canonical metadata was originally sourced from.
    pub canonical_platform: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted by `resolve_track`. Only `title` is required.
#[derive(Clone, Debug, Default)]
pub struct TrackInput {
    pub title: String,
    pub album: Option<String>,
    pub duration_ms: Option<i64>,
    pub isrc: Option<String>,
    pub explicit: Option<bool>,
    pub media_kind: MediaKind,
    pub source_url: Option<String>,
    pub canonical_platform: Option<String>,
}

/// A canonical artist. Immutable after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// A canonical collection (playlist, liked-tracks bucket, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub collection_type: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted by `resolve_collection`.
#[derive(Clone, Debug, Default)]
pub struct CollectionInput {
    pub name: String,
    pub collection_type: String,
    pub description: Option<String>,
}

/// One entry of a track's ordered artist list.
#[derive(Clone, Debug)]
pub struct TrackArtistEntry {
    pub artist: Artist,
    pub artist_order: i64,
    pub role: String,
}

/// One entry of a collection's ordered track list.
#[derive(Clone, Debug)]
pub struct CollectionEntry {
    pub track: Track,
    pub position: i64,
    pub added_at: i64,
}

/// A collection entry joined with its crosswalk row for one platform, used
/// when materializing a collection for export.
#[derive(Clone, Debug)]
pub struct MappedCollectionEntry {
    pub track_id: String,
    pub title: String,
    pub position: i64,
    /// Platform-native track id, if the track has a crosswalk row.
    pub platform_track_id: Option<String>,
}

/// Optional provenance carried by a crosswalk observation. Absent fields
/// never erase previously recorded values on merge.
#[derive(Clone, Debug, Default)]
pub struct MappingExtra {
    /// Match confidence in [0, 1].
    pub confidence: Option<f64>,
    /// How the mapping was established (e.g. "platform_id", "search").
    pub method: Option<String>,
    /// Raw platform payload the mapping was derived from.
    pub raw: Option<serde_json::Value>,
    /// Canonical URL of the entity on the platform.
    pub url: Option<String>,
}

/// A platform crosswalk row linking a platform-native id to a canonical id.
#[derive(Clone, Debug)]
pub struct PlatformMapping {
    pub platform: String,
    pub platform_id: String,
    pub canonical_id: String,
    pub confidence: Option<f64>,
    pub method: Option<String>,
    pub raw: Option<serde_json::Value>,
    pub url: Option<String>,
    pub created_at: i64,
    pub last_verified_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_db_round_trip() {
        assert_eq!(MediaKind::from_db_str("song"), MediaKind::Song);
        assert_eq!(MediaKind::from_db_str("video"), MediaKind::Video);
        // Unknown values degrade to the default kind
        assert_eq!(MediaKind::from_db_str("podcast"), MediaKind::Song);
        assert_eq!(MediaKind::Video.to_db_str(), "video");
    }
}
