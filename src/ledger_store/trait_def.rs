//! LedgerStore trait definition.
//!
//! Abstracts the canonical store so workflows (and their tests) can run
//! against any backend. `SqliteLedgerStore` is the production
//! implementation.

use anyhow::Result;

use super::models::{
    Artist, ArtistNamePolicy, Collection, CollectionEntry, CollectionInput, MappedCollectionEntry,
    MappingExtra, MediaKind, PlatformMapping, Track, TrackArtistEntry, TrackInput,
};

pub trait LedgerStore: Send + Sync {
    // =========================================================================
    // Identity resolution
    // =========================================================================

    /// Map an artist name onto a canonical id, creating the artist on first
    /// sight. Name handling for empty input follows `policy`.
    fn resolve_artist(&self, name: &str, policy: ArtistNamePolicy) -> Result<String>;

    /// Map a (name, type) pair onto a canonical collection id. A supplied
    /// description overwrites the stored one on a hit.
    fn resolve_collection(&self, input: &CollectionInput) -> Result<String>;

    /// Map a track description onto a canonical id. An ISRC hit reuses the
    /// existing id and replaces all mutable fields; otherwise a new track is
    /// created (`id_override` fixes the minted id, for tests and backfill).
    fn resolve_track(&self, input: &TrackInput, id_override: Option<&str>) -> Result<String>;

    fn get_artist(&self, artist_id: &str) -> Result<Option<Artist>>;
    fn get_collection(&self, collection_id: &str) -> Result<Option<Collection>>;
    fn get_track(&self, track_id: &str) -> Result<Option<Track>>;
    fn get_track_by_isrc(&self, isrc: &str) -> Result<Option<Track>>;

    // =========================================================================
    // Ordered relationships
    // =========================================================================

    /// Place `artist_id` at `artist_order` in the track's artist list,
    /// displacing any previous occupant of that slot and any previous slot of
    /// the same artist.
    fn attach_artist(
        &self,
        track_id: &str,
        artist_id: &str,
        artist_order: i64,
        role: &str,
    ) -> Result<()>;

    /// The track's artist list, ascending by order slot.
    fn artists_for_track(&self, track_id: &str) -> Result<Vec<TrackArtistEntry>>;

    /// Remove every artist link of the track (used before a full re-import).
    fn clear_track_artists(&self, track_id: &str) -> Result<()>;

    /// Add a track to a collection at `position`, or move it there if
    /// already a member. `added_at` overwrites only when supplied.
    fn add_to_collection(
        &self,
        collection_id: &str,
        track_id: &str,
        position: i64,
        added_at: Option<i64>,
    ) -> Result<()>;

    /// Remove a track from a collection; no-op if it is not a member.
    fn remove_from_collection(&self, collection_id: &str, track_id: &str) -> Result<()>;

    /// The collection's track list, ascending by position.
    fn collection_items(&self, collection_id: &str) -> Result<Vec<CollectionEntry>>;

    // =========================================================================
    // Platform crosswalk
    // =========================================================================

    /// Record that `platform_track_id` on `platform` maps to canonical
    /// `track_id`. Idempotent upsert: canonical id is last-write-wins,
    /// provenance fields merge without erasing earlier values.
    fn record_track_mapping(
        &self,
        platform: &str,
        platform_track_id: &str,
        track_id: &str,
        extra: &MappingExtra,
    ) -> Result<()>;

    fn record_artist_mapping(
        &self,
        platform: &str,
        platform_artist_id: &str,
        artist_id: &str,
        extra: &MappingExtra,
    ) -> Result<()>;

    fn record_collection_mapping(
        &self,
        platform: &str,
        platform_collection_id: &str,
        collection_id: &str,
        extra: &MappingExtra,
    ) -> Result<()>;

    /// The crosswalk row of a canonical track on `platform`, if any.
    fn track_mapping(&self, platform: &str, track_id: &str) -> Result<Option<PlatformMapping>>;

    /// The crosswalk row of a canonical collection on `platform`, if any.
    fn collection_mapping(
        &self,
        platform: &str,
        collection_id: &str,
    ) -> Result<Option<PlatformMapping>>;

    /// Canonical tracks with no crosswalk row on `platform`, oldest first.
    /// `limit` must be > 0.
    fn tracks_missing_mapping(
        &self,
        platform: &str,
        media_kind: Option<MediaKind>,
        limit: usize,
    ) -> Result<Vec<Track>>;

    // =========================================================================
    // Export support
    // =========================================================================

    /// Collections, most recently updated first, optionally filtered by
    /// type. `limit` must be > 0.
    fn list_collections(
        &self,
        collection_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Collection>>;

    /// The collection's track list joined with the `platform` crosswalk,
    /// ascending by position. Unmapped tracks carry no platform id.
    fn collection_items_with_mapping(
        &self,
        collection_id: &str,
        platform: &str,
    ) -> Result<Vec<MappedCollectionEntry>>;
}
