//! SQLite schema for the ledger database.
//!
//! Uniqueness invariants live in the schema itself: artists are unique by
//! name, collections by (name, type), a track's artist list is unique both
//! by artist and by order slot, and crosswalk rows are unique per
//! (platform, platform id). A future concurrent writer hits a constraint
//! error instead of silently corrupting the ledger.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const TRACK_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "track_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "artist_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const COLLECTION_FK: ForeignKey = ForeignKey {
    foreign_table: "collections",
    foreign_column: "collection_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// Canonical tracks. Never deleted by the core.
const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("isrc", &SqlType::Text),
        sqlite_column!("explicit", &SqlType::Integer),
        sqlite_column!("media_kind", &SqlType::Text, non_null = true),
        sqlite_column!("source_url", &SqlType::Text),
        sqlite_column!("canonical_platform", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_tracks_isrc", "isrc"),
        ("idx_tracks_created", "created_at"),
    ],
    unique_constraints: &[&["isrc"]],
};

/// Canonical artists, unique by exact trimmed name.
const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_artists_name", "name")],
    unique_constraints: &[],
};

/// Canonical collections, unique by (name, collection_type).
const COLLECTIONS_TABLE: Table = Table {
    name: "collections",
    columns: &[
        sqlite_column!("collection_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("collection_type", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_collections_type", "collection_type")],
    unique_constraints: &[&["name", "collection_type"]],
};

/// Ordered track -> artist links. Unique per (track, artist) and per
/// (track, order slot).
const TRACK_ARTISTS_TABLE: Table = Table {
    name: "track_artists",
    columns: &[
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("artist_order", &SqlType::Integer, non_null = true),
        sqlite_column!("role", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_track_artists_track", "track_id")],
    unique_constraints: &[&["track_id", "artist_id"], &["track_id", "artist_order"]],
};

/// Ordered collection -> track links. Unique per (collection, track);
/// positions are caller-supplied and may repeat across tracks.
const COLLECTION_ITEMS_TABLE: Table = Table {
    name: "collection_items",
    columns: &[
        sqlite_column!(
            "collection_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&COLLECTION_FK)
        ),
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "added_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_collection_items_collection", "collection_id")],
    unique_constraints: &[&["collection_id", "track_id"]],
};

/// Crosswalk: platform-native track id -> canonical track.
const PLATFORM_TRACKS_TABLE: Table = Table {
    name: "platform_tracks",
    columns: &[
        sqlite_column!("platform", &SqlType::Text, non_null = true),
        sqlite_column!("platform_track_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("match_confidence", &SqlType::Real),
        sqlite_column!("match_method", &SqlType::Text),
        sqlite_column!("raw_json", &SqlType::Text),
        sqlite_column!("url", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "last_verified_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_platform_tracks_track", "track_id")],
    unique_constraints: &[&["platform", "platform_track_id"]],
};

/// Crosswalk: platform-native artist id -> canonical artist.
const PLATFORM_ARTISTS_TABLE: Table = Table {
    name: "platform_artists",
    columns: &[
        sqlite_column!("platform", &SqlType::Text, non_null = true),
        sqlite_column!("platform_artist_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("match_confidence", &SqlType::Real),
        sqlite_column!("match_method", &SqlType::Text),
        sqlite_column!("raw_json", &SqlType::Text),
        sqlite_column!("url", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "last_verified_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_platform_artists_artist", "artist_id")],
    unique_constraints: &[&["platform", "platform_artist_id"]],
};

/// Crosswalk: platform-native collection id -> canonical collection.
const PLATFORM_COLLECTIONS_TABLE: Table = Table {
    name: "platform_collections",
    columns: &[
        sqlite_column!("platform", &SqlType::Text, non_null = true),
        sqlite_column!("platform_collection_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "collection_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&COLLECTION_FK)
        ),
        sqlite_column!("match_confidence", &SqlType::Real),
        sqlite_column!("match_method", &SqlType::Text),
        sqlite_column!("raw_json", &SqlType::Text),
        sqlite_column!("url", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "last_verified_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_platform_collections_collection", "collection_id")],
    unique_constraints: &[&["platform", "platform_collection_id"]],
};

pub const LEDGER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        TRACKS_TABLE,
        ARTISTS_TABLE,
        COLLECTIONS_TABLE,
        TRACK_ARTISTS_TABLE,
        COLLECTION_ITEMS_TABLE,
        PLATFORM_TRACKS_TABLE,
        PLATFORM_ARTISTS_TABLE,
        PLATFORM_COLLECTIONS_TABLE,
    ],
    migration: None,
}];
