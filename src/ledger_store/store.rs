//! SQLite-backed ledger store implementation.

use super::models::{
    Artist, ArtistNamePolicy, Collection, CollectionEntry, CollectionInput, MappedCollectionEntry,
    MappingExtra, MediaKind, PlatformMapping, Track, TrackArtistEntry, TrackInput, UNKNOWN_ARTIST,
};
use super::schema::LEDGER_VERSIONED_SCHEMAS;
use super::trait_def::LedgerStore;
use super::LedgerError;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// SQLite-backed canonical store.
///
/// Single connection behind a mutex: the reconciliation layer is a
/// sequential single-writer by design, and the uniqueness invariants are
/// additionally enforced by schema constraints.
#[derive(Clone)]
pub struct SqliteLedgerStore {
    conn: Arc<Mutex<Connection>>,
}

fn init_schema(conn: &Connection) -> Result<()> {
    let latest = &LEDGER_VERSIONED_SCHEMAS[LEDGER_VERSIONED_SCHEMAS.len() - 1];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating ledger db schema at version {}", latest.version);
        latest.create(conn)?;
        return Ok(());
    }

    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if db_version != (BASE_DB_VERSION + latest.version) as i64 {
        bail!("Unknown ledger database version {}", db_version);
    }
    latest.validate(conn)
}

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn bool_to_int(v: Option<bool>) -> Option<i64> {
    v.map(|b| if b { 1 } else { 0 })
}

fn int_to_bool(v: Option<i64>) -> Option<bool> {
    v.map(|i| i != 0)
}

fn raw_json_to_text(raw: &Option<serde_json::Value>) -> Result<Option<String>> {
    raw.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to serialize raw provenance payload")
}

fn text_to_raw_json(text: Option<String>) -> Option<serde_json::Value> {
    text.and_then(|json| match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Malformed raw_json in ledger db: {}", e);
            None
        }
    })
}

/// Trim `value`, rejecting empty input with a validation error.
fn required_trimmed<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyField(field).into());
    }
    Ok(trimmed)
}

const TRACK_COLUMNS: &str = "track_id, title, album, duration_ms, isrc, explicit, \
     media_kind, source_url, canonical_platform, created_at, updated_at";

// Qualified variant for queries that join tables sharing column names
const TRACK_COLUMNS_T: &str = "t.track_id, t.title, t.album, t.duration_ms, t.isrc, t.explicit, \
     t.media_kind, t.source_url, t.canonical_platform, t.created_at, t.updated_at";

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        album: row.get(2)?,
        duration_ms: row.get(3)?,
        isrc: row.get(4)?,
        explicit: int_to_bool(row.get(5)?),
        media_kind: MediaKind::from_db_str(&row.get::<_, String>(6)?),
        source_url: row.get(7)?,
        canonical_platform: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn collection_from_row(row: &Row) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        collection_type: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn mapping_from_row(row: &Row) -> rusqlite::Result<PlatformMapping> {
    Ok(PlatformMapping {
        platform: row.get(0)?,
        platform_id: row.get(1)?,
        canonical_id: row.get(2)?,
        confidence: row.get(3)?,
        method: row.get(4)?,
        raw: text_to_raw_json(row.get(5)?),
        url: row.get(6)?,
        created_at: row.get(7)?,
        last_verified_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl SqliteLedgerStore {
    /// Open (or create) a ledger database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open ledger database")?;

        init_schema(&conn)?;

        // Foreign key enforcement is per-connection in SQLite
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on ledger database")?;
        // FULL survives power loss on synced/cloud filesystems
        conn.pragma_update(None, "synchronous", "FULL")?;

        let track_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))
            .unwrap_or(0);
        let artist_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap_or(0);
        let collection_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM collections", [], |r| r.get(0))
            .unwrap_or(0);

        info!(
            "Ledger store ready: {} tracks, {} artists, {} collections",
            track_count, artist_count, collection_count
        );

        Ok(SqliteLedgerStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared crosswalk upsert: canonical id is last-write-wins, provenance
    /// fields merge with COALESCE so a later partial observation never
    /// erases a previously recorded value.
    fn record_mapping(
        &self,
        table: &str,
        platform_id_column: &str,
        canonical_column: &str,
        platform: &str,
        platform_id: &str,
        canonical_id: &str,
        extra: &MappingExtra,
    ) -> Result<()> {
        let platform = required_trimmed(platform, "platform")?;
        let platform_id = required_trimmed(platform_id, "platform id")?;
        if let Some(confidence) = extra.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(LedgerError::ConfidenceOutOfRange(confidence).into());
            }
        }
        let raw = raw_json_to_text(&extra.raw)?;

        let sql = format!(
            "INSERT INTO {table} (
                platform, {pid}, {cid},
                match_confidence, match_method, raw_json, url,
                created_at, last_verified_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?8)
            ON CONFLICT(platform, {pid}) DO UPDATE SET
                {cid} = excluded.{cid},
                match_confidence = COALESCE(excluded.match_confidence, {table}.match_confidence),
                match_method = COALESCE(excluded.match_method, {table}.match_method),
                raw_json = COALESCE(excluded.raw_json, {table}.raw_json),
                url = COALESCE(excluded.url, {table}.url),
                last_verified_at = excluded.last_verified_at,
                updated_at = excluded.updated_at",
            table = table,
            pid = platform_id_column,
            cid = canonical_column,
        );

        let conn = self.conn.lock().unwrap();
        conn.prepare_cached(&sql)?.execute(params![
            platform,
            platform_id,
            canonical_id,
            extra.confidence,
            extra.method,
            raw,
            extra.url,
            now_ts(),
        ])?;
        Ok(())
    }

    fn mapping_for_canonical(
        &self,
        table: &str,
        platform_id_column: &str,
        canonical_column: &str,
        platform: &str,
        canonical_id: &str,
    ) -> Result<Option<PlatformMapping>> {
        let sql = format!(
            "SELECT platform, {pid}, {cid}, match_confidence, match_method, raw_json, url,
                    created_at, last_verified_at, updated_at
             FROM {table}
             WHERE platform = ?1 AND {cid} = ?2
             ORDER BY updated_at DESC, rowid DESC
             LIMIT 1",
            table = table,
            pid = platform_id_column,
            cid = canonical_column,
        );
        let conn = self.conn.lock().unwrap();
        let mapping = conn
            .prepare_cached(&sql)?
            .query_row(params![platform, canonical_id], mapping_from_row)
            .optional()?;
        Ok(mapping)
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn resolve_artist(&self, name: &str, policy: ArtistNamePolicy) -> Result<String> {
        let trimmed = name.trim();
        let name = if trimmed.is_empty() {
            match policy {
                ArtistNamePolicy::Strict => {
                    return Err(LedgerError::EmptyField("artist name").into())
                }
                ArtistNamePolicy::Sentinel => UNKNOWN_ARTIST,
            }
        } else {
            trimmed
        };

        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .prepare_cached("SELECT artist_id FROM artists WHERE name = ?1")?
            .query_row(params![name], |r| r.get(0))
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = new_uid();
        conn.prepare_cached("INSERT INTO artists (artist_id, name, created_at) VALUES (?1, ?2, ?3)")?
            .execute(params![id, name, now_ts()])
            .with_context(|| format!("Failed to create artist {}", name))?;
        Ok(id)
    }

    fn resolve_collection(&self, input: &CollectionInput) -> Result<String> {
        let name = required_trimmed(&input.name, "collection name")?;
        let ctype = required_trimmed(&input.collection_type, "collection_type")?;

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        let existing: Option<String> = tx
            .prepare_cached(
                "SELECT collection_id FROM collections WHERE name = ?1 AND collection_type = ?2",
            )?
            .query_row(params![name, ctype], |r| r.get(0))
            .optional()?;

        if let Some(id) = existing {
            if let Some(description) = &input.description {
                tx.prepare_cached(
                    "UPDATE collections SET description = ?1, updated_at = ?2
                     WHERE collection_id = ?3",
                )?
                .execute(params![description, now_ts(), id])?;
            }
            tx.commit()?;
            return Ok(id);
        }

        let id = new_uid();
        let now = now_ts();
        tx.prepare_cached(
            "INSERT INTO collections (collection_id, name, collection_type, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )?
        .execute(params![id, name, ctype, input.description, now])?;
        tx.commit()?;
        Ok(id)
    }

    fn resolve_track(&self, input: &TrackInput, id_override: Option<&str>) -> Result<String> {
        let title = required_trimmed(&input.title, "track title")?;
        let isrc = input
            .isrc
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        let existing: Option<String> = match isrc {
            Some(isrc) => tx
                .prepare_cached("SELECT track_id FROM tracks WHERE isrc = ?1")?
                .query_row(params![isrc], |r| r.get(0))
                .optional()?,
            None => None,
        };

        let id = if let Some(id) = existing {
            // Replace-on-isrc-match: every mutable field takes the new value
            tx.prepare_cached(
                "UPDATE tracks
                 SET title = ?1, album = ?2, duration_ms = ?3, explicit = ?4,
                     media_kind = ?5, source_url = ?6, canonical_platform = ?7,
                     updated_at = ?8
                 WHERE track_id = ?9",
            )?
            .execute(params![
                title,
                input.album,
                input.duration_ms,
                bool_to_int(input.explicit),
                input.media_kind.to_db_str(),
                input.source_url,
                input.canonical_platform,
                now_ts(),
                id,
            ])?;
            id
        } else {
            let id = id_override.map(str::to_string).unwrap_or_else(new_uid);
            let now = now_ts();
            tx.prepare_cached(
                "INSERT INTO tracks (
                    track_id, title, album, duration_ms, isrc, explicit,
                    media_kind, source_url, canonical_platform, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            )?
            .execute(params![
                id,
                title,
                input.album,
                input.duration_ms,
                isrc,
                bool_to_int(input.explicit),
                input.media_kind.to_db_str(),
                input.source_url,
                input.canonical_platform,
                now,
            ])?;
            id
        };

        tx.commit()?;
        Ok(id)
    }

    fn get_artist(&self, artist_id: &str) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        let artist = conn
            .prepare_cached("SELECT artist_id, name, created_at FROM artists WHERE artist_id = ?1")?
            .query_row(params![artist_id], |row| {
                Ok(Artist {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .optional()?;
        Ok(artist)
    }

    fn get_collection(&self, collection_id: &str) -> Result<Option<Collection>> {
        let conn = self.conn.lock().unwrap();
        let collection = conn
            .prepare_cached(
                "SELECT collection_id, name, collection_type, description, created_at, updated_at
                 FROM collections WHERE collection_id = ?1",
            )?
            .query_row(params![collection_id], collection_from_row)
            .optional()?;
        Ok(collection)
    }

    fn get_track(&self, track_id: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let track = conn
            .prepare_cached(&format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE track_id = ?1"
            ))?
            .query_row(params![track_id], track_from_row)
            .optional()?;
        Ok(track)
    }

    fn get_track_by_isrc(&self, isrc: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let track = conn
            .prepare_cached(&format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE isrc = ?1"
            ))?
            .query_row(params![isrc], track_from_row)
            .optional()?;
        Ok(track)
    }

    fn attach_artist(
        &self,
        track_id: &str,
        artist_id: &str,
        artist_order: i64,
        role: &str,
    ) -> Result<()> {
        if artist_order < 0 {
            return Err(LedgerError::NegativeOrder(artist_order).into());
        }
        let role = required_trimmed(role, "role")?;

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        // Strategy (a): drop any previous slot of this artist first, then
        // upsert by order slot, displacing whoever held it.
        tx.prepare_cached("DELETE FROM track_artists WHERE track_id = ?1 AND artist_id = ?2")?
            .execute(params![track_id, artist_id])?;

        tx.prepare_cached(
            "INSERT INTO track_artists (track_id, artist_id, artist_order, role)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(track_id, artist_order) DO UPDATE SET
                 artist_id = excluded.artist_id,
                 role = excluded.role",
        )?
        .execute(params![track_id, artist_id, artist_order, role])?;

        tx.commit()?;
        Ok(())
    }

    fn artists_for_track(&self, track_id: &str) -> Result<Vec<TrackArtistEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT a.artist_id, a.name, a.created_at, ta.artist_order, ta.role
             FROM track_artists ta
             JOIN artists a ON a.artist_id = ta.artist_id
             WHERE ta.track_id = ?1
             ORDER BY ta.artist_order ASC",
        )?;
        let entries = stmt
            .query_map(params![track_id], |row| {
                Ok(TrackArtistEntry {
                    artist: Artist {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    },
                    artist_order: row.get(3)?,
                    role: row.get(4)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(entries)
    }

    fn clear_track_artists(&self, track_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.prepare_cached("DELETE FROM track_artists WHERE track_id = ?1")?
            .execute(params![track_id])?;
        Ok(())
    }

    fn add_to_collection(
        &self,
        collection_id: &str,
        track_id: &str,
        position: i64,
        added_at: Option<i64>,
    ) -> Result<()> {
        if position < 0 {
            return Err(LedgerError::NegativePosition(position).into());
        }

        let conn = self.conn.lock().unwrap();
        conn.prepare_cached(
            "INSERT INTO collection_items (collection_id, track_id, position, added_at)
             VALUES (?1, ?2, ?3, COALESCE(?4, ?5))
             ON CONFLICT(collection_id, track_id) DO UPDATE SET
                 position = excluded.position,
                 added_at = COALESCE(?4, collection_items.added_at)",
        )?
        .execute(params![collection_id, track_id, position, added_at, now_ts()])?;
        Ok(())
    }

    fn remove_from_collection(&self, collection_id: &str, track_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.prepare_cached(
            "DELETE FROM collection_items WHERE collection_id = ?1 AND track_id = ?2",
        )?
        .execute(params![collection_id, track_id])?;
        Ok(())
    }

    fn collection_items(&self, collection_id: &str) -> Result<Vec<CollectionEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TRACK_COLUMNS_T}, ci.position, ci.added_at
             FROM collection_items ci
             JOIN tracks t ON t.track_id = ci.track_id
             WHERE ci.collection_id = ?1
             ORDER BY ci.position ASC"
        ))?;
        let entries = stmt
            .query_map(params![collection_id], |row| {
                Ok(CollectionEntry {
                    track: track_from_row(row)?,
                    position: row.get(11)?,
                    added_at: row.get(12)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(entries)
    }

    fn record_track_mapping(
        &self,
        platform: &str,
        platform_track_id: &str,
        track_id: &str,
        extra: &MappingExtra,
    ) -> Result<()> {
        self.record_mapping(
            "platform_tracks",
            "platform_track_id",
            "track_id",
            platform,
            platform_track_id,
            track_id,
            extra,
        )
    }

    fn record_artist_mapping(
        &self,
        platform: &str,
        platform_artist_id: &str,
        artist_id: &str,
        extra: &MappingExtra,
    ) -> Result<()> {
        self.record_mapping(
            "platform_artists",
            "platform_artist_id",
            "artist_id",
            platform,
            platform_artist_id,
            artist_id,
            extra,
        )
    }

    fn record_collection_mapping(
        &self,
        platform: &str,
        platform_collection_id: &str,
        collection_id: &str,
        extra: &MappingExtra,
    ) -> Result<()> {
        self.record_mapping(
            "platform_collections",
            "platform_collection_id",
            "collection_id",
            platform,
            platform_collection_id,
            collection_id,
            extra,
        )
    }

    fn track_mapping(&self, platform: &str, track_id: &str) -> Result<Option<PlatformMapping>> {
        self.mapping_for_canonical(
            "platform_tracks",
            "platform_track_id",
            "track_id",
            platform,
            track_id,
        )
    }

    fn collection_mapping(
        &self,
        platform: &str,
        collection_id: &str,
    ) -> Result<Option<PlatformMapping>> {
        self.mapping_for_canonical(
            "platform_collections",
            "platform_collection_id",
            "collection_id",
            platform,
            collection_id,
        )
    }

    fn tracks_missing_mapping(
        &self,
        platform: &str,
        media_kind: Option<MediaKind>,
        limit: usize,
    ) -> Result<Vec<Track>> {
        if limit == 0 {
            return Err(LedgerError::InvalidLimit.into());
        }

        let conn = self.conn.lock().unwrap();
        // rowid breaks created_at ties (one-second resolution) in insertion order
        let tracks = match media_kind {
            Some(kind) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {TRACK_COLUMNS} FROM tracks t
                     WHERE NOT EXISTS (
                         SELECT 1 FROM platform_tracks pt
                         WHERE pt.track_id = t.track_id AND pt.platform = ?1
                     )
                     AND t.media_kind = ?2
                     ORDER BY t.created_at ASC, t.rowid ASC
                     LIMIT ?3"
                ))?;
                let rows = stmt
                    .query_map(
                        params![platform, kind.to_db_str(), limit as i64],
                        track_from_row,
                    )?
                    .collect::<Result<_, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {TRACK_COLUMNS} FROM tracks t
                     WHERE NOT EXISTS (
                         SELECT 1 FROM platform_tracks pt
                         WHERE pt.track_id = t.track_id AND pt.platform = ?1
                     )
                     ORDER BY t.created_at ASC, t.rowid ASC
                     LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![platform, limit as i64], track_from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
        };
        Ok(tracks)
    }

    fn list_collections(
        &self,
        collection_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Collection>> {
        if limit == 0 {
            return Err(LedgerError::InvalidLimit.into());
        }

        let conn = self.conn.lock().unwrap();
        let collections = match collection_type {
            Some(ctype) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT collection_id, name, collection_type, description, created_at, updated_at
                     FROM collections
                     WHERE collection_type = ?1
                     ORDER BY updated_at DESC, rowid DESC
                     LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![ctype.trim(), limit as i64], collection_from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare_cached(
                    "SELECT collection_id, name, collection_type, description, created_at, updated_at
                     FROM collections
                     ORDER BY updated_at DESC, rowid DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit as i64], collection_from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
        };
        Ok(collections)
    }

    fn collection_items_with_mapping(
        &self,
        collection_id: &str,
        platform: &str,
    ) -> Result<Vec<MappedCollectionEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT t.track_id, t.title, ci.position, pt.platform_track_id
             FROM collection_items ci
             JOIN tracks t ON t.track_id = ci.track_id
             LEFT JOIN platform_tracks pt
                 ON pt.track_id = t.track_id AND pt.platform = ?2
             WHERE ci.collection_id = ?1
             ORDER BY ci.position ASC",
        )?;
        let entries = stmt
            .query_map(params![collection_id, platform], |row| {
                Ok(MappedCollectionEntry {
                    track_id: row.get(0)?,
                    title: row.get(1)?,
                    position: row.get(2)?,
                    platform_track_id: row.get(3)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(entries)
    }
}
