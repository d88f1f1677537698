//! Outbound reconciliation: push unmapped tracks and whole collections to a
//! target platform.
//!
//! Platform side effects sit behind [`LibraryWriter`] and [`PlaylistWriter`]
//! so the workflows can be tested without a network. Failures are contained
//! per item: one bad track or collection is logged and skipped, the run
//! continues.

use crate::ledger_store::{Collection, LedgerStore, MappingExtra, MediaKind, Track};
use crate::matching::{
    match_track, MatchOutcome, ScoredCandidate, SearchProvider, TrackQuery, DEFAULT_MIN_SCORE,
    DEFAULT_SEARCH_LIMIT,
};
use anyhow::Result;
use tracing::{error, info, warn};

/// Adds individual tracks to the user's library on one platform.
pub trait LibraryWriter {
    fn platform(&self) -> &str;
    fn add_to_library(&self, platform_track_id: &str) -> Result<()>;
    /// Canonical URL of the track on the platform, for the crosswalk row.
    fn track_url(&self, platform_track_id: &str) -> Option<String>;
}

/// Creates playlists and fills them on one platform.
pub trait PlaylistWriter {
    fn platform(&self) -> &str;
    fn create_playlist(&self, name: &str, description: Option<&str>) -> Result<String>;
    fn add_items(&self, platform_playlist_id: &str, platform_track_ids: &[String]) -> Result<()>;
    fn playlist_url(&self, platform_playlist_id: &str) -> Option<String>;
}

#[derive(Clone, Debug)]
pub struct TrackExportOptions {
    /// How many unmapped tracks to examine.
    pub limit: usize,
    pub media_kind: Option<MediaKind>,
    /// Candidates requested from the provider per track.
    pub search_limit: usize,
    pub min_score: f64,
    /// Match and report, but write nothing.
    pub dry_run: bool,
}

impl Default for TrackExportOptions {
    fn default() -> Self {
        TrackExportOptions {
            limit: 50,
            media_kind: Some(MediaKind::Song),
            search_limit: DEFAULT_SEARCH_LIMIT,
            min_score: DEFAULT_MIN_SCORE,
            dry_run: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackExportReport {
    pub examined: usize,
    pub matched: usize,
    /// Tracks actually written to the platform library (0 on dry runs).
    pub added: usize,
    pub no_match: usize,
    pub failed: usize,
}

/// Match every track lacking a crosswalk row on the writer's platform and
/// add the accepted matches to the platform library.
pub fn export_tracks(
    store: &dyn LedgerStore,
    provider: &dyn SearchProvider,
    writer: &dyn LibraryWriter,
    opts: &TrackExportOptions,
) -> Result<TrackExportReport> {
    let platform = writer.platform();
    let tracks = store.tracks_missing_mapping(platform, opts.media_kind, opts.limit)?;
    info!(
        "Exporting up to {} unmapped tracks to {}",
        tracks.len(),
        platform
    );

    let mut report = TrackExportReport::default();
    for track in tracks {
        report.examined += 1;
        let title = track.title.clone();
        match export_one_track(store, provider, writer, opts, &track) {
            Ok(Some(best)) => {
                report.matched += 1;
                if opts.dry_run {
                    info!(
                        "[dry run] would add '{}' as {} (score {:.2})",
                        title, best.candidate.platform_id, best.score
                    );
                } else {
                    report.added += 1;
                    info!(
                        "Added '{}' as {} (score {:.2})",
                        title, best.candidate.platform_id, best.score
                    );
                }
            }
            Ok(None) => {
                report.no_match += 1;
                info!("No acceptable {} match for '{}'", platform, title);
            }
            Err(e) => {
                report.failed += 1;
                error!("Failed to export '{}': {:#}", title, e);
            }
        }
    }
    Ok(report)
}

fn export_one_track(
    store: &dyn LedgerStore,
    provider: &dyn SearchProvider,
    writer: &dyn LibraryWriter,
    opts: &TrackExportOptions,
    track: &Track,
) -> Result<Option<ScoredCandidate>> {
    let artists = store.artists_for_track(&track.id)?;
    let query = TrackQuery::from_track(track, &artists);

    let best = match match_track(provider, &query, opts.search_limit, opts.min_score)? {
        MatchOutcome::Matched(best) => best,
        MatchOutcome::NoAcceptableMatch { .. } | MatchOutcome::NoCandidates => return Ok(None),
    };

    if !opts.dry_run {
        let platform_id = best.candidate.platform_id.clone();
        writer.add_to_library(&platform_id)?;
        store.record_track_mapping(
            writer.platform(),
            &platform_id,
            &track.id,
            &MappingExtra {
                confidence: Some(best.score),
                method: Some("search".to_string()),
                raw: Some(best.candidate.raw.clone()),
                url: writer.track_url(&platform_id),
            },
        )?;
    }
    Ok(Some(best))
}

#[derive(Clone, Debug)]
pub struct CollectionExportOptions {
    /// How many collections to examine, most recently updated first.
    pub limit: usize,
    pub collection_type: Option<String>,
    /// Tracks per `add_items` call.
    pub batch_size: usize,
    /// Create a fresh platform playlist even when a mapping exists.
    pub force_recreate: bool,
    pub dry_run: bool,
}

impl Default for CollectionExportOptions {
    fn default() -> Self {
        CollectionExportOptions {
            limit: 20,
            collection_type: Some("playlist".to_string()),
            batch_size: 50,
            force_recreate: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionExportReport {
    pub examined: usize,
    pub exported: usize,
    pub skipped_empty: usize,
    /// Tracks actually pushed into platform playlists (0 on dry runs).
    pub items_added: usize,
    /// Collection members with no crosswalk row, left out of the playlists.
    pub items_unmapped: usize,
    pub failed: usize,
}

/// Mirror canonical collections as playlists on the writer's platform,
/// reusing previously created playlists through the crosswalk.
pub fn export_collections(
    store: &dyn LedgerStore,
    writer: &dyn PlaylistWriter,
    opts: &CollectionExportOptions,
) -> Result<CollectionExportReport> {
    let collections = store.list_collections(opts.collection_type.as_deref(), opts.limit)?;
    info!(
        "Exporting up to {} collections to {}",
        collections.len(),
        writer.platform()
    );

    let mut report = CollectionExportReport::default();
    for collection in collections {
        report.examined += 1;
        let name = collection.name.clone();
        if let Err(e) = export_one_collection(store, writer, opts, &collection, &mut report) {
            report.failed += 1;
            error!("Failed to export collection '{}': {:#}", name, e);
        }
    }
    Ok(report)
}

fn export_one_collection(
    store: &dyn LedgerStore,
    writer: &dyn PlaylistWriter,
    opts: &CollectionExportOptions,
    collection: &Collection,
    report: &mut CollectionExportReport,
) -> Result<()> {
    let platform = writer.platform();
    let entries = store.collection_items_with_mapping(&collection.id, platform)?;

    let mut platform_ids = Vec::with_capacity(entries.len());
    for entry in &entries {
        match &entry.platform_track_id {
            Some(id) => platform_ids.push(id.clone()),
            None => {
                report.items_unmapped += 1;
                warn!(
                    "'{}' has no {} mapping, leaving it out of '{}'",
                    entry.title, platform, collection.name
                );
            }
        }
    }

    if platform_ids.is_empty() {
        report.skipped_empty += 1;
        info!("Skipping '{}': no mapped tracks", collection.name);
        return Ok(());
    }

    let existing = if opts.force_recreate {
        None
    } else {
        store
            .collection_mapping(platform, &collection.id)?
            .map(|m| m.platform_id)
    };

    if opts.dry_run {
        report.exported += 1;
        info!(
            "[dry run] would push {} tracks of '{}' to {}",
            platform_ids.len(),
            collection.name,
            existing.as_deref().unwrap_or("a new playlist")
        );
        return Ok(());
    }

    let playlist_id = match existing {
        Some(id) => id,
        None => {
            let id = writer.create_playlist(&collection.name, collection.description.as_deref())?;
            store.record_collection_mapping(
                platform,
                &id,
                &collection.id,
                &MappingExtra {
                    confidence: None,
                    method: Some("export".to_string()),
                    raw: Some(serde_json::json!({
                        "name": collection.name,
                        "description": collection.description,
                        "source": "ledger_export",
                    })),
                    url: writer.playlist_url(&id),
                },
            )?;
            id
        }
    };

    for chunk in platform_ids.chunks(opts.batch_size.max(1)) {
        writer.add_items(&playlist_id, chunk)?;
        report.items_added += chunk.len();
    }
    report.exported += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_store::{
        ArtistNamePolicy, CollectionInput, SqliteLedgerStore, TrackInput,
    };
    use crate::matching::SearchCandidate;
    use anyhow::bail;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteLedgerStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteLedgerStore::new(tmp.path().join("ledger.db")).unwrap();
        (store, tmp)
    }

    fn seed_track(store: &SqliteLedgerStore, title: &str, artist: &str) -> String {
        let track = store
            .resolve_track(
                &TrackInput {
                    title: title.to_string(),
                    duration_ms: Some(307_000),
                    ..TrackInput::default()
                },
                None,
            )
            .unwrap();
        let artist = store
            .resolve_artist(artist, ArtistNamePolicy::Strict)
            .unwrap();
        store.attach_artist(&track, &artist, 0, "primary").unwrap();
        track
    }

    struct FakeProvider {
        results: Vec<SearchCandidate>,
    }

    impl SearchProvider for FakeProvider {
        fn search_songs(&self, query: &str, _limit: usize) -> Result<Vec<SearchCandidate>> {
            Ok(self
                .results
                .iter()
                .filter(|c| query.contains(&c.title))
                .cloned()
                .collect())
        }

        fn search_any(&self, _query: &str, _limit: usize) -> Result<Vec<SearchCandidate>> {
            Ok(vec![])
        }
    }

    fn exact_candidate(id: &str, title: &str, artist: &str) -> SearchCandidate {
        SearchCandidate {
            platform_id: id.to_string(),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            duration: Some("5:07".to_string()),
            raw: serde_json::json!({"videoId": id}),
        }
    }

    #[derive(Default)]
    struct FakeLibrary {
        added: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl LibraryWriter for FakeLibrary {
        fn platform(&self) -> &str {
            "ytm"
        }

        fn add_to_library(&self, platform_track_id: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(platform_track_id) {
                bail!("platform rejected {}", platform_track_id);
            }
            self.added.lock().unwrap().push(platform_track_id.to_string());
            Ok(())
        }

        fn track_url(&self, platform_track_id: &str) -> Option<String> {
            Some(format!("https://music.example.com/watch?v={platform_track_id}"))
        }
    }

    #[derive(Default)]
    struct FakePlaylists {
        created: Mutex<Vec<String>>,
        batches: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl PlaylistWriter for FakePlaylists {
        fn platform(&self) -> &str {
            "ytm"
        }

        fn create_playlist(&self, name: &str, _description: Option<&str>) -> Result<String> {
            let id = format!("pl-{}", name.to_lowercase().replace(' ', "-"));
            self.created.lock().unwrap().push(id.clone());
            Ok(id)
        }

        fn add_items(
            &self,
            platform_playlist_id: &str,
            platform_track_ids: &[String],
        ) -> Result<()> {
            self.batches
                .lock()
                .unwrap()
                .push((platform_playlist_id.to_string(), platform_track_ids.to_vec()));
            Ok(())
        }

        fn playlist_url(&self, platform_playlist_id: &str) -> Option<String> {
            Some(format!("https://music.example.com/playlist?list={platform_playlist_id}"))
        }
    }

    #[test]
    fn export_tracks_adds_and_records_mapping() {
        let (store, _tmp) = create_test_store();
        let track = seed_track(&store, "Nights", "Frank Ocean");
        let provider = FakeProvider {
            results: vec![exact_candidate("vid-1", "Nights", "Frank Ocean")],
        };
        let writer = FakeLibrary::default();

        let report =
            export_tracks(&store, &provider, &writer, &TrackExportOptions::default()).unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.added, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(*writer.added.lock().unwrap(), vec!["vid-1".to_string()]);

        let mapping = store.track_mapping("ytm", &track).unwrap().unwrap();
        assert_eq!(mapping.platform_id, "vid-1");
        assert_eq!(mapping.confidence, Some(1.0));
        assert_eq!(mapping.method, Some("search".to_string()));
        assert!(mapping.url.unwrap().contains("vid-1"));

        // Mapped now, so a second run has nothing to do
        let report =
            export_tracks(&store, &provider, &writer, &TrackExportOptions::default()).unwrap();
        assert_eq!(report.examined, 0);
    }

    #[test]
    fn export_tracks_dry_run_writes_nothing() {
        let (store, _tmp) = create_test_store();
        let track = seed_track(&store, "Nights", "Frank Ocean");
        let provider = FakeProvider {
            results: vec![exact_candidate("vid-1", "Nights", "Frank Ocean")],
        };
        let writer = FakeLibrary::default();

        let opts = TrackExportOptions {
            dry_run: true,
            ..TrackExportOptions::default()
        };
        let report = export_tracks(&store, &provider, &writer, &opts).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.added, 0);
        assert!(writer.added.lock().unwrap().is_empty());
        assert!(store.track_mapping("ytm", &track).unwrap().is_none());
    }

    #[test]
    fn export_tracks_continues_past_failures() {
        let (store, _tmp) = create_test_store();
        seed_track(&store, "Nights", "Frank Ocean");
        seed_track(&store, "Solo", "Frank Ocean");
        let provider = FakeProvider {
            results: vec![
                exact_candidate("vid-nights", "Nights", "Frank Ocean"),
                exact_candidate("vid-solo", "Solo", "Frank Ocean"),
            ],
        };
        let writer = FakeLibrary {
            fail_on: Some("vid-nights".to_string()),
            ..FakeLibrary::default()
        };

        let report =
            export_tracks(&store, &provider, &writer, &TrackExportOptions::default()).unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.added, 1);
        assert_eq!(*writer.added.lock().unwrap(), vec!["vid-solo".to_string()]);
    }

    #[test]
    fn export_tracks_counts_unmatched() {
        let (store, _tmp) = create_test_store();
        seed_track(&store, "Completely Obscure B-Side", "Nobody");
        let provider = FakeProvider { results: vec![] };
        let writer = FakeLibrary::default();

        let report =
            export_tracks(&store, &provider, &writer, &TrackExportOptions::default()).unwrap();
        assert_eq!(report.no_match, 1);
        assert_eq!(report.added, 0);
        assert!(writer.added.lock().unwrap().is_empty());
    }

    fn seed_collection(store: &SqliteLedgerStore, name: &str, track_ids: &[String]) -> String {
        let coll = store
            .resolve_collection(&CollectionInput {
                name: name.to_string(),
                collection_type: "playlist".to_string(),
                description: None,
            })
            .unwrap();
        for (pos, id) in track_ids.iter().enumerate() {
            store.add_to_collection(&coll, id, pos as i64, None).unwrap();
        }
        coll
    }

    #[test]
    fn export_collections_creates_and_fills_in_batches() {
        let (store, _tmp) = create_test_store();
        let tracks: Vec<String> = (0..3)
            .map(|i| seed_track(&store, &format!("Track {i}"), "Frank Ocean"))
            .collect();
        for (i, id) in tracks.iter().enumerate() {
            store
                .record_track_mapping("ytm", &format!("vid-{i}"), id, &MappingExtra::default())
                .unwrap();
        }
        let coll = seed_collection(&store, "Road Trip", &tracks);
        let writer = FakePlaylists::default();

        let opts = CollectionExportOptions {
            batch_size: 2,
            ..CollectionExportOptions::default()
        };
        let report = export_collections(&store, &writer, &opts).unwrap();
        assert_eq!(report.exported, 1);
        assert_eq!(report.items_added, 3);
        assert_eq!(report.items_unmapped, 0);

        assert_eq!(*writer.created.lock().unwrap(), vec!["pl-road-trip".to_string()]);
        let batches = writer.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].1, vec!["vid-0".to_string(), "vid-1".to_string()]);
        assert_eq!(batches[1].1, vec!["vid-2".to_string()]);

        let mapping = store.collection_mapping("ytm", &coll).unwrap().unwrap();
        assert_eq!(mapping.platform_id, "pl-road-trip");
        assert_eq!(mapping.method, Some("export".to_string()));
    }

    #[test]
    fn export_collections_reuses_existing_playlist() {
        let (store, _tmp) = create_test_store();
        let track = seed_track(&store, "Nights", "Frank Ocean");
        store
            .record_track_mapping("ytm", "vid-1", &track, &MappingExtra::default())
            .unwrap();
        let coll = seed_collection(&store, "Road Trip", &[track]);
        store
            .record_collection_mapping("ytm", "pl-existing", &coll, &MappingExtra::default())
            .unwrap();
        let writer = FakePlaylists::default();

        let report =
            export_collections(&store, &writer, &CollectionExportOptions::default()).unwrap();
        assert_eq!(report.exported, 1);
        assert!(writer.created.lock().unwrap().is_empty());
        assert_eq!(writer.batches.lock().unwrap()[0].0, "pl-existing");

        // force_recreate ignores the mapping and mints a new playlist
        let opts = CollectionExportOptions {
            force_recreate: true,
            ..CollectionExportOptions::default()
        };
        export_collections(&store, &writer, &opts).unwrap();
        assert_eq!(*writer.created.lock().unwrap(), vec!["pl-road-trip".to_string()]);
        let mapping = store.collection_mapping("ytm", &coll).unwrap().unwrap();
        assert_eq!(mapping.platform_id, "pl-road-trip");
    }

    #[test]
    fn export_collections_skips_unmapped_only_collections() {
        let (store, _tmp) = create_test_store();
        let track = seed_track(&store, "Nights", "Frank Ocean");
        seed_collection(&store, "Road Trip", &[track]);
        let writer = FakePlaylists::default();

        let report =
            export_collections(&store, &writer, &CollectionExportOptions::default()).unwrap();
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(report.items_unmapped, 1);
        assert_eq!(report.exported, 0);
        assert!(writer.created.lock().unwrap().is_empty());
    }

    #[test]
    fn export_collections_dry_run_plans_only() {
        let (store, _tmp) = create_test_store();
        let track = seed_track(&store, "Nights", "Frank Ocean");
        store
            .record_track_mapping("ytm", "vid-1", &track, &MappingExtra::default())
            .unwrap();
        let coll = seed_collection(&store, "Road Trip", &[track]);
        let writer = FakePlaylists::default();

        let opts = CollectionExportOptions {
            dry_run: true,
            ..CollectionExportOptions::default()
        };
        let report = export_collections(&store, &writer, &opts).unwrap();
        assert_eq!(report.exported, 1);
        assert_eq!(report.items_added, 0);
        assert!(writer.created.lock().unwrap().is_empty());
        assert!(writer.batches.lock().unwrap().is_empty());
        assert!(store.collection_mapping("ytm", &coll).unwrap().is_none());
    }
}
