//! Candidate selection against a platform search provider.

use super::score::{
    best_artist_ratio, duration_score, parse_duration_text, similarity_ratio, ARTIST_WEIGHT,
    DURATION_WEIGHT, TITLE_GATE, TITLE_WEIGHT,
};
use crate::ledger_store::{Track, TrackArtistEntry};
use anyhow::Result;
use tracing::debug;

/// Composite scores below this are not accepted as matches.
pub const DEFAULT_MIN_SCORE: f64 = 0.6;
/// How many candidates to request from the provider per track.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// What the matcher knows about the track it is looking for.
#[derive(Clone, Debug, Default)]
pub struct TrackQuery {
    pub title: String,
    pub album: Option<String>,
    pub duration_ms: Option<i64>,
    /// Canonical artist names, order preserved; the first one seeds the
    /// search query.
    pub artists: Vec<String>,
}

impl TrackQuery {
    pub fn from_track(track: &Track, artists: &[TrackArtistEntry]) -> Self {
        TrackQuery {
            title: track.title.clone(),
            album: track.album.clone(),
            duration_ms: track.duration_ms,
            artists: artists.iter().map(|e| e.artist.name.clone()).collect(),
        }
    }

    /// The text sent to the platform search endpoint: title plus the first
    /// artist, when there is one.
    pub fn search_text(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.title.trim(), artist.trim())
                .trim()
                .to_string(),
            None => self.title.trim().to_string(),
        }
    }
}

/// One search result as reported by a platform.
#[derive(Clone, Debug, Default)]
pub struct SearchCandidate {
    pub platform_id: String,
    pub title: String,
    pub artists: Vec<String>,
    /// Duration as the platform prints it ("3:05"), if reported.
    pub duration: Option<String>,
    /// Raw provider payload, kept for crosswalk provenance.
    pub raw: serde_json::Value,
}

/// A candidate with its component and composite scores.
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    pub candidate: SearchCandidate,
    pub title_score: f64,
    pub artist_score: f64,
    pub duration_score: f64,
    pub score: f64,
}

/// Outcome of matching one track against one platform.
#[derive(Clone, Debug)]
pub enum MatchOutcome {
    Matched(ScoredCandidate),
    /// Candidates came back but none cleared the threshold. `best` is the
    /// highest-scoring survivor of the title gate, when any survived.
    NoAcceptableMatch { best: Option<ScoredCandidate> },
    /// The provider returned nothing, even on the broader fallback search.
    NoCandidates,
}

/// A platform search endpoint the matcher can query.
pub trait SearchProvider {
    /// Search scoped to songs.
    fn search_songs(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>>;

    /// Unscoped search, used as a fallback when the scoped one comes back
    /// empty.
    fn search_any(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>>;
}

/// Score one candidate against the query. Returns `None` when the candidate
/// is unusable: no platform id, or title similarity below the gate.
fn score_candidate(query: &TrackQuery, candidate: SearchCandidate) -> Option<ScoredCandidate> {
    if candidate.platform_id.trim().is_empty() {
        return None;
    }

    let title_score = similarity_ratio(&query.title, &candidate.title);
    if title_score < TITLE_GATE {
        return None;
    }

    let artist_score = best_artist_ratio(&query.artists, &candidate.artists);
    let candidate_ms = candidate.duration.as_deref().and_then(parse_duration_text);
    let duration_score = duration_score(query.duration_ms, candidate_ms);

    let score =
        TITLE_WEIGHT * title_score + ARTIST_WEIGHT * artist_score + DURATION_WEIGHT * duration_score;

    Some(ScoredCandidate {
        candidate,
        title_score,
        artist_score,
        duration_score,
        score,
    })
}

/// Pick the best candidate for `query`, or report why none was accepted.
pub fn pick_best_match(
    query: &TrackQuery,
    candidates: Vec<SearchCandidate>,
    min_score: f64,
) -> MatchOutcome {
    if candidates.is_empty() {
        return MatchOutcome::NoCandidates;
    }

    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter_map(|c| score_candidate(query, c))
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    match scored.into_iter().next() {
        Some(best) if best.score >= min_score => MatchOutcome::Matched(best),
        best => MatchOutcome::NoAcceptableMatch { best },
    }
}

/// Run the full match for one track: scoped search, broader fallback when it
/// comes back empty, then scoring and selection.
pub fn match_track(
    provider: &dyn SearchProvider,
    query: &TrackQuery,
    search_limit: usize,
    min_score: f64,
) -> Result<MatchOutcome> {
    let text = query.search_text();
    let mut candidates = provider.search_songs(&text, search_limit)?;
    if candidates.is_empty() {
        debug!("No song results for '{}', retrying unscoped", text);
        candidates = provider.search_any(&text, search_limit)?;
    }
    Ok(pick_best_match(query, candidates, min_score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(title: &str, artist: &str, duration_ms: i64) -> TrackQuery {
        TrackQuery {
            title: title.to_string(),
            album: None,
            duration_ms: Some(duration_ms),
            artists: vec![artist.to_string()],
        }
    }

    fn candidate(id: &str, title: &str, artist: &str, duration: &str) -> SearchCandidate {
        SearchCandidate {
            platform_id: id.to_string(),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            duration: Some(duration.to_string()),
            raw: serde_json::json!({"videoId": id}),
        }
    }

    struct FakeProvider {
        songs: Vec<SearchCandidate>,
        any: Vec<SearchCandidate>,
    }

    impl SearchProvider for FakeProvider {
        fn search_songs(&self, _query: &str, _limit: usize) -> Result<Vec<SearchCandidate>> {
            Ok(self.songs.clone())
        }

        fn search_any(&self, _query: &str, _limit: usize) -> Result<Vec<SearchCandidate>> {
            Ok(self.any.clone())
        }
    }

    #[test]
    fn search_text_is_title_plus_first_artist() {
        let q = query("Nights", "Frank Ocean", 307_000);
        assert_eq!(q.search_text(), "Nights Frank Ocean");

        let no_artists = TrackQuery {
            title: " Nights ".to_string(),
            ..TrackQuery::default()
        };
        assert_eq!(no_artists.search_text(), "Nights");
    }

    #[test]
    fn exact_candidate_wins() {
        let q = query("Nights", "Frank Ocean", 307_000);
        let outcome = pick_best_match(
            &q,
            vec![
                candidate("wrong", "Solo", "Frank Ocean", "4:17"),
                candidate("right", "Nights", "Frank Ocean", "5:07"),
            ],
            DEFAULT_MIN_SCORE,
        );
        match outcome {
            MatchOutcome::Matched(best) => {
                assert_eq!(best.candidate.platform_id, "right");
                assert_eq!(best.title_score, 1.0);
                assert_eq!(best.duration_score, 1.0);
                assert!((best.score - 1.0).abs() < 1e-9);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn closer_title_outranks_with_other_scores_fixed() {
        let q = query("Nights", "Frank Ocean", 307_000);
        // Both survive the gate; only the title similarity differs
        let outcome = pick_best_match(
            &q,
            vec![
                candidate("close", "Night", "Frank Ocean", "5:07"),
                candidate("exact", "Nights", "Frank Ocean", "5:07"),
            ],
            DEFAULT_MIN_SCORE,
        );
        match outcome {
            MatchOutcome::Matched(best) => assert_eq!(best.candidate.platform_id, "exact"),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn title_gate_discards_remixes() {
        let q = query("Nights", "Frank Ocean", 307_000);
        // "nights remix" vs "nights": ratio 0.5, under the gate even with a
        // perfect artist and duration
        let outcome = pick_best_match(
            &q,
            vec![candidate("remix", "Nights Remix", "Frank Ocean", "5:07")],
            DEFAULT_MIN_SCORE,
        );
        assert!(matches!(
            outcome,
            MatchOutcome::NoAcceptableMatch { best: None }
        ));
    }

    #[test]
    fn below_threshold_reports_best_survivor() {
        let q = query("Nights", "Frank Ocean", 307_000);
        // Title matches but artist and duration are wrong: 0.65 * 1.0 = 0.65,
        // below a stricter threshold
        let outcome = pick_best_match(
            &q,
            vec![candidate("cover", "Nights", "Somebody Else", "2:00")],
            0.8,
        );
        match outcome {
            MatchOutcome::NoAcceptableMatch { best: Some(best) } => {
                assert_eq!(best.candidate.platform_id, "cover");
                assert!(best.score < 0.8);
            }
            other => panic!("expected rejection with a survivor, got {:?}", other),
        }
    }

    #[test]
    fn empty_platform_ids_are_skipped() {
        let q = query("Nights", "Frank Ocean", 307_000);
        let mut unusable = candidate("", "Nights", "Frank Ocean", "5:07");
        unusable.platform_id = "".to_string();
        let outcome = pick_best_match(&q, vec![unusable], DEFAULT_MIN_SCORE);
        assert!(matches!(
            outcome,
            MatchOutcome::NoAcceptableMatch { best: None }
        ));
    }

    #[test]
    fn empty_candidate_list_is_distinct_from_rejection() {
        let q = query("Nights", "Frank Ocean", 307_000);
        assert!(matches!(
            pick_best_match(&q, vec![], DEFAULT_MIN_SCORE),
            MatchOutcome::NoCandidates
        ));
    }

    #[test]
    fn match_track_falls_back_to_unscoped_search() {
        let provider = FakeProvider {
            songs: vec![],
            any: vec![candidate("vid-1", "Nights", "Frank Ocean", "5:07")],
        };
        let q = query("Nights", "Frank Ocean", 307_000);
        let outcome = match_track(&provider, &q, DEFAULT_SEARCH_LIMIT, DEFAULT_MIN_SCORE).unwrap();
        match outcome {
            MatchOutcome::Matched(best) => assert_eq!(best.candidate.platform_id, "vid-1"),
            other => panic!("expected fallback match, got {:?}", other),
        }
    }

    #[test]
    fn scoped_results_suppress_fallback() {
        let provider = FakeProvider {
            songs: vec![candidate("song-1", "Nights", "Frank Ocean", "5:07")],
            any: vec![candidate("vid-1", "Nights", "Frank Ocean", "5:07")],
        };
        let q = query("Nights", "Frank Ocean", 307_000);
        let outcome = match_track(&provider, &q, DEFAULT_SEARCH_LIMIT, DEFAULT_MIN_SCORE).unwrap();
        match outcome {
            MatchOutcome::Matched(best) => assert_eq!(best.candidate.platform_id, "song-1"),
            other => panic!("expected scoped match, got {:?}", other),
        }
    }
}
