mod engine;
mod score;

pub use engine::{
    match_track, pick_best_match, MatchOutcome, ScoredCandidate, SearchCandidate, SearchProvider,
    TrackQuery, DEFAULT_MIN_SCORE, DEFAULT_SEARCH_LIMIT,
};
pub use score::{
    best_artist_ratio, duration_score, normalize_text, parse_duration_text, similarity_ratio,
    ARTIST_WEIGHT, DURATION_WEIGHT, TITLE_GATE, TITLE_WEIGHT,
};
