//! Scoring primitives for cross-platform track matching.
//!
//! All functions here are pure so the weighting scheme can be exercised
//! without a store or a search provider.

/// Weight of the title similarity in the composite score.
pub const TITLE_WEIGHT: f64 = 0.65;
/// Weight of the best artist similarity in the composite score.
pub const ARTIST_WEIGHT: f64 = 0.25;
/// Weight of the duration proximity in the composite score.
pub const DURATION_WEIGHT: f64 = 0.10;
/// Candidates whose title similarity falls below this are discarded
/// outright, whatever their other components add up to.
pub const TITLE_GATE: f64 = 0.6;

/// Lowercase and collapse every run of non-alphanumeric characters into a
/// single space, so "Nights (Remastered)" and "nights remastered" compare
/// equal.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalized Levenshtein similarity over normalized text, in [0, 1].
/// Either side normalizing to empty scores 0.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Parse a platform duration string ("H:MM:SS", "MM:SS" or plain seconds)
/// into milliseconds. Returns `None` for anything malformed.
pub fn parse_duration_text(text: &str) -> Option<i64> {
    let mut total_seconds: i64 = 0;
    for part in text.trim().split(':') {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // Platform-supplied text: an absurdly large value is as unknown as
        // a malformed one, never a panic
        let value = part.parse::<i64>().ok()?;
        total_seconds = total_seconds.checked_mul(60)?.checked_add(value)?;
    }
    total_seconds.checked_mul(1000)
}

/// Duration proximity score: full credit inside 2.5s, decaying to zero past
/// 10s. A missing duration on either side contributes nothing.
pub fn duration_score(query_ms: Option<i64>, candidate_ms: Option<i64>) -> f64 {
    let (query_ms, candidate_ms) = match (query_ms, candidate_ms) {
        (Some(q), Some(c)) => (q, c),
        _ => return 0.0,
    };
    let delta = (query_ms - candidate_ms).abs();
    if delta <= 2500 {
        1.0
    } else if delta <= 5000 {
        0.5
    } else if delta <= 10000 {
        0.2
    } else {
        0.0
    }
}

/// Best pairwise similarity between the query's artists and the candidate's.
pub fn best_artist_ratio(query_artists: &[String], candidate_artists: &[String]) -> f64 {
    let mut best = 0.0f64;
    for q in query_artists {
        for c in candidate_artists {
            best = best.max(similarity_ratio(q, c));
        }
    }
    best
}
