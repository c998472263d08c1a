//! Instructor feedback: scoring catalog tracks for a slot, and summarising
//! likes and dislikes for gap-fill.

mod ranker;
mod signals;

pub use ranker::FeedbackRanker;
pub use signals::FeedbackSignals;

/// Title normalization shared by feedback matching.
pub(crate) fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// A feedback row applies to a track when the titles match and the row
/// either names no artist or names the same one.
pub(crate) fn row_applies(row_artist: Option<&str>, artist: &str) -> bool {
    match row_artist.map(normalize).filter(|a| !a.is_empty()) {
        None => true,
        Some(row_artist) => row_artist == normalize(artist),
    }
}
