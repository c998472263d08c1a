//! Access contract over the choreography catalog.

use super::filters::TrackFilters;
use super::models::*;
use anyhow::Result;

/// Query surface over tracks, routines and feedback. Feedback is the only
/// thing callers write.
///
/// Implementations hold no per-request state; every call is independent.
/// Zero matches is always `Ok` with an empty collection, errors mean the
/// store itself could not be queried.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait CatalogAccessor: Send + Sync {
    // =========================================================================
    // Tracks
    // =========================================================================

    /// Tracks matching the filters, in stable catalog order, capped at the
    /// filter limit.
    fn find_tracks(&self, filters: &TrackFilters) -> Result<Vec<Track>>;

    /// First track (catalog order) whose title contains the fragment.
    fn get_track_by_title(&self, title_fragment: &str) -> Result<Option<Track>>;

    /// Exact, case-insensitive match on trimmed title and artist.
    fn find_track_by_title_artist(&self, title: &str, artist: &str) -> Result<Option<Track>>;

    /// Aggregate statistics over the whole track table.
    fn get_track_stats(&self) -> Result<TrackStats>;

    // =========================================================================
    // Feedback
    // =========================================================================

    /// Every feedback row with a recognised rating.
    fn list_feedback(&self) -> Result<Vec<FeedbackRow>>;

    /// Insert a rating for the first track matching the title fragment, or
    /// refresh the existing row for the same track, rating, context and
    /// audience. `None` when no track matches.
    fn record_feedback(&self, feedback: &NewFeedback) -> Result<Option<RecordedFeedback>>;

    /// Feedback grouped per track/context/audience, most rated first.
    fn get_top_rated_tracks(&self, query: &TopRatedQuery) -> Result<Vec<TopRatedTrack>>;

    /// Totals overall and per context.
    fn get_feedback_summary(&self) -> Result<FeedbackSummary>;

    // =========================================================================
    // Routines
    // =========================================================================

    /// Stored routines with their track links, optionally filtered by difficulty.
    fn list_routines(&self, difficulty: Option<String>, limit: usize) -> Result<Vec<StoredRoutine>>;
}
