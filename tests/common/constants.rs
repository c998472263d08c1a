//! Shared constants for integration tests
//!
//! Titles and labels used by the catalog fixtures. When fixture data
//! changes, update only this file.

// ============================================================================
// Tracks
// ============================================================================

pub const WARMUP_TRACK_TITLE: &str = "Morning Spin";
pub const WARMUP_TRACK_ARTIST: &str = "Easy Riders";

pub const CLIMB_TRACK_TITLE: &str = "Mountain Pass";
pub const CLIMB_TRACK_ARTIST: &str = "The Gradients";

pub const SECOND_CLIMB_TRACK_TITLE: &str = "Switchbacks";
pub const SECOND_CLIMB_TRACK_ARTIST: &str = "The Gradients";

pub const SPRINT_TRACK_TITLE: &str = "Redline";
pub const SPRINT_TRACK_ARTIST: &str = "Velocity";

pub const COOLDOWN_TRACK_TITLE: &str = "Slow Roll";
pub const COOLDOWN_TRACK_ARTIST: &str = "Easy Riders";

// ============================================================================
// Labels
// ============================================================================

pub const AUDIENCE_50_PLUS: &str = "50+";
pub const CLIMB_CONTEXT: &str = "climb";
