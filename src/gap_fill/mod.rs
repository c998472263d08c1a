//! Gap-fill: asking a completion service for tracks when the catalog has
//! nothing suitable for a slot, or for a whole class up front.
//!
//! Every call ends in a [`GapFillOutcome`]; none of them is fatal to the
//! routine being built.

mod adapter;
mod parse;
mod prompt;

pub use adapter::LlmGapFiller;
pub use parse::parse_suggestions;
pub use prompt::{build_class_messages, build_messages};

use crate::catalog_store::Intensity;
use crate::feedback::FeedbackSignals;
use crate::planner::{PhasePlan, Slot};
use crate::request::{Difficulty, Preferences};
use async_trait::async_trait;
use serde::Serialize;

/// A suggested track that may not exist in the catalog.
/// BPM and duration are advisory.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackStub {
    pub title: String,
    pub artist: String,
    pub duration_minutes: Option<f64>,
    pub bpm: Option<f64>,
    pub intensity: Option<Intensity>,
    pub focus_area: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GapFillOutcome {
    Suggestions(Vec<TrackStub>),
    Empty,
    ServiceError(String),
    Malformed(String),
}

/// What the service is told about the class around the slot.
#[derive(Clone, Debug, Serialize)]
pub struct GapFillContext {
    pub duration_minutes: f64,
    pub difficulty: Difficulty,
    pub preferences: Preferences,
    pub user_goal: Option<String>,
    /// `"Title - Artist"` for every track placed so far.
    pub already_chosen: Vec<String>,
    pub feedback: FeedbackSignals,
}

/// The class a whole-class recommendation is for.
#[derive(Clone, Debug, Serialize)]
pub struct ClassBrief {
    pub intensity_arc: String,
    pub phases: Vec<PhasePlan>,
    pub track_count: usize,
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait GapFiller: Send + Sync {
    /// Where suggestions come from, e.g. `"openai:gpt-4o-mini"`.
    fn source(&self) -> String;

    async fn fill(&self, slot: &Slot, context: &GapFillContext) -> GapFillOutcome;

    /// Up to `brief.track_count` tracks covering the whole class in order.
    async fn recommend(&self, brief: &ClassBrief, context: &GapFillContext) -> GapFillOutcome;
}
