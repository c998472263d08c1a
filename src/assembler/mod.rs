//! Playlist assembly: request in, routine out.
//!
//! One build is a sequential walk over the planned slots. Each slot is
//! offered to the selector first and, in hybrid mode, to gap-fill when the
//! selector comes up empty. Shortfalls are recorded on the routine instead of
//! failing the build. Catalog queries run on the blocking pool.

mod recommend;
mod routine;

pub use recommend::{ClassRecommendations, Recommendation, RECOMMENDATION_TYPES};

pub use routine::{
    format_minutes, BuildDiagnostics, GapFillDiagnostics, RejectedSuggestion, Routine,
    RoutineEntry, SlotDiagnostics, TrackSource, UnfilledReason, UnfilledSlot,
    RESISTANCE_SCALE_NOTES,
};

use crate::catalog_store::{CatalogAccessor, FeedbackRow, Track};
use crate::config::{EngineSettings, SelectionSettings};
use crate::feedback::{FeedbackRanker, FeedbackSignals};
use crate::gap_fill::{GapFillContext, GapFillOutcome, GapFiller, TrackStub};
use crate::identity::{ExclusionSet, TrackIdentity};
use crate::planner::{plan_slots, Slot, SlotPlan};
use crate::request::{PlaylistRequest, Preferences, ValidatedRequest};
use crate::selector::{Selection, SelectionError, SelectionReport, TrackSelector};
use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const BUDGET_EPSILON: f64 = 0.01;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("no suggestion service is configured")]
    NoSuggestionService,
}

/// Run a catalog query on the blocking pool.
pub async fn on_catalog<T, F>(catalog: &Arc<dyn CatalogAccessor>, query: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn CatalogAccessor) -> anyhow::Result<T> + Send + 'static,
{
    let catalog = catalog.clone();
    tokio::task::spawn_blocking(move || query(catalog.as_ref()))
        .await
        .context("catalog task failed")?
}

/// What one slot selection reads, owned so it can move to the blocking pool.
struct SelectionScope {
    catalog: Arc<dyn CatalogAccessor>,
    ranker: FeedbackRanker,
    preferences: Preferences,
    settings: SelectionSettings,
}

impl SelectionScope {
    async fn select(
        self: Arc<Self>,
        slot: &Slot,
        exclusions: &ExclusionSet,
        remaining: f64,
    ) -> Result<SelectionReport, SelectionError> {
        let scope = self;
        let slot = slot.clone();
        let exclusions = exclusions.clone();
        tokio::task::spawn_blocking(move || {
            TrackSelector::new(
                scope.catalog.as_ref(),
                &scope.ranker,
                &scope.preferences,
                &scope.settings,
            )
            .select(&slot, &exclusions, remaining)
        })
        .await
        .unwrap_or_else(|e| Err(SelectionError::Catalog(format!("catalog task failed: {}", e))))
    }
}

pub struct PlaylistAssembler {
    catalog: Arc<dyn CatalogAccessor>,
    gap_filler: Option<Arc<dyn GapFiller>>,
    settings: EngineSettings,
}

/// Per-build mutable state.
struct BuildState {
    entries: Vec<RoutineEntry>,
    unfilled: Vec<UnfilledSlot>,
    exclusions: ExclusionSet,
    used_minutes: f64,
    catalog_failures: usize,
    last_catalog_error: Option<String>,
    diagnostics: Vec<SlotDiagnostics>,
}

impl BuildState {
    fn push_entry(&mut self, mut entry: RoutineEntry, identity: &TrackIdentity<'_>) {
        self.exclusions.insert(identity);
        self.used_minutes += entry.estimated_minutes;
        entry.order = self.entries.len() + 1;
        self.entries.push(entry);
    }

    fn already_chosen(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{} - {}", e.title, e.artist))
            .collect()
    }
}

impl PlaylistAssembler {
    pub fn new(catalog: Arc<dyn CatalogAccessor>, settings: EngineSettings) -> Self {
        Self {
            catalog,
            gap_filler: None,
            settings,
        }
    }

    pub fn with_gap_filler(mut self, gap_filler: Arc<dyn GapFiller>) -> Self {
        self.gap_filler = Some(gap_filler);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogAccessor> {
        &self.catalog
    }

    pub async fn build(&self, request: &PlaylistRequest) -> Result<Routine, BuildError> {
        let validated = request
            .validate(&self.settings.request)
            .map_err(BuildError::InvalidRequest)?;

        let hybrid_requested = validated.hybrid.unwrap_or(self.settings.hybrid_by_default);
        let gap_filler = if hybrid_requested {
            if self.gap_filler.is_none() {
                warn!("Hybrid mode requested but no gap-fill provider is configured");
            }
            self.gap_filler.as_deref()
        } else {
            None
        };

        let plan = plan_slots(
            validated.duration_minutes,
            validated.intensity_arc.as_ref(),
            validated.difficulty,
            &self.settings.planner,
        )
        .map_err(|e| BuildError::InvalidRequest(e.to_string()))?;

        let feedback_rows = self.load_feedback().await;
        let feedback_count = feedback_rows.len();
        let signals =
            FeedbackSignals::from_rows(&feedback_rows, validated.preferences.audience.as_deref());
        let selector = Arc::new(SelectionScope {
            catalog: self.catalog.clone(),
            ranker: FeedbackRanker::new(feedback_rows, self.settings.ranking.clone()),
            preferences: validated.preferences.clone(),
            settings: self.settings.selection.clone(),
        });

        let mut state = BuildState {
            entries: Vec::new(),
            unfilled: Vec::new(),
            exclusions: ExclusionSet::new(),
            used_minutes: 0.0,
            catalog_failures: 0,
            last_catalog_error: None,
            diagnostics: Vec::new(),
        };

        for slot in &plan.slots {
            let remaining = validated.duration_minutes - state.used_minutes;
            let mut diag = SlotDiagnostics {
                slot_ordinal: slot.ordinal,
                slot_role: slot.role,
                phase: slot.phase_label.clone(),
                target_minutes: slot.target_minutes,
                remaining_minutes: remaining,
                filter_tier: None,
                candidate_count: 0,
                top_candidates: Vec::new(),
                catalog_error: None,
                gap_fill: None,
            };

            let mut reason = UnfilledReason::NoCandidate;
            let selection = Arc::clone(&selector)
                .select(slot, &state.exclusions, remaining)
                .await;
            match selection {
                Ok(report) => {
                    diag.filter_tier = report.tier;
                    diag.candidate_count = report.candidate_count;
                    diag.top_candidates = report.top_candidates;
                    if let Selection::Found(candidate) = report.selection {
                        let track = candidate.track;
                        let estimated = candidate.estimated_minutes;
                        let entry = catalog_entry(slot, &track, estimated, TrackSource::Catalog);
                        state.push_entry(entry, &TrackIdentity::from(&track));
                        state.diagnostics.push(diag);
                        continue;
                    }
                }
                Err(SelectionError::Catalog(detail)) => {
                    warn!(slot = slot.ordinal, %detail, "Catalog query failed for slot");
                    state.catalog_failures += 1;
                    state.last_catalog_error = Some(detail.clone());
                    diag.catalog_error = Some(detail.clone());
                    reason = UnfilledReason::CatalogError(detail);
                }
            }

            if let Some(filler) = gap_filler {
                let context = GapFillContext {
                    duration_minutes: validated.duration_minutes,
                    difficulty: validated.difficulty,
                    preferences: validated.preferences.clone(),
                    user_goal: validated.user_goal.clone(),
                    already_chosen: state.already_chosen(),
                    feedback: signals.clone(),
                };
                let outcome = filler.fill(slot, &context).await;
                let (filled, gap_diag, failure) = self
                    .accept_suggestion(
                        slot,
                        outcome,
                        filler.source(),
                        &validated.preferences,
                        &signals,
                        &mut state,
                        remaining,
                    )
                    .await;
                diag.gap_fill = Some(gap_diag);
                if filled {
                    state.diagnostics.push(diag);
                    continue;
                }
                if let Some(failure) = failure {
                    if reason == UnfilledReason::NoCandidate {
                        reason = failure;
                    }
                }
            }

            debug!(slot = slot.ordinal, role = %slot.role, ?reason, "Slot left unfilled");
            state.unfilled.push(UnfilledSlot {
                slot_ordinal: slot.ordinal,
                phase: slot.phase_label.clone(),
                slot_role: slot.role,
                target_minutes: slot.target_minutes,
                reason,
            });
            state.diagnostics.push(diag);
        }

        if gap_filler.is_none()
            && state.entries.is_empty()
            && !plan.slots.is_empty()
            && state.catalog_failures == plan.slots.len()
        {
            let detail = state
                .last_catalog_error
                .unwrap_or_else(|| "every catalog query failed".to_string());
            warn!(%detail, "Catalog unavailable for every slot");
            return Err(BuildError::CatalogUnavailable(detail));
        }

        let hybrid_active = gap_filler.is_some();
        let routine =
            self.finish(validated, plan, state, hybrid_requested, hybrid_active, feedback_count);
        info!(
            routine_id = %routine.id,
            entries = routine.entries.len(),
            unfilled = routine.unfilled_slots.len(),
            requested_minutes = routine.requested_duration_minutes,
            achieved_minutes = routine.achieved_duration_minutes,
            hybrid = routine.hybrid,
            "Built routine"
        );
        Ok(routine)
    }

    /// Every feedback row, or none when they cannot be read.
    async fn load_feedback(&self) -> Vec<FeedbackRow> {
        match on_catalog(&self.catalog, |catalog| catalog.list_feedback()).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Could not load feedback, ranking without it");
                Vec::new()
            }
        }
    }

    /// The catalog row a suggestion names, if the catalog has it.
    async fn catalog_match(&self, stub: &TrackStub) -> Option<Track> {
        let (title, artist) = (stub.title.clone(), stub.artist.clone());
        let lookup = on_catalog(&self.catalog, move |catalog| {
            catalog.find_track_by_title_artist(&title, &artist)
        });
        match lookup.await {
            Ok(track) => track,
            Err(e) => {
                let error = format!("{:#}", e);
                debug!(%error, title = %stub.title, "Could not match suggestion to catalog");
                None
            }
        }
    }

    /// Take the first suggestion that is new, liked enough, allowed and fits.
    /// Returns whether the slot was filled, the provenance record, and the
    /// unfilled reason a failed call implies.
    #[allow(clippy::too_many_arguments)]
    async fn accept_suggestion(
        &self,
        slot: &Slot,
        outcome: GapFillOutcome,
        source: String,
        preferences: &Preferences,
        signals: &FeedbackSignals,
        state: &mut BuildState,
        remaining: f64,
    ) -> (bool, GapFillDiagnostics, Option<UnfilledReason>) {
        let mut diag = GapFillDiagnostics {
            source,
            outcome: "suggestions",
            detail: None,
            suggestions: Vec::new(),
            rejected: Vec::new(),
            accepted: None,
        };

        let stubs = match outcome {
            GapFillOutcome::Suggestions(stubs) => stubs,
            GapFillOutcome::Empty => {
                diag.outcome = "empty";
                return (false, diag, None);
            }
            GapFillOutcome::ServiceError(detail) => {
                diag.outcome = "service_error";
                diag.detail = Some(detail.clone());
                return (false, diag, Some(UnfilledReason::ServiceError(detail)));
            }
            GapFillOutcome::Malformed(detail) => {
                diag.outcome = "malformed";
                diag.detail = Some(detail.clone());
                return (false, diag, Some(UnfilledReason::MalformedResponse(detail)));
            }
        };
        diag.suggestions = stubs.clone();

        for stub in stubs {
            let known = self.catalog_match(&stub).await;

            let rejection = {
                let identity = match &known {
                    Some(track) => TrackIdentity::from(track),
                    None => TrackIdentity::unlinked(&stub.title, &stub.artist),
                };
                let estimated = known
                    .as_ref()
                    .and_then(|t| t.duration_minutes)
                    .or(stub.duration_minutes)
                    .unwrap_or(slot.target_minutes);
                let stub_text = [stub.focus_area.as_deref(), stub.notes.as_deref()]
                    .iter()
                    .flatten()
                    .map(|s| s.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(" ");

                if state.exclusions.contains(&identity) {
                    Some("duplicate")
                } else if signals.is_disliked(&stub.title, &stub.artist) {
                    Some("disliked")
                } else if preferences.is_excluded_artist(&stub.artist) {
                    Some("excluded_artist")
                } else if preferences.mentions_excluded_genre(&stub_text) {
                    Some("excluded_genre")
                } else if estimated > remaining + BUDGET_EPSILON {
                    Some("over_budget")
                } else {
                    let entry = match &known {
                        Some(track) => catalog_entry(slot, track, estimated, TrackSource::GapFill),
                        None => stub_entry(slot, &stub, estimated),
                    };
                    diag.accepted = Some(entry.canonical_id.to_string());
                    state.push_entry(entry, &identity);
                    None
                }
            };

            match rejection {
                None => return (true, diag, None),
                Some(reason) => diag.rejected.push(RejectedSuggestion {
                    title: stub.title.clone(),
                    artist: stub.artist.clone(),
                    reason,
                }),
            }
        }
        (false, diag, None)
    }

    fn finish(
        &self,
        validated: ValidatedRequest,
        plan: SlotPlan,
        state: BuildState,
        hybrid_requested: bool,
        hybrid_active: bool,
        feedback_rows: usize,
    ) -> Routine {
        let prefs = &validated.preferences;
        let achieved = state.used_minutes;
        let theme_label = prefs.theme.as_deref();

        Routine {
            id: uuid::Uuid::new_v4().to_string(),
            name: routine::routine_name(
                validated.duration_minutes,
                validated.difficulty,
                theme_label,
            ),
            description: validated.user_goal.clone(),
            theme: theme_label.unwrap_or("Mixed energy ride").to_string(),
            intensity_arc: plan.arc_text(),
            resistance_scale_notes: RESISTANCE_SCALE_NOTES,
            difficulty: validated.difficulty,
            audience: prefs.audience.clone(),
            class_summary: routine::class_summary(
                state.entries.len(),
                validated.duration_minutes,
                achieved,
                prefs.audience.as_deref(),
            ),
            tags: routine::routine_tags(
                validated.difficulty,
                prefs.audience.as_deref(),
                theme_label,
            ),
            requested_duration_minutes: validated.duration_minutes,
            achieved_duration_minutes: achieved,
            hybrid: hybrid_active,
            created_at: chrono::Utc::now().to_rfc3339(),
            entries: state.entries,
            unfilled_slots: state.unfilled,
            diagnostics: validated.debug.then(|| BuildDiagnostics {
                plan,
                hybrid_requested,
                hybrid_active,
                feedback_rows,
                slots: state.diagnostics,
            }),
        }
    }
}

fn catalog_entry(slot: &Slot, track: &Track, estimated: f64, source: TrackSource) -> RoutineEntry {
    RoutineEntry {
        order: 0,
        canonical_id: TrackIdentity::from(track).canonical_id(),
        local_id: Some(track.id),
        title: track.title.clone(),
        artist: track.artist.clone(),
        album: track.album.clone(),
        duration_minutes: track.duration_minutes,
        estimated_minutes: estimated,
        bpm: track.bpm,
        intensity: track.intensity,
        slot_ordinal: slot.ordinal,
        slot_role: slot.role,
        phase: slot.phase_label.clone(),
        source,
        spotify_url: track.spotify_url.clone(),
    }
}

fn stub_entry(slot: &Slot, stub: &TrackStub, estimated: f64) -> RoutineEntry {
    RoutineEntry {
        order: 0,
        canonical_id: TrackIdentity::unlinked(&stub.title, &stub.artist).canonical_id(),
        local_id: None,
        title: stub.title.clone(),
        artist: stub.artist.clone(),
        album: None,
        duration_minutes: stub.duration_minutes,
        estimated_minutes: estimated,
        bpm: stub.bpm,
        intensity: stub.intensity,
        slot_ordinal: slot.ordinal,
        slot_role: slot.role,
        phase: slot.phase_label.clone(),
        source: TrackSource::GapFill,
        spotify_url: None,
    }
}
