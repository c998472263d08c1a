//! Picking the best catalog track for one slot.
//!
//! Candidates come from the catalog through progressively looser filters,
//! are pruned against the routine so far and the request's exclusions, and
//! are ranked by an explicit score: feedback plus named boosts, then BPM
//! distance from the slot target, then catalog order.

use crate::catalog_store::{CatalogAccessor, Track, TrackFilters};
use crate::config::SelectionSettings;
use crate::feedback::FeedbackRanker;
use crate::identity::{ExclusionSet, TrackIdentity};
use crate::planner::Slot;
use crate::request::Preferences;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

/// Slack when comparing durations against the remaining budget.
const BUDGET_EPSILON: f64 = 0.01;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("catalog query failed: {0}")]
    Catalog(String),
}

/// How far the catalog filters had to be relaxed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterTier {
    TypesIntensityBpm,
    TypesIntensity,
    Types,
    IntensityOnly,
}

impl FilterTier {
    const ORDER: [FilterTier; 4] = [
        FilterTier::TypesIntensityBpm,
        FilterTier::TypesIntensity,
        FilterTier::Types,
        FilterTier::IntensityOnly,
    ];

    /// Narrow `base` to this tier's view of the slot.
    fn filters(&self, slot: &Slot, base: &TrackFilters, remaining_minutes: f64) -> TrackFilters {
        let mut filters = base.clone();
        if remaining_minutes.is_finite() {
            filters = filters.with_max_duration(remaining_minutes + BUDGET_EPSILON);
        }
        if *self != FilterTier::IntensityOnly {
            filters = filters.with_track_types(slot.role.track_types());
        }
        if *self != FilterTier::Types {
            filters = filters.with_intensities(&slot.intensities);
        }
        if *self == FilterTier::TypesIntensityBpm {
            filters = filters.with_bpm_range(slot.bpm.min, slot.bpm.max);
        }
        filters
    }
}

/// The named terms of a candidate's ranking.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CandidateScore {
    pub feedback: f64,
    pub preferred_artist: f64,
    pub preferred_genre: f64,
    pub theme_match: f64,
    pub total: f64,
    pub bpm_distance: Option<f64>,
    pub within_tolerance: bool,
    /// Position in the catalog query result.
    pub catalog_order: usize,
}

impl CandidateScore {
    /// Best first: higher total, then closer BPM (unknown BPM last), then
    /// earlier in the catalog.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .total
            .total_cmp(&self.total)
            .then_with(|| match (self.bpm_distance, other.bpm_distance) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.catalog_order.cmp(&other.catalog_order))
    }
}

#[derive(Clone, Debug)]
pub struct RankedCandidate {
    pub track: Track,
    pub score: CandidateScore,
    /// Duration used for budgeting: the track's own, or the slot target when unknown.
    pub estimated_minutes: f64,
}

/// Candidate as shown in debug diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct CandidateSummary {
    pub canonical_id: String,
    pub title: String,
    pub artist: String,
    pub duration_minutes: Option<f64>,
    pub bpm: Option<f64>,
    pub score: CandidateScore,
}

impl From<&RankedCandidate> for CandidateSummary {
    fn from(candidate: &RankedCandidate) -> Self {
        Self {
            canonical_id: TrackIdentity::from(&candidate.track)
                .canonical_id()
                .to_string(),
            title: candidate.track.title.clone(),
            artist: candidate.track.artist.clone(),
            duration_minutes: candidate.track.duration_minutes,
            bpm: candidate.track.bpm,
            score: candidate.score.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Selection {
    Found(Box<RankedCandidate>),
    NotFound,
}

#[derive(Clone, Debug)]
pub struct SelectionReport {
    pub selection: Selection,
    /// Tier that produced the candidates, if any did.
    pub tier: Option<FilterTier>,
    pub candidate_count: usize,
    pub top_candidates: Vec<CandidateSummary>,
}

pub struct TrackSelector<'a> {
    catalog: &'a dyn CatalogAccessor,
    ranker: &'a FeedbackRanker,
    preferences: &'a Preferences,
    settings: &'a SelectionSettings,
}

impl<'a> TrackSelector<'a> {
    pub fn new(
        catalog: &'a dyn CatalogAccessor,
        ranker: &'a FeedbackRanker,
        preferences: &'a Preferences,
        settings: &'a SelectionSettings,
    ) -> Self {
        Self {
            catalog,
            ranker,
            preferences,
            settings,
        }
    }

    /// Best track for the slot that is not excluded and fits the budget.
    pub fn select(
        &self,
        slot: &Slot,
        exclusions: &ExclusionSet,
        remaining_minutes: f64,
    ) -> Result<SelectionReport, SelectionError> {
        let (tier, ranked) = self.ranked_candidates(slot, exclusions, remaining_minutes)?;
        let top_candidates = ranked
            .iter()
            .take(self.settings.debug_candidates)
            .map(CandidateSummary::from)
            .collect();
        let candidate_count = ranked.len();
        let selection = match ranked.into_iter().next() {
            Some(best) => Selection::Found(Box::new(best)),
            None => Selection::NotFound,
        };

        debug!(
            slot = slot.ordinal,
            role = %slot.role,
            ?tier,
            candidate_count,
            found = matches!(selection, Selection::Found(_)),
            "Slot selection"
        );
        Ok(SelectionReport {
            selection,
            tier,
            candidate_count,
            top_candidates,
        })
    }

    /// Every surviving candidate for the slot, best first, from the
    /// strictest filter tier that yields any.
    pub fn ranked_candidates(
        &self,
        slot: &Slot,
        exclusions: &ExclusionSet,
        remaining_minutes: f64,
    ) -> Result<(Option<FilterTier>, Vec<RankedCandidate>), SelectionError> {
        // Exclusions go into the query so the candidate limit only counts
        // tracks that can still be placed.
        let base = TrackFilters::default()
            .with_limit(self.settings.candidate_limit)
            .without_artists(&self.preferences.excluded_artists)
            .without_terms(&self.preferences.excluded_genres)
            .without_ids(exclusions.local_ids());
        for tier in FilterTier::ORDER {
            let filters = tier.filters(slot, &base, remaining_minutes);
            let tracks = self
                .catalog
                .find_tracks(&filters)
                .map_err(|e| SelectionError::Catalog(format!("{:#}", e)))?;

            let mut ranked: Vec<RankedCandidate> = tracks
                .into_iter()
                .enumerate()
                .filter_map(|(order, track)| {
                    self.consider(slot, exclusions, remaining_minutes, order, track)
                })
                .collect();
            if ranked.is_empty() {
                continue;
            }

            if ranked.iter().any(|c| c.score.within_tolerance) {
                ranked.retain(|c| c.score.within_tolerance);
            }
            ranked.sort_by(|a, b| a.score.rank_cmp(&b.score));
            return Ok((Some(tier), ranked));
        }
        Ok((None, Vec::new()))
    }

    fn consider(
        &self,
        slot: &Slot,
        exclusions: &ExclusionSet,
        remaining_minutes: f64,
        catalog_order: usize,
        track: Track,
    ) -> Option<RankedCandidate> {
        if exclusions.contains(&TrackIdentity::from(&track)) {
            return None;
        }
        if self.preferences.is_excluded_artist(&track.artist) {
            return None;
        }
        let text = track.descriptive_text();
        if self.preferences.mentions_excluded_genre(&text) {
            return None;
        }
        let estimated_minutes = track.duration_minutes.unwrap_or(slot.target_minutes);
        if estimated_minutes > remaining_minutes + BUDGET_EPSILON {
            return None;
        }

        let weights = self.ranker.weights();
        let feedback = self.ranker.score(
            &track.title,
            &track.artist,
            slot.role.context_labels(),
            self.preferences.audience.as_deref(),
        );
        let boost = |applies: bool, weight: f64| if applies { weight } else { 0.0 };
        let preferred_artist = boost(
            self.preferences.is_preferred_artist(&track.artist),
            weights.preferred_artist_boost,
        );
        let preferred_genre = boost(
            self.preferences.mentions_preferred_genre(&text),
            weights.preferred_genre_boost,
        );
        let theme_text = format!("{} {}", track.title.to_lowercase(), text);
        let theme_match = boost(
            self.preferences.matches_theme(&theme_text),
            weights.theme_match_boost,
        );

        let score = CandidateScore {
            feedback,
            preferred_artist,
            preferred_genre,
            theme_match,
            total: feedback + preferred_artist + preferred_genre + theme_match,
            bpm_distance: track.bpm.map(|bpm| (bpm - slot.bpm.target).abs()),
            within_tolerance: (estimated_minutes - slot.target_minutes).abs()
                <= self.settings.duration_tolerance_minutes,
            catalog_order,
        };
        Some(RankedCandidate {
            track,
            score,
            estimated_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{
        FeedbackRow, FeedbackSummary, Intensity, NewFeedback, Rating, RecordedFeedback,
        StoredRoutine, TopRatedQuery, TopRatedTrack, TrackStats,
    };
    use crate::config::RankingSettings;
    use crate::planner::{BpmBand, SlotRole};
    use anyhow::{bail, Result};

    /// In-memory catalog applying the filters the way the SQLite store does.
    struct VecCatalog {
        tracks: Vec<Track>,
        fail: bool,
    }

    fn catalog(tracks: Vec<Track>) -> VecCatalog {
        VecCatalog {
            tracks,
            fail: false,
        }
    }

    fn contains_any(haystack: &str, needles: &[String]) -> bool {
        let haystack = haystack.to_lowercase();
        needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
    }

    impl VecCatalog {
        fn matches(f: &TrackFilters, t: &Track) -> bool {
            let above_min = f.bpm_min.map_or(true, |m| t.bpm.is_some_and(|b| b >= m));
            let below_max = f.bpm_max.map_or(true, |m| t.bpm.is_some_and(|b| b <= m));
            let intensity = f.intensities.is_empty()
                || t.intensity.is_some_and(|i| f.intensities.contains(&i));
            let typed = f.track_types.is_empty()
                || t.track_type
                    .as_deref()
                    .is_some_and(|tt| f.track_types.iter().any(|w| tt.contains(w.as_str())));
            let fits = f
                .max_duration_minutes
                .map_or(true, |m| t.duration_minutes.map_or(true, |d| d <= m));
            above_min
                && below_max
                && intensity
                && typed
                && fits
                && !f.excluded_ids.contains(&t.id)
                && !contains_any(&t.artist, &f.excluded_artists)
                && !contains_any(&t.descriptive_text(), &f.excluded_terms)
        }
    }

    impl CatalogAccessor for VecCatalog {
        fn find_tracks(&self, f: &TrackFilters) -> Result<Vec<Track>> {
            if self.fail {
                bail!("database is locked");
            }
            Ok(self
                .tracks
                .iter()
                .filter(|t| Self::matches(f, t))
                .take(f.effective_limit())
                .cloned()
                .collect())
        }
        fn get_track_by_title(&self, _: &str) -> Result<Option<Track>> {
            Ok(None)
        }
        fn find_track_by_title_artist(&self, _: &str, _: &str) -> Result<Option<Track>> {
            Ok(None)
        }
        fn get_track_stats(&self) -> Result<TrackStats> {
            Ok(TrackStats::default())
        }
        fn list_feedback(&self) -> Result<Vec<FeedbackRow>> {
            Ok(Vec::new())
        }
        fn record_feedback(&self, _: &NewFeedback) -> Result<Option<RecordedFeedback>> {
            bail!("read-only")
        }
        fn get_top_rated_tracks(&self, _: &TopRatedQuery) -> Result<Vec<TopRatedTrack>> {
            Ok(Vec::new())
        }
        fn get_feedback_summary(&self) -> Result<FeedbackSummary> {
            Ok(FeedbackSummary::default())
        }
        fn list_routines(&self, _: Option<String>, _: usize) -> Result<Vec<StoredRoutine>> {
            Ok(Vec::new())
        }
    }

    fn track(id: i64, title: &str, intensity: Intensity, bpm: Option<f64>, minutes: f64) -> Track {
        typed_track(id, title, "climb", intensity, bpm, minutes)
    }

    fn typed_track(
        id: i64,
        title: &str,
        kind: &str,
        intensity: Intensity,
        bpm: Option<f64>,
        minutes: f64,
    ) -> Track {
        Track {
            id,
            external_id: None,
            spotify_id: None,
            title: title.to_string(),
            artist: format!("Artist {}", id),
            album: None,
            duration_minutes: Some(minutes),
            bpm,
            intensity: Some(intensity),
            track_type: Some(kind.to_string()),
            focus_area: None,
            position: None,
            resistance_min: None,
            resistance_max: None,
            cadence_min: None,
            cadence_max: None,
            base_rpm: None,
            base_effort_level: None,
            choreography: Vec::new(),
            cues: Vec::new(),
            notes: None,
            spotify_url: None,
        }
    }

    fn climb_slot(target_minutes: f64) -> Slot {
        Slot {
            ordinal: 1,
            phase_index: 0,
            phase_label: "Climb".to_string(),
            role: SlotRole::Climb,
            target_minutes,
            bpm: BpmBand {
                min: 118.0,
                max: 140.0,
                target: 128.0,
            },
            intensities: vec![Intensity::Medium, Intensity::High],
        }
    }

    fn select_with(
        catalog: &VecCatalog,
        feedback: Vec<FeedbackRow>,
        prefs: &Preferences,
        slot: &Slot,
        exclusions: &ExclusionSet,
        remaining: f64,
    ) -> Result<SelectionReport, SelectionError> {
        let ranker = FeedbackRanker::new(feedback, RankingSettings::default());
        let settings = SelectionSettings::default();
        TrackSelector::new(catalog, &ranker, prefs, &settings).select(slot, exclusions, remaining)
    }

    /// No feedback, preferences or exclusions.
    fn select_plain(
        catalog: &VecCatalog,
        slot: &Slot,
        remaining: f64,
    ) -> Result<SelectionReport, SelectionError> {
        let prefs = Preferences::default();
        select_with(catalog, vec![], &prefs, slot, &ExclusionSet::new(), remaining)
    }

    fn found_title(report: &SelectionReport) -> Option<&str> {
        match &report.selection {
            Selection::Found(c) => Some(c.track.title.as_str()),
            Selection::NotFound => None,
        }
    }

    #[test]
    fn single_matching_track_is_selected() {
        let catalog = catalog(vec![track(1, "Only One", Intensity::High, None, 4.0)]);
        let report = select_plain(&catalog, &climb_slot(5.0), 45.0).unwrap();
        assert_eq!(found_title(&report), Some("Only One"));
        // Without a BPM the first tier misses and the second finds it.
        assert_eq!(report.tier, Some(FilterTier::TypesIntensity));
    }

    #[test]
    fn empty_catalog_is_not_found() {
        let report = select_plain(&catalog(vec![]), &climb_slot(4.0), 45.0).unwrap();
        assert!(matches!(report.selection, Selection::NotFound));
        assert_eq!(report.tier, None);
    }

    #[test]
    fn catalog_failure_is_an_error() {
        let catalog = VecCatalog {
            tracks: vec![],
            fail: true,
        };
        let result = select_plain(&catalog, &climb_slot(4.0), 45.0);
        assert!(matches!(result, Err(SelectionError::Catalog(msg)) if msg.contains("locked")));
    }

    #[test]
    fn feedback_then_bpm_then_catalog_order() {
        let catalog = catalog(vec![
            track(1, "Far", Intensity::High, Some(139.0), 4.0),
            track(2, "Near", Intensity::High, Some(129.0), 4.0),
            track(3, "Liked", Intensity::High, Some(139.0), 4.0),
        ]);
        let slot = climb_slot(4.0);

        let report = select_plain(&catalog, &slot, 45.0).unwrap();
        assert_eq!(found_title(&report), Some("Near"));

        let liked = FeedbackRow {
            track_title: "liked".to_string(),
            track_artist: None,
            spotify_id: None,
            rating: Rating::Up,
            context: Some("climb".to_string()),
            audience: None,
        };
        let prefs = Preferences::default();
        let report =
            select_with(&catalog, vec![liked], &prefs, &slot, &ExclusionSet::new(), 45.0).unwrap();
        assert_eq!(found_title(&report), Some("Liked"));
        assert_eq!(report.top_candidates.len(), 3);
        assert_eq!(report.top_candidates[0].score.feedback, 1.0);
    }

    #[test]
    fn exclusions_artists_and_genres_are_removed() {
        let mut excluded_genre = track(3, "Country Climb", Intensity::High, Some(128.0), 4.0);
        excluded_genre.notes = Some("Country anthem".to_string());
        let catalog = catalog(vec![
            track(1, "Already Used", Intensity::High, Some(128.0), 4.0),
            track(2, "Banned Artist", Intensity::High, Some(128.0), 4.0),
            excluded_genre,
        ]);
        let mut exclusions = ExclusionSet::new();
        exclusions.insert(&TrackIdentity::from(&catalog.tracks[0]));
        let prefs = Preferences {
            excluded_artists: vec!["artist 2".to_string()],
            excluded_genres: vec!["country".to_string()],
            ..Default::default()
        };
        let report =
            select_with(&catalog, vec![], &prefs, &climb_slot(4.0), &exclusions, 45.0).unwrap();
        assert!(matches!(report.selection, Selection::NotFound));
    }

    #[test]
    fn excluded_tracks_do_not_use_up_the_candidate_limit() {
        let mut tracks: Vec<Track> = (1..=3)
            .map(|id| track(id, "Placed", Intensity::High, Some(128.0), 4.0))
            .collect();
        tracks.extend((4..=6).map(|id| {
            let mut banned = track(id, "Banned", Intensity::High, Some(128.0), 4.0);
            banned.artist = "Banned Band".to_string();
            banned
        }));
        tracks.push(track(7, "Good", Intensity::High, Some(128.0), 4.0));
        let catalog = catalog(tracks);

        let mut exclusions = ExclusionSet::new();
        for placed in &catalog.tracks[..3] {
            exclusions.insert(&TrackIdentity::from(placed));
        }
        let prefs = Preferences {
            excluded_artists: vec!["banned".to_string()],
            ..Default::default()
        };
        let ranker = FeedbackRanker::new(vec![], RankingSettings::default());
        let settings = SelectionSettings {
            candidate_limit: 2,
            ..Default::default()
        };
        let report = TrackSelector::new(&catalog, &ranker, &prefs, &settings)
            .select(&climb_slot(4.0), &exclusions, 45.0)
            .unwrap();
        assert_eq!(found_title(&report), Some("Good"));
        assert_eq!(report.tier, Some(FilterTier::TypesIntensityBpm));
    }

    #[test]
    fn budget_and_tolerance() {
        let catalog = catalog(vec![
            track(1, "Long", Intensity::High, Some(128.0), 9.0),
            track(2, "Fits", Intensity::High, Some(140.0), 4.5),
            track(3, "Short", Intensity::High, Some(128.0), 1.0),
        ]);
        // "Long" busts the budget; "Fits" is within tolerance of the target
        // and beats the closer-BPM "Short".
        let report = select_plain(&catalog, &climb_slot(4.0), 6.0).unwrap();
        assert_eq!(found_title(&report), Some("Fits"));
        assert_eq!(report.candidate_count, 1);

        // Nothing within tolerance: nearest-match keeps everything that fits.
        let report = select_plain(&catalog, &climb_slot(7.0), 6.0).unwrap();
        assert_eq!(report.candidate_count, 2);
    }

    #[test]
    fn boosts_are_named_terms() {
        let mut themed = track(2, "Thunder Road", Intensity::High, Some(140.0), 4.0);
        themed.artist = "Bruce Springsteen".to_string();
        let catalog = catalog(vec![track(1, "Plain", Intensity::High, Some(128.0), 4.0), themed]);
        let prefs = Preferences {
            preferred_artists: vec!["springsteen".to_string()],
            theme: Some("thunder".to_string()),
            ..Default::default()
        };
        let report =
            select_with(&catalog, vec![], &prefs, &climb_slot(4.0), &ExclusionSet::new(), 45.0)
                .unwrap();
        assert_eq!(found_title(&report), Some("Thunder Road"));
        let score = &report.top_candidates[0].score;
        assert_eq!(score.preferred_artist, 0.5);
        assert_eq!(score.theme_match, 0.2);
        assert!((score.total - 0.7).abs() < 1e-9);
    }

    #[test]
    fn relaxes_to_intensity_only() {
        let untyped = typed_track(1, "Untyped", "mystery", Intensity::High, Some(128.0), 4.0);
        let report = select_plain(&catalog(vec![untyped]), &climb_slot(4.0), 45.0).unwrap();
        assert_eq!(report.tier, Some(FilterTier::IntensityOnly));
        assert_eq!(found_title(&report), Some("Untyped"));
    }
}
