//! Test fixtures: a catalog database in a temp dir, filled with raw SQL the
//! way the sync process fills it, plus fake collaborators for the assembler.

use super::constants::*;
use anyhow::Result;
use async_trait::async_trait;
use choreography_server::catalog_store::{
    CatalogAccessor, FeedbackRow, FeedbackSummary, NewFeedback, RecordedFeedback,
    SqliteCatalogStore, StoredRoutine, TopRatedQuery, TopRatedTrack, Track, TrackFilters,
    TrackStats,
};
use choreography_server::gap_fill::{
    ClassBrief, GapFillContext, GapFillOutcome, GapFiller, TrackStub,
};
use choreography_server::llm::{Completion, CompletionOptions, LlmError, LlmProvider, Message};
use choreography_server::planner::Slot;
use rusqlite::{params, Connection};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One row of the tracks table.
#[derive(Clone, Debug)]
pub struct TrackSeed {
    pub title: String,
    pub artist: String,
    pub spotify_id: Option<&'static str>,
    pub duration_minutes: Option<f64>,
    pub bpm: Option<f64>,
    pub intensity: Option<&'static str>,
    pub track_type: Option<&'static str>,
    pub notes: Option<&'static str>,
}

impl TrackSeed {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            spotify_id: None,
            duration_minutes: None,
            bpm: None,
            intensity: None,
            track_type: None,
            notes: None,
        }
    }

    pub fn shaped(
        mut self,
        track_type: &'static str,
        intensity: &'static str,
        bpm: f64,
        duration_minutes: f64,
    ) -> Self {
        self.track_type = Some(track_type);
        self.intensity = Some(intensity);
        self.bpm = Some(bpm);
        self.duration_minutes = Some(duration_minutes);
        self
    }

    pub fn spotify(mut self, id: &'static str) -> Self {
        self.spotify_id = Some(id);
        self
    }

    pub fn notes(mut self, notes: &'static str) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// A catalog database living as long as this value.
pub struct TestCatalog {
    _dir: TempDir,
    pub db_path: PathBuf,
    pub store: Arc<SqliteCatalogStore>,
}

impl TestCatalog {
    /// Fresh database at the latest schema version, no rows.
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new()?;
        let db_path = dir.path().join("catalog.db");
        let store = Arc::new(SqliteCatalogStore::new(&db_path, 2)?);
        Ok(Self {
            _dir: dir,
            db_path,
            store,
        })
    }

    /// Catalog with one track per common role.
    pub fn standard() -> Result<Self> {
        let catalog = Self::empty()?;
        catalog.insert_tracks(&[
            TrackSeed::new(WARMUP_TRACK_TITLE, WARMUP_TRACK_ARTIST)
                .shaped("warmup", "low", 105.0, 4.5)
                .spotify("sp-warmup"),
            TrackSeed::new(CLIMB_TRACK_TITLE, CLIMB_TRACK_ARTIST)
                .shaped("climb", "high", 128.0, 4.0)
                .spotify("sp-climb"),
            TrackSeed::new(SPRINT_TRACK_TITLE, SPRINT_TRACK_ARTIST)
                .shaped("sprint", "extreme", 140.0, 3.5),
            TrackSeed::new(COOLDOWN_TRACK_TITLE, COOLDOWN_TRACK_ARTIST)
                .shaped("cooldown", "low", 92.0, 5.0),
        ])?;
        Ok(catalog)
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn insert_tracks(&self, seeds: &[TrackSeed]) -> Result<()> {
        let conn = self.conn()?;
        for seed in seeds {
            conn.execute(
                "INSERT INTO tracks
                    (title, artist, spotify_id, duration_minutes, bpm, intensity, track_type, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    seed.title,
                    seed.artist,
                    seed.spotify_id,
                    seed.duration_minutes,
                    seed.bpm,
                    seed.intensity,
                    seed.track_type,
                    seed.notes
                ],
            )?;
        }
        Ok(())
    }

    pub fn insert_feedback(
        &self,
        title: &str,
        artist: Option<&str>,
        rating: &str,
        context: Option<&str>,
        audience: Option<&str>,
    ) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO track_feedback (track_title, track_artist, rating, context, audience)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![title, artist, rating, context, audience],
        )?;
        Ok(())
    }

    /// Stored routine linking the given external track ids in order.
    pub fn insert_routine(&self, name: &str, difficulty: &str, track_ids: &[&str]) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO routines (name, difficulty, tags) VALUES (?1, ?2, ?3)",
            params![name, difficulty, r#"["stored"]"#],
        )?;
        let routine_id = conn.last_insert_rowid();
        for (order, track_id) in track_ids.iter().enumerate() {
            conn.execute(
                "INSERT INTO routine_tracks (routine_id, track_base44_id, track_order)
                 VALUES (?1, ?2, ?3)",
                params![routine_id, track_id, order as i64 + 1],
            )?;
        }
        Ok(routine_id)
    }
}

/// A suggestion with only the fields class recommendations read.
pub fn stub(title: &str, artist: &str, focus_area: &str) -> TrackStub {
    TrackStub {
        title: title.to_string(),
        artist: artist.to_string(),
        duration_minutes: Some(4.0),
        bpm: Some(120.0),
        intensity: None,
        focus_area: Some(focus_area.to_string()),
        notes: None,
    }
}

/// Gap-filler that invents a fresh stub per call and counts its calls.
#[derive(Default)]
pub struct CountingGapFiller {
    calls: AtomicUsize,
    /// Always suggest this title instead of a fresh one.
    fixed: Option<(String, String)>,
    /// Whole-class answer; invented stubs when empty.
    class_stubs: Vec<TrackStub>,
    seen: Mutex<Vec<GapFillContext>>,
    briefs: Mutex<Vec<ClassBrief>>,
}

impl CountingGapFiller {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn always(title: &str, artist: &str) -> Arc<Self> {
        Arc::new(Self {
            fixed: Some((title.to_string(), artist.to_string())),
            ..Default::default()
        })
    }

    pub fn recommending(class_stubs: Vec<TrackStub>) -> Arc<Self> {
        Arc::new(Self {
            class_stubs,
            ..Default::default()
        })
    }

    pub fn briefs(&self) -> Vec<ClassBrief> {
        self.briefs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<GapFillContext> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GapFiller for CountingGapFiller {
    fn source(&self) -> String {
        "counting:test".to_string()
    }

    async fn fill(&self, slot: &Slot, context: &GapFillContext) -> GapFillOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push(context.clone());
        let (title, artist) = self
            .fixed
            .clone()
            .unwrap_or_else(|| (format!("Suggested Song {}", n), "Suggested Artist".to_string()));
        GapFillOutcome::Suggestions(vec![TrackStub {
            title,
            artist,
            duration_minutes: Some(slot.target_minutes),
            bpm: Some(slot.bpm.target),
            intensity: slot.intensities.last().copied(),
            focus_area: Some(slot.role.to_string()),
            notes: None,
        }])
    }

    async fn recommend(&self, brief: &ClassBrief, context: &GapFillContext) -> GapFillOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(context.clone());
        self.briefs.lock().unwrap().push(brief.clone());
        if self.class_stubs.is_empty() {
            let invented = (1..=brief.track_count)
                .map(|n| stub(&format!("Class Song {}", n), "Suggested Artist", "build"))
                .collect();
            return GapFillOutcome::Suggestions(invented);
        }
        GapFillOutcome::Suggestions(self.class_stubs.clone())
    }
}

/// Gap-filler that always reports a failed service call.
pub struct FailingGapFiller;

#[async_trait]
impl GapFiller for FailingGapFiller {
    fn source(&self) -> String {
        "failing:test".to_string()
    }

    async fn fill(&self, _slot: &Slot, _context: &GapFillContext) -> GapFillOutcome {
        GapFillOutcome::ServiceError("upstream returned 503".to_string())
    }

    async fn recommend(&self, _brief: &ClassBrief, _context: &GapFillContext) -> GapFillOutcome {
        GapFillOutcome::ServiceError("upstream returned 503".to_string())
    }
}

/// Catalog whose every query fails, as when the database is gone.
pub struct UnavailableCatalog;

impl UnavailableCatalog {
    fn fail<T>() -> Result<T> {
        Err(anyhow::anyhow!("database is locked"))
    }
}

impl CatalogAccessor for UnavailableCatalog {
    fn find_tracks(&self, _filters: &TrackFilters) -> Result<Vec<Track>> {
        Self::fail()
    }
    fn get_track_by_title(&self, _title: &str) -> Result<Option<Track>> {
        Self::fail()
    }
    fn find_track_by_title_artist(&self, _title: &str, _artist: &str) -> Result<Option<Track>> {
        Self::fail()
    }
    fn get_track_stats(&self) -> Result<TrackStats> {
        Self::fail()
    }
    fn list_feedback(&self) -> Result<Vec<FeedbackRow>> {
        Self::fail()
    }
    fn record_feedback(&self, _feedback: &NewFeedback) -> Result<Option<RecordedFeedback>> {
        Self::fail()
    }
    fn get_top_rated_tracks(&self, _query: &TopRatedQuery) -> Result<Vec<TopRatedTrack>> {
        Self::fail()
    }
    fn get_feedback_summary(&self) -> Result<FeedbackSummary> {
        Self::fail()
    }
    fn list_routines(
        &self,
        _difficulty: Option<String>,
        _limit: usize,
    ) -> Result<Vec<StoredRoutine>> {
        Self::fail()
    }
}

/// Completion provider replaying canned responses and counting calls.
/// Once the script runs out it answers with an empty suggestion list.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(r#"{"tracks": []}"#.to_string()))
            .map(Completion::finished)
    }
}
