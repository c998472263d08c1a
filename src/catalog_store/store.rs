//! SQLite-backed catalog store.
//!
//! The database is filled by the external sync process. This store creates or
//! upgrades the schema when opening, then serves reads from a small pool of
//! read-only connections so concurrent playlist builds do not queue on a
//! single connection. Feedback recorded by the server goes through the one
//! write connection.

use super::filters::{like_pattern, TrackFilters};
use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogAccessor;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const TRACK_COLUMNS: &str = "id, base44_id, spotify_id, title, artist, album, duration_minutes, \
    bpm, intensity, track_type, focus_area, position, resistance_min, resistance_max, \
    cadence_min, cadence_max, base_rpm, base_effortlevel, choreography, cues, notes, spotify_url";

/// SQLite-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: Arc<AtomicUsize>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = CATALOG_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &CATALOG_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating catalog db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    // Databases written by the sync process before versioning was introduced
    // carry user_version 0; the presence of the audience column tells v0 and
    // v1 layouts apart.
    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        let has_audience = conn
            .query_row(
                "SELECT 1 FROM pragma_table_info('track_feedback') WHERE name = 'audience'",
                [],
                |r| r.get::<_, i32>(0),
            )
            .optional()?
            .is_some();
        if has_audience {
            1
        } else {
            0
        }
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        if db_version < BASE_DB_VERSION as i64 {
            conn.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
        }
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in CATALOG_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating catalog db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
        }
        current_version = schema.version;
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

impl SqliteCatalogStore {
    /// Open (creating or migrating if needed) the catalog database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of read-only connections (at least one is opened)
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;

        migrate_if_needed(&mut write_conn)?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let count = |table: &str| -> i64 {
            write_conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
                .unwrap_or(0)
        };
        info!(
            "Opened choreography catalog: {} tracks, {} routines, {} feedback rows",
            count("tracks"),
            count("routines"),
            count("track_feedback")
        );

        let pool_size = read_pool_size.max(1);
        let mut read_pool = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let read_conn = Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .context("Failed to open catalog read connection")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteCatalogStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    fn row_to_track(row: &Row) -> rusqlite::Result<Track> {
        let choreography: Option<String> = row.get(18)?;
        let cues: Option<String> = row.get(19)?;
        Ok(Track {
            id: row.get(0)?,
            external_id: non_empty(row.get(1)?),
            spotify_id: non_empty(row.get(2)?),
            title: row.get::<_, String>(3)?.trim().to_string(),
            artist: row
                .get::<_, Option<String>>(4)?
                .unwrap_or_default()
                .trim()
                .to_string(),
            album: non_empty(row.get(5)?),
            duration_minutes: valid_duration(lenient_real(row, 6)?),
            bpm: valid_bpm(lenient_real(row, 7)?),
            intensity: row
                .get::<_, Option<String>>(8)?
                .as_deref()
                .and_then(Intensity::from_db_str),
            track_type: non_empty(row.get(9)?),
            focus_area: non_empty(row.get(10)?),
            position: non_empty(row.get(11)?),
            resistance_min: lenient_real(row, 12)?,
            resistance_max: lenient_real(row, 13)?,
            cadence_min: lenient_real(row, 14)?,
            cadence_max: lenient_real(row, 15)?,
            base_rpm: lenient_real(row, 16)?,
            base_effort_level: lenient_real(row, 17)?,
            choreography: parse_choreography(choreography.as_deref()),
            cues: parse_cues(cues.as_deref()),
            notes: non_empty(row.get(20)?),
            spotify_url: non_empty(row.get(21)?),
        })
    }

    fn query_tracks(
        conn: &Connection,
        sql: &str,
        values: Vec<rusqlite::types::Value>,
    ) -> Result<Vec<Track>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let tracks = stmt
            .query_map(params_from_iter(values), Self::row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn load_routine_tracks(conn: &Connection, routine_id: i64) -> Result<Vec<RoutineTrack>> {
        let mut stmt = conn.prepare_cached(
            "SELECT track_order, track_base44_id, track_id FROM routine_tracks
             WHERE routine_id = ?1 ORDER BY track_order",
        )?;
        let links = stmt
            .query_map(params![routine_id], |row| {
                Ok(RoutineTrack {
                    order: row.get(0)?,
                    external_track_id: row.get(1)?,
                    local_track_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }
}

/// Trimmed text, with empty strings read as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Numeric column that the sync process may have written as text.
fn lenient_real(row: &Row, index: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(index)? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

impl CatalogAccessor for SqliteCatalogStore {
    fn find_tracks(&self, filters: &TrackFilters) -> Result<Vec<Track>> {
        let (where_clause, mut values) = filters.where_clause();
        let sql = format!(
            "SELECT {} FROM tracks {} ORDER BY id LIMIT ?",
            TRACK_COLUMNS, where_clause
        );
        values.push(rusqlite::types::Value::Integer(
            filters.effective_limit() as i64
        ));

        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let tracks = Self::query_tracks(&conn, &sql, values)?;
        debug!(count = tracks.len(), "find_tracks");
        Ok(tracks)
    }

    fn get_track_by_title(&self, title_fragment: &str) -> Result<Option<Track>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks WHERE title LIKE ?1 ESCAPE '\\' ORDER BY id LIMIT 1",
            TRACK_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let track = stmt
            .query_row(params![like_pattern(title_fragment)], Self::row_to_track)
            .optional()?;
        Ok(track)
    }

    fn find_track_by_title_artist(&self, title: &str, artist: &str) -> Result<Option<Track>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM tracks
             WHERE LOWER(TRIM(title)) = LOWER(?1) AND LOWER(TRIM(COALESCE(artist, ''))) = LOWER(?2)
             ORDER BY id LIMIT 1",
            TRACK_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let track = stmt
            .query_row(params![title.trim(), artist.trim()], Self::row_to_track)
            .optional()?;
        Ok(track)
    }

    fn get_track_stats(&self) -> Result<TrackStats> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();

        let mut stats = conn.query_row(
            "SELECT COUNT(*),
                    SUM(CASE WHEN bpm > 0 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN choreography IS NOT NULL
                              AND TRIM(choreography) NOT IN ('', '[]') THEN 1 ELSE 0 END),
                    MIN(CASE WHEN bpm > 0 THEN bpm END),
                    MAX(CASE WHEN bpm > 0 THEN bpm END),
                    AVG(CASE WHEN bpm > 0 THEN bpm END),
                    SUM(CASE WHEN duration_minutes >= 0 THEN duration_minutes END),
                    AVG(CASE WHEN duration_minutes >= 0 THEN duration_minutes END)
             FROM tracks",
            [],
            |row| {
                Ok(TrackStats {
                    total_tracks: row.get(0)?,
                    tracks_with_bpm: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    tracks_with_choreography: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    min_bpm: row.get(3)?,
                    max_bpm: row.get(4)?,
                    avg_bpm: row.get(5)?,
                    total_duration_minutes: row.get(6)?,
                    avg_duration_minutes: row.get(7)?,
                    by_intensity: Vec::new(),
                    by_track_type: Vec::new(),
                })
            },
        )?;

        let label_counts = |sql: &str| -> Result<Vec<LabelCount>> {
            let mut stmt = conn.prepare(sql)?;
            let counts = stmt
                .query_map([], |row| {
                    Ok(LabelCount {
                        label: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(counts)
        };
        stats.by_intensity = label_counts(
            "SELECT CASE LOWER(TRIM(intensity))
                        WHEN 'moderate' THEN 'medium'
                        WHEN 'max' THEN 'extreme'
                        ELSE COALESCE(NULLIF(LOWER(TRIM(intensity)), ''), 'unspecified')
                    END AS label, COUNT(*)
             FROM tracks GROUP BY label ORDER BY COUNT(*) DESC, label",
        )?;
        stats.by_track_type = label_counts(
            "SELECT COALESCE(NULLIF(LOWER(TRIM(track_type)), ''), 'unspecified') AS label, COUNT(*)
             FROM tracks GROUP BY label ORDER BY COUNT(*) DESC, label",
        )?;
        Ok(stats)
    }

    fn list_feedback(&self) -> Result<Vec<FeedbackRow>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT track_title, track_artist, spotify_id, rating, context, audience
             FROM track_feedback ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    non_empty(row.get(1)?),
                    non_empty(row.get(2)?),
                    row.get::<_, Option<String>>(3)?,
                    non_empty(row.get(4)?),
                    non_empty(row.get(5)?),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut skipped = 0usize;
        let feedback = rows
            .into_iter()
            .filter_map(|(title, artist, spotify_id, rating, context, audience)| {
                let parsed = rating.as_deref().and_then(Rating::from_db_str);
                if parsed.is_none() {
                    skipped += 1;
                }
                Some(FeedbackRow {
                    track_title: title.trim().to_string(),
                    track_artist: artist,
                    spotify_id,
                    rating: parsed?,
                    context,
                    audience,
                })
            })
            .collect::<Vec<_>>();
        if skipped > 0 {
            debug!(skipped, "Skipped feedback rows with unrecognised ratings");
        }
        Ok(feedback)
    }

    fn record_feedback(&self, feedback: &NewFeedback) -> Result<Option<RecordedFeedback>> {
        let Some(track) = self.get_track_by_title(&feedback.title_fragment)? else {
            return Ok(None);
        };
        let artist = non_empty(Some(track.artist.clone()));
        let context = non_empty(feedback.context.clone());
        let audience = non_empty(feedback.audience.clone());

        let conn = self.write_conn.lock().unwrap();
        // A repeated rating only refreshes updated_at on the existing row.
        let id: i64 = conn
            .query_row(
                "INSERT INTO track_feedback
                    (track_title, track_artist, spotify_id, rating, context, audience, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
                 ON CONFLICT DO UPDATE SET updated_at = CURRENT_TIMESTAMP
                 RETURNING id",
                params![
                    track.title,
                    artist,
                    track.spotify_id,
                    feedback.rating.to_db_string(),
                    context,
                    audience
                ],
                |r| r.get(0),
            )
            .with_context(|| format!("Failed to record feedback for '{}'", track.title))?;

        info!(
            id,
            title = %track.title,
            rating = %feedback.rating.to_db_string(),
            "Recorded track feedback"
        );
        Ok(Some(RecordedFeedback {
            id,
            track_title: track.title,
            track_artist: artist,
            rating: feedback.rating,
            context,
            audience,
        }))
    }

    fn get_top_rated_tracks(&self, query: &TopRatedQuery) -> Result<Vec<TopRatedTrack>> {
        let mut conditions = vec!["LOWER(f.rating) = LOWER(?)".to_string()];
        let mut values: Vec<rusqlite::types::Value> = vec![rusqlite::types::Value::Text(
            query.rating.clone().unwrap_or_else(|| "up".to_string()),
        )];
        if let Some(context) = query.context.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push("f.context LIKE ? ESCAPE '\\'".to_string());
            values.push(rusqlite::types::Value::Text(like_pattern(context)));
        }
        if let Some(audience) = query.audience.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push("LOWER(f.audience) = LOWER(?)".to_string());
            values.push(rusqlite::types::Value::Text(audience.trim().to_string()));
        }
        values.push(rusqlite::types::Value::Integer(query.limit.clamp(1, 50) as i64));

        let sql = format!(
            "SELECT f.track_title, f.track_artist, NULLIF(f.context, ''), NULLIF(f.audience, ''),
                    f.rating, COUNT(*) AS rating_count,
                    t.bpm, t.intensity, t.track_type, t.duration_minutes, t.spotify_url
             FROM track_feedback f
             LEFT JOIN tracks t ON t.id = (
                SELECT id FROM tracks WHERE title = f.track_title ORDER BY id LIMIT 1)
             WHERE {}
             GROUP BY f.track_title, f.track_artist, f.context, f.audience, f.rating
             ORDER BY rating_count DESC, f.track_title
             LIMIT ?",
            conditions.join(" AND ")
        );

        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(TopRatedTrack {
                    track_title: row.get(0)?,
                    track_artist: row.get(1)?,
                    context: row.get(2)?,
                    audience: row.get(3)?,
                    rating: row.get(4)?,
                    rating_count: row.get(5)?,
                    bpm: valid_bpm(lenient_real(row, 6)?),
                    intensity: row.get(7)?,
                    track_type: row.get(8)?,
                    duration_minutes: valid_duration(lenient_real(row, 9)?),
                    spotify_url: row.get(10)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_feedback_summary(&self) -> Result<FeedbackSummary> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();

        let overall = conn.query_row(
            "SELECT COUNT(*),
                    SUM(CASE WHEN LOWER(rating) = 'up' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN LOWER(rating) = 'down' THEN 1 ELSE 0 END),
                    COUNT(DISTINCT track_title)
             FROM track_feedback",
            [],
            |row| {
                Ok(FeedbackTotals {
                    total_feedback: row.get(0)?,
                    total_up: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    total_down: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    unique_tracks: row.get(3)?,
                })
            },
        )?;

        let mut stmt = conn.prepare(
            "SELECT COALESCE(NULLIF(context, ''), 'unspecified') AS ctx,
                    SUM(CASE WHEN LOWER(rating) = 'up' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN LOWER(rating) = 'down' THEN 1 ELSE 0 END),
                    COUNT(DISTINCT track_title)
             FROM track_feedback
             GROUP BY ctx
             ORDER BY COUNT(*) DESC, ctx",
        )?;
        let by_context = stmt
            .query_map([], |row| {
                Ok(ContextFeedbackCount {
                    context: row.get(0)?,
                    up_count: row.get(1)?,
                    down_count: row.get(2)?,
                    unique_tracks: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(FeedbackSummary {
            overall,
            by_context,
        })
    }

    fn list_routines(
        &self,
        difficulty: Option<String>,
        limit: usize,
    ) -> Result<Vec<StoredRoutine>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, base44_id, name, description, theme, intensity_arc, class_summary,
                    total_duration_minutes, difficulty, spotify_playlist_id, tags
             FROM routines
             WHERE ?1 IS NULL OR LOWER(difficulty) = LOWER(?1)
             ORDER BY id
             LIMIT ?2",
        )?;
        let difficulty = difficulty.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        let mut routines = stmt
            .query_map(params![difficulty, limit.clamp(1, 50) as i64], |row| {
                let tags: Option<String> = row.get(10)?;
                Ok(StoredRoutine {
                    id: row.get(0)?,
                    external_id: non_empty(row.get(1)?),
                    name: row.get(2)?,
                    description: non_empty(row.get(3)?),
                    theme: non_empty(row.get(4)?),
                    intensity_arc: non_empty(row.get(5)?),
                    class_summary: non_empty(row.get(6)?),
                    total_duration_minutes: valid_duration(lenient_real(row, 7)?),
                    difficulty: non_empty(row.get(8)?),
                    spotify_playlist_id: non_empty(row.get(9)?),
                    tags: parse_cues(tags.as_deref()),
                    tracks: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for routine in routines.iter_mut() {
            routine.tracks = Self::load_routine_tracks(&conn, routine.id)?;
        }
        Ok(routines)
    }
}
