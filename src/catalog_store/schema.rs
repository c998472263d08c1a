//! SQLite schema for the choreography catalog.
//!
//! Tables are populated by the external sync process; this crate only creates
//! them for fresh databases and upgrades older layouts.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, SqlType, Table, VersionedSchema};
use anyhow::Result;
use rusqlite::Connection;

// =============================================================================
// Tracks
// =============================================================================

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("base44_id", &SqlType::Text, is_unique = true),
        sqlite_column!("spotify_id", &SqlType::Text),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("duration_minutes", &SqlType::Real),
        sqlite_column!("bpm", &SqlType::Real),
        sqlite_column!("intensity", &SqlType::Text),
        sqlite_column!("track_type", &SqlType::Text),
        sqlite_column!("focus_area", &SqlType::Text),
        sqlite_column!("position", &SqlType::Text),
        sqlite_column!("resistance_min", &SqlType::Real),
        sqlite_column!("resistance_max", &SqlType::Real),
        sqlite_column!("cadence_min", &SqlType::Real),
        sqlite_column!("cadence_max", &SqlType::Real),
        sqlite_column!("base_rpm", &SqlType::Real),
        sqlite_column!("base_effortlevel", &SqlType::Real),
        // JSON list of cue objects
        sqlite_column!("choreography", &SqlType::Text),
        // JSON list of strings, or plain text
        sqlite_column!("cues", &SqlType::Text),
        sqlite_column!("notes", &SqlType::Text),
        sqlite_column!("spotify_url", &SqlType::Text),
    ],
    indices: &[
        ("idx_tracks_title", "title"),
        ("idx_tracks_track_type", "track_type"),
        ("idx_tracks_bpm", "bpm"),
    ],
    unique_indices: &[],
};

// =============================================================================
// Routines
// =============================================================================

const ROUTINES_TABLE: Table = Table {
    name: "routines",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("base44_id", &SqlType::Text, is_unique = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("theme", &SqlType::Text),
        sqlite_column!("intensity_arc", &SqlType::Text),
        sqlite_column!("resistance_scale_notes", &SqlType::Text),
        sqlite_column!("class_summary", &SqlType::Text),
        sqlite_column!("total_duration_minutes", &SqlType::Real),
        sqlite_column!("difficulty", &SqlType::Text),
        sqlite_column!("spotify_playlist_id", &SqlType::Text),
        // JSON list of strings
        sqlite_column!("tags", &SqlType::Text),
    ],
    indices: &[("idx_routines_difficulty", "difficulty")],
    unique_indices: &[],
};

const ROUTINE_FK: ForeignKey = ForeignKey {
    foreign_table: "routines",
    foreign_column: "id",
    on_delete_cascade: true,
};

const ROUTINE_TRACKS_TABLE: Table = Table {
    name: "routine_tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "routine_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ROUTINE_FK)
        ),
        sqlite_column!("track_base44_id", &SqlType::Text, non_null = true),
        // Back-filled once the referenced track is present in the catalog
        sqlite_column!("track_id", &SqlType::Integer),
        sqlite_column!("track_order", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_routine_tracks_routine", "routine_id")],
    unique_indices: &[("uq_routine_tracks_order", "routine_id, track_order")],
};

// =============================================================================
// Feedback
// =============================================================================

const TRACK_FEEDBACK_TABLE_V0: Table = Table {
    name: "track_feedback",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("base44_id", &SqlType::Text),
        sqlite_column!("track_title", &SqlType::Text, non_null = true),
        sqlite_column!("track_artist", &SqlType::Text),
        sqlite_column!("spotify_id", &SqlType::Text),
        sqlite_column!("rating", &SqlType::Text, non_null = true),
        sqlite_column!("context", &SqlType::Text),
        sqlite_column!("updated_at", &SqlType::Text),
    ],
    indices: &[("idx_track_feedback_title", "track_title")],
    unique_indices: &[],
};

const TRACK_FEEDBACK_TABLE_V1: Table = Table {
    name: "track_feedback",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("base44_id", &SqlType::Text),
        sqlite_column!("track_title", &SqlType::Text, non_null = true),
        sqlite_column!("track_artist", &SqlType::Text),
        sqlite_column!("spotify_id", &SqlType::Text),
        sqlite_column!("rating", &SqlType::Text, non_null = true),
        sqlite_column!("context", &SqlType::Text),
        sqlite_column!("updated_at", &SqlType::Text),
        sqlite_column!("audience", &SqlType::Text),
    ],
    indices: &[("idx_track_feedback_title", "track_title")],
    unique_indices: &[(
        "uq_track_feedback_key",
        "track_title, rating, COALESCE(context, ''), COALESCE(audience, '')",
    )],
};

/// Version 1 introduces audience-scoped feedback. Rows that would collide on
/// the new key are collapsed, keeping the most recent one.
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE track_feedback ADD COLUMN audience TEXT", [])?;
    conn.execute(
        "DELETE FROM track_feedback WHERE id NOT IN (
            SELECT MAX(id) FROM track_feedback
            GROUP BY track_title, rating, COALESCE(context, ''), COALESCE(audience, '')
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX uq_track_feedback_key ON track_feedback(
            track_title, rating, COALESCE(context, ''), COALESCE(audience, ''))",
        [],
    )?;
    Ok(())
}

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            TRACKS_TABLE,
            ROUTINES_TABLE,
            ROUTINE_TRACKS_TABLE,
            TRACK_FEEDBACK_TABLE_V0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            TRACKS_TABLE,
            ROUTINES_TABLE,
            ROUTINE_TRACKS_TABLE,
            TRACK_FEEDBACK_TABLE_V1,
        ],
        migration: Some(migrate_v0_to_v1),
    },
];
