//! Catalog queries against a database laid out by the sync process.

mod common;

use choreography_server::catalog_store::{
    CatalogAccessor, Intensity, Rating, SqliteCatalogStore, TopRatedQuery, TrackFilters,
};
use common::*;

#[test]
fn test_filters_combine() {
    let catalog = TestCatalog::standard().unwrap();
    let store = &catalog.store;

    let all = store.find_tracks(&TrackFilters::default()).unwrap();
    assert_eq!(all.len(), 4);
    let ids: Vec<i64> = all.iter().map(|t| t.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let low = store
        .find_tracks(&TrackFilters::default().with_intensities(&[Intensity::Low]))
        .unwrap();
    let titles: Vec<&str> = low.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec![WARMUP_TRACK_TITLE, COOLDOWN_TRACK_TITLE]);

    let fast = store
        .find_tracks(&TrackFilters::default().with_bpm_range(120.0, 135.0))
        .unwrap();
    assert_eq!(fast.len(), 1);
    assert_eq!(fast[0].title, CLIMB_TRACK_TITLE);

    let short = store
        .find_tracks(&TrackFilters::default().with_max_duration(4.0))
        .unwrap();
    let titles: Vec<&str> = short.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec![CLIMB_TRACK_TITLE, SPRINT_TRACK_TITLE]);

    let typed = store
        .find_tracks(
            &TrackFilters::default()
                .with_track_types(&["sprint", "cooldown"])
                .with_intensities(&[Intensity::Extreme]),
        )
        .unwrap();
    assert_eq!(typed.len(), 1);
    assert_eq!(typed[0].title, SPRINT_TRACK_TITLE);

    let limited = store
        .find_tracks(&TrackFilters::default().with_limit(2))
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn test_artist_and_keyword_filters() {
    let catalog = TestCatalog::standard().unwrap();
    catalog
        .insert_tracks(&[TrackSeed::new("100% Pure", "Under_Score")
            .shaped("build", "medium", 120.0, 4.0)
            .notes("great for standing climbs")])
        .unwrap();
    let store = &catalog.store;

    let filters = TrackFilters {
        artist: Some("easy riders".to_string()),
        ..Default::default()
    };
    assert_eq!(store.find_tracks(&filters).unwrap().len(), 2);

    let filters = TrackFilters {
        keyword: Some("standing".to_string()),
        ..Default::default()
    };
    let found = store.find_tracks(&filters).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "100% Pure");

    // LIKE wildcards in input are literal.
    let filters = TrackFilters {
        keyword: Some("%".to_string()),
        ..Default::default()
    };
    assert_eq!(store.find_tracks(&filters).unwrap().len(), 1);
    let filters = TrackFilters {
        artist: Some("y_r".to_string()),
        ..Default::default()
    };
    assert!(store.find_tracks(&filters).unwrap().is_empty());
}

#[test]
fn test_title_lookups() {
    let catalog = TestCatalog::standard().unwrap();
    let store = &catalog.store;

    let track = store.get_track_by_title("mountain").unwrap().unwrap();
    assert_eq!(track.title, CLIMB_TRACK_TITLE);
    assert_eq!(track.spotify_id.as_deref(), Some("sp-climb"));
    assert!(store.get_track_by_title("nonexistent").unwrap().is_none());

    let exact = store
        .find_track_by_title_artist("  slow roll", "EASY RIDERS ")
        .unwrap()
        .unwrap();
    assert_eq!(exact.title, COOLDOWN_TRACK_TITLE);
    assert!(store
        .find_track_by_title_artist(COOLDOWN_TRACK_TITLE, "Someone Else")
        .unwrap()
        .is_none());
}

#[test]
fn test_track_stats() {
    let catalog = TestCatalog::standard().unwrap();
    catalog
        .insert_tracks(&[TrackSeed::new("Untagged", "Nobody")])
        .unwrap();

    let stats = catalog.store.get_track_stats().unwrap();
    assert_eq!(stats.total_tracks, 5);
    assert_eq!(stats.tracks_with_bpm, 4);
    assert_eq!(stats.min_bpm, Some(92.0));
    assert_eq!(stats.max_bpm, Some(140.0));
    assert_eq!(stats.total_duration_minutes, Some(17.0));

    assert_eq!(stats.by_intensity[0].label, "low");
    assert_eq!(stats.by_intensity[0].count, 2);
    assert!(stats
        .by_track_type
        .iter()
        .any(|c| c.label == "unspecified" && c.count == 1));
}

#[test]
fn test_empty_catalog_stats() {
    let catalog = TestCatalog::empty().unwrap();
    let stats = catalog.store.get_track_stats().unwrap();
    assert_eq!(stats.total_tracks, 0);
    assert_eq!(stats.min_bpm, None);
    assert!(stats.by_intensity.is_empty());
}

#[test]
fn test_feedback_listing_and_ratings() {
    let catalog = TestCatalog::standard().unwrap();
    catalog
        .insert_feedback(
            CLIMB_TRACK_TITLE,
            Some(CLIMB_TRACK_ARTIST),
            "up",
            Some(CLIMB_CONTEXT),
            None,
        )
        .unwrap();
    catalog
        .insert_feedback(SPRINT_TRACK_TITLE, None, "4", None, Some(AUDIENCE_50_PLUS))
        .unwrap();
    catalog
        .insert_feedback(WARMUP_TRACK_TITLE, None, "Thumbs_Down", Some(""), None)
        .unwrap();
    catalog
        .insert_feedback(COOLDOWN_TRACK_TITLE, None, "meh", None, None)
        .unwrap();

    let rows = catalog.store.list_feedback().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].rating, Rating::Up);
    assert_eq!(rows[0].context.as_deref(), Some(CLIMB_CONTEXT));
    assert_eq!(rows[1].rating, Rating::Stars(4));
    assert_eq!(rows[1].audience.as_deref(), Some(AUDIENCE_50_PLUS));
    assert_eq!(rows[2].rating, Rating::Down);
    assert_eq!(rows[2].context, None);
}

#[test]
fn test_top_rated_groups_and_filters() {
    let catalog = TestCatalog::standard().unwrap();
    catalog
        .insert_feedback(
            CLIMB_TRACK_TITLE,
            Some(CLIMB_TRACK_ARTIST),
            "up",
            Some(CLIMB_CONTEXT),
            None,
        )
        .unwrap();
    // One row per title, rating, context and audience.
    assert!(catalog
        .insert_feedback(CLIMB_TRACK_TITLE, None, "up", Some(CLIMB_CONTEXT), None)
        .is_err());
    catalog
        .insert_feedback(
            SPRINT_TRACK_TITLE,
            Some(SPRINT_TRACK_ARTIST),
            "up",
            Some("peak"),
            Some(AUDIENCE_50_PLUS),
        )
        .unwrap();
    catalog
        .insert_feedback(WARMUP_TRACK_TITLE, None, "down", Some("warmup"), None)
        .unwrap();
    let store = &catalog.store;

    let top = store
        .get_top_rated_tracks(&TopRatedQuery {
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].track_title, CLIMB_TRACK_TITLE);
    assert_eq!(top[0].rating_count, 1);
    assert_eq!(top[0].bpm, Some(128.0));
    assert_eq!(top[0].track_type.as_deref(), Some("climb"));

    let for_audience = store
        .get_top_rated_tracks(&TopRatedQuery {
            audience: Some("50+".to_string()),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(for_audience.len(), 1);
    assert_eq!(for_audience[0].track_title, SPRINT_TRACK_TITLE);

    let disliked = store
        .get_top_rated_tracks(&TopRatedQuery {
            rating: Some("down".to_string()),
            context: Some("warm".to_string()),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(disliked.len(), 1);
    assert_eq!(disliked[0].track_title, WARMUP_TRACK_TITLE);
}

#[test]
fn test_feedback_summary() {
    let catalog = TestCatalog::standard().unwrap();
    catalog
        .insert_feedback(CLIMB_TRACK_TITLE, None, "up", Some(CLIMB_CONTEXT), None)
        .unwrap();
    catalog
        .insert_feedback(CLIMB_TRACK_TITLE, None, "down", Some(CLIMB_CONTEXT), None)
        .unwrap();
    catalog
        .insert_feedback(SPRINT_TRACK_TITLE, None, "up", Some(CLIMB_CONTEXT), None)
        .unwrap();
    catalog
        .insert_feedback(WARMUP_TRACK_TITLE, None, "up", None, None)
        .unwrap();

    let summary = catalog.store.get_feedback_summary().unwrap();
    assert_eq!(summary.overall.total_feedback, 4);
    assert_eq!(summary.overall.total_up, 3);
    assert_eq!(summary.overall.total_down, 1);
    assert_eq!(summary.overall.unique_tracks, 3);

    assert_eq!(summary.by_context[0].context, CLIMB_CONTEXT);
    assert_eq!(summary.by_context[0].up_count, 2);
    assert_eq!(summary.by_context[0].down_count, 1);
    assert_eq!(summary.by_context[0].unique_tracks, 2);
    assert_eq!(summary.by_context[1].context, "unspecified");

    let empty = TestCatalog::empty().unwrap();
    let summary = empty.store.get_feedback_summary().unwrap();
    assert_eq!(summary.overall.total_feedback, 0);
    assert_eq!(summary.overall.total_up, 0);
    assert!(summary.by_context.is_empty());
}

#[test]
fn test_stored_routines() {
    let catalog = TestCatalog::standard().unwrap();
    catalog
        .insert_routine("Hill Day", "Advanced", &["sp-warmup", "sp-climb"])
        .unwrap();
    catalog
        .insert_routine("Easy Spin", "beginner", &["sp-warmup"])
        .unwrap();
    let store = &catalog.store;

    let all = store.list_routines(None, 10).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "Hill Day");
    assert_eq!(all[0].tags, vec!["stored".to_string()]);
    let links: Vec<(i64, &str)> = all[0]
        .tracks
        .iter()
        .map(|t| (t.order, t.external_track_id.as_str()))
        .collect();
    assert_eq!(links, vec![(1, "sp-warmup"), (2, "sp-climb")]);

    let advanced = store
        .list_routines(Some("advanced".to_string()), 10)
        .unwrap();
    assert_eq!(advanced.len(), 1);
    assert_eq!(advanced[0].name, "Hill Day");

    assert_eq!(store.list_routines(None, 1).unwrap().len(), 1);
    assert!(store
        .list_routines(Some("expert".to_string()), 10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_reopening_keeps_data() {
    let catalog = TestCatalog::standard().unwrap();
    let reopened = SqliteCatalogStore::new(&catalog.db_path, 1).unwrap();
    assert_eq!(
        reopened.find_tracks(&TrackFilters::default()).unwrap().len(),
        4
    );
}
