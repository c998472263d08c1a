//! Assembler behaviour against mocked collaborators.
//! Needs `--features mock`.

#![cfg(feature = "mock")]

use anyhow::anyhow;
use choreography_server::assembler::PlaylistAssembler;
use choreography_server::catalog_store::MockCatalogAccessor;
use choreography_server::config::EngineSettings;
use choreography_server::gap_fill::{GapFillOutcome, MockGapFiller, TrackStub};
use choreography_server::planner::IntensityArc;
use choreography_server::request::PlaylistRequest;
use std::sync::Arc;

fn climb_request() -> PlaylistRequest {
    PlaylistRequest {
        duration_minutes: 5.0,
        intensity_arc: Some(IntensityArc::Text("Climb:5".to_string())),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_unreadable_feedback_does_not_stop_a_build() {
    let mut catalog = MockCatalogAccessor::new();
    catalog
        .expect_list_feedback()
        .times(1)
        .returning(|| Err(anyhow!("feedback table is locked")));
    catalog.expect_find_tracks().returning(|_| Ok(Vec::new()));

    let assembler = PlaylistAssembler::new(Arc::new(catalog), EngineSettings::default());
    let routine = assembler.build(&climb_request()).await.unwrap();
    assert!(routine.entries.is_empty());
    assert_eq!(routine.unfilled_slots.len(), 1);
}

#[tokio::test]
async fn test_recommend_asks_for_the_whole_class_once() {
    let mut catalog = MockCatalogAccessor::new();
    catalog.expect_list_feedback().returning(|| Ok(Vec::new()));
    catalog
        .expect_find_track_by_title_artist()
        .times(1)
        .returning(|_, _| Ok(None));
    catalog.expect_find_tracks().never();

    let mut filler = MockGapFiller::new();
    filler.expect_source().return_const("mock:class".to_string());
    filler.expect_fill().never();
    filler
        .expect_recommend()
        .withf(|brief, context| brief.track_count == 8 && context.already_chosen.is_empty())
        .times(1)
        .returning(|_, _| {
            GapFillOutcome::Suggestions(vec![TrackStub {
                title: "Hill Repeat".to_string(),
                artist: "Cadence".to_string(),
                duration_minutes: Some(4.0),
                bpm: Some(124.0),
                intensity: None,
                focus_area: Some("climb".to_string()),
                notes: None,
            }])
        });

    let assembler = PlaylistAssembler::new(Arc::new(catalog), EngineSettings::default())
        .with_gap_filler(Arc::new(filler));
    let result = assembler.recommend(&climb_request()).await.unwrap();
    assert_eq!(result.source, "mock:class");
    assert_eq!(result.tracks.len(), 1);
    assert_eq!(result.tracks[0].suggest_type, "climb");
    assert_eq!(result.tracks[0].bpm, Some(124.0));
    assert_eq!(result.in_catalog, 0);
}
