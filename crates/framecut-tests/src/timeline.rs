//! Integration tests for the timeline subsystem.
//!
//! Exercises cross-crate interactions between framecut-core,
//! framecut-timeline, and framecut-render.

use crate::mocks::{audio_clip, video_clip, SolidFactory};
use framecut_core::{FramecutError, PreviewConfig, TimelineConfig};
use framecut_render::PreviewCompositor;
use framecut_timeline::{
    ClipId, ProjectFile, ResizeEdge, Timeline, TimelineEvent, TrackId, TrackKind,
};
use proptest::prelude::*;
use std::path::Path;

// ── Helpers ────────────────────────────────────────────────────

fn build_timeline() -> Timeline {
    let mut tl = Timeline::default();
    tl.set_name("Integration Test Project");
    tl.add_clip(video_clip("Intro", Path::new("intro.mp4"), 5.0).with_id("intro"))
        .unwrap();
    tl.add_clip(video_clip("Body", Path::new("body.mp4"), 30.0).with_id("body").at(5.0))
        .unwrap();
    tl.add_clip(audio_clip("Music", Path::new("music.wav"), 45.0).with_id("music"))
        .unwrap();
    tl
}

fn video1() -> TrackId {
    TrackId::new("video-track-1")
}

// ── Assembly & timing ──────────────────────────────────────────

#[test]
fn duration_is_latest_clip_end() {
    let tl = build_timeline();
    assert_eq!(tl.duration(), 45.0);
    assert!(tl.is_consistent());
}

#[test]
fn overlapping_add_lands_on_new_track() {
    let mut tl = build_timeline();
    let track = tl
        .add_clip(video_clip("Overlay", Path::new("logo.mp4"), 3.0).at(4.0))
        .unwrap();
    assert_eq!(track, TrackId::new("video-track-2"));
    assert_eq!(tl.tracks_of_kind(TrackKind::Video).count(), 2);
}

#[test]
fn active_clips_follow_track_order() {
    let mut tl = build_timeline();
    tl.add_clip(video_clip("Overlay", Path::new("logo.mp4"), 3.0).at(4.0))
        .unwrap();
    let active: Vec<String> = tl
        .active_clips_at(4.5)
        .iter()
        .map(|a| a.clip.name.clone())
        .collect();
    assert_eq!(active, ["Intro", "Music", "Overlay"]);
}

#[test]
fn boundary_belongs_to_following_clip() {
    let tl = build_timeline();
    let ids: Vec<&ClipId> = tl.active_clips_at(5.0).iter().map(|a| &a.clip.id).collect();
    assert_eq!(ids, [&ClipId::new("body"), &ClipId::new("music")]);
}

// ── Edits ──────────────────────────────────────────────────────

#[test]
fn split_then_remove_second_half() {
    let mut tl = build_timeline();
    tl.seek(10.0);
    let splits = tl.split_at_playhead();
    assert_eq!(splits.len(), 2);

    tl.remove_clip(&ClipId::new("body-part2")).unwrap();
    tl.remove_clip(&ClipId::new("music-part2")).unwrap();
    assert_eq!(tl.duration(), 10.0);
    assert!(tl.is_consistent());
}

#[test]
fn resize_is_rejected_on_locked_track() {
    let mut tl = build_timeline();
    tl.set_track_locked(&video1(), true).unwrap();
    let err = tl
        .resize_clip(&ClipId::new("intro"), ResizeEdge::Right, 2.0)
        .unwrap_err();
    assert!(matches!(err, FramecutError::TrackLocked { .. }));
    assert_eq!(tl.clip(&ClipId::new("intro")).unwrap().duration(), 5.0);
}

#[test]
fn blocked_move_leaves_everything_in_place() {
    let mut tl = build_timeline();
    let before = tl.snapshot();
    let err = tl.move_clip(&ClipId::new("intro"), 6.0, None).unwrap_err();
    assert!(matches!(err, FramecutError::OverlapConflict { .. }));
    assert_eq!(tl.snapshot(), before);
}

#[test]
fn edits_emit_events_in_order() {
    let mut tl = Timeline::default();
    let rx = tl.subscribe();
    tl.add_clip(video_clip("A", Path::new("a.mp4"), 4.0).with_id("a"))
        .unwrap();
    tl.move_clip(&ClipId::new("a"), 1.0, None).unwrap();
    tl.remove_clip(&ClipId::new("a")).unwrap();

    let names: Vec<&str> = rx.try_iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        [
            "clipAdded",
            "durationChanged",
            "clipMoved",
            "durationChanged",
            "clipRemoved",
            "durationChanged",
        ]
    );
}

// ── Persistence ────────────────────────────────────────────────

#[test]
fn project_file_round_trip_through_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("project.json");
    let mut tl = build_timeline();
    tl.add_clip(video_clip("Overlay", Path::new("logo.mp4"), 3.0).at(4.0))
        .unwrap();
    tl.set_track_muted(&TrackId::new("video-track-2"), true).unwrap();
    tl.zoom_in();
    tl.seek(12.5);

    ProjectFile::new(&tl).save_to_file(&path).unwrap();
    let restored = ProjectFile::load_from_file(&path)
        .unwrap()
        .into_timeline(TimelineConfig::default())
        .unwrap();

    assert_eq!(restored.snapshot(), tl.snapshot());
    assert!(restored.is_consistent());
    // counters continue after restored ids
    let mut restored = restored;
    assert_eq!(restored.add_track(TrackKind::Video), TrackId::new("video-track-3"));
}

#[test]
fn tampered_project_with_overlap_is_rejected() {
    let tl = build_timeline();
    let mut project = ProjectFile::new(&tl);
    project.timeline.clips[1].track_start_time = 1.0;
    let json = project.to_json().unwrap();
    let reloaded = ProjectFile::from_json(&json).unwrap();
    assert!(reloaded.into_timeline(TimelineConfig::default()).is_err());
}

// ── Preview handles ────────────────────────────────────────────

#[test]
fn removing_clip_releases_preview_handle() {
    let mut tl = build_timeline();
    let mut compositor =
        PreviewCompositor::new(&PreviewConfig::default(), Box::new(SolidFactory::default()));
    compositor.attach(&mut tl);

    compositor.render(&tl, 1.0);
    assert!(compositor.cache().contains(&ClipId::new("intro")));

    tl.remove_clip(&ClipId::new("intro")).unwrap();
    compositor.sync_events();
    assert!(!compositor.cache().contains(&ClipId::new("intro")));
}

#[test]
fn muted_video_track_is_not_drawn() {
    let mut tl = build_timeline();
    tl.set_track_muted(&video1(), true).unwrap();
    let mut compositor =
        PreviewCompositor::new(&PreviewConfig::default(), Box::new(SolidFactory::default()));

    let frame = compositor.render(&tl, 1.0);
    assert!(frame.drawn.is_empty());
    assert_eq!(frame.audible, [ClipId::new("music")]);
    assert_eq!(frame.buffer.pixel(320, 180), Some([0, 0, 0, 255]));
}

// ── Invariants ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_any_placement_sequence_stays_consistent(
        starts in proptest::collection::vec((0.0f64..20.0, 0.5f64..5.0), 1..20),
    ) {
        let mut tl = Timeline::default();
        for (i, (start, len)) in starts.into_iter().enumerate() {
            let clip = video_clip(&format!("c{i}"), Path::new("x.mp4"), len).at(start);
            tl.add_clip(clip).unwrap();
        }
        prop_assert!(tl.is_consistent());
        for track in tl.tracks() {
            let slots = track.slots();
            prop_assert!(slots.windows(2).all(|w| w[0].end <= w[1].start));
        }
        let events = tl.subscribe();
        tl.seek(tl.duration() + 10.0);
        prop_assert_eq!(tl.current_time(), tl.duration());
        prop_assert!(events.try_iter().any(|e| matches!(e, TimelineEvent::TimeUpdate { .. })), "expected a TimeUpdate event");
    }
}
