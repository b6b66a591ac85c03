//! Export pipeline driven against the in-memory codec engine.

use crate::mocks::{audio_clip, video_clip, MockEngine};
use framecut_core::{FrameRate, FramecutError};
use framecut_render::{ExportCancel, ExportPhase, ExportProgress, ExportRenderer, ExportSettings};
use framecut_timeline::{Timeline, TrackId, TrackKind};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ── Helpers ────────────────────────────────────────────────────

fn media_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.mp4"), b"video-a").unwrap();
    std::fs::write(dir.path().join("b.mp4"), b"video-b").unwrap();
    std::fs::write(dir.path().join("music.wav"), b"audio").unwrap();
    dir
}

fn settings() -> ExportSettings {
    ExportSettings::new(64, 36, FrameRate::FPS_30, 80)
}

fn two_second_timeline(dir: &Path) -> Timeline {
    let mut tl = Timeline::default();
    tl.add_clip(video_clip("a", &dir.join("a.mp4"), 2.0)).unwrap();
    tl
}

fn run(
    renderer: &ExportRenderer<MockEngine>,
    timeline: &Timeline,
    output: &Path,
) -> (framecut_core::Result<framecut_render::ExportReport>, Vec<ExportProgress>) {
    let mut seen = Vec::new();
    let result = renderer.export(
        timeline,
        &settings(),
        output,
        &mut |p| seen.push(p),
        &ExportCancel::new(),
    );
    (result, seen)
}

fn output_in(dir: &TempDir) -> PathBuf {
    dir.path().join("out").join("export.mp4")
}

// ── Frame stepping ─────────────────────────────────────────────

#[test]
fn two_seconds_at_30fps_renders_60_exact_frames() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    let (result, _) = run(&renderer, &tl, &output_in(&dir));
    let report = result.unwrap();
    assert_eq!(report.frames, 60);
    assert_eq!(engine.state.lock().muxed_frames, 60);

    let seeks = engine.decode_seeks();
    assert_eq!(seeks.len(), 60);
    for (i, seek) in seeks.iter().enumerate() {
        assert_eq!(*seek, format!("{:.6}", i as f64 / 30.0));
    }
}

#[test]
fn fractional_duration_rounds_frame_count_up() {
    let dir = media_dir();
    let mut tl = Timeline::default();
    tl.add_clip(video_clip("a", &dir.path().join("a.mp4"), 1.01)).unwrap();
    let renderer = ExportRenderer::new(MockEngine::default());

    let (result, _) = run(&renderer, &tl, &output_in(&dir));
    assert_eq!(result.unwrap().frames, 31);
}

#[test]
fn sources_are_optimized_once_with_keyframe_every_frame() {
    let dir = media_dir();
    let mut tl = two_second_timeline(dir.path());
    // second clip of the same file on a new track
    let v2 = tl.add_track(TrackKind::Video);
    tl.add_clip_to_track(video_clip("a2", &dir.path().join("a.mp4"), 2.0), &v2)
        .unwrap();
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    run(&renderer, &tl, &output_in(&dir)).0.unwrap();
    let optimize = engine.commands_writing("optimized_0.mp4");
    assert_eq!(optimize.len(), 1);
    let cmd = &optimize[0];
    assert!(cmd.windows(2).any(|w| w[0] == "-g" && w[1] == "1"));
    assert!(cmd.windows(2).any(|w| w[0] == "-preset" && w[1] == "ultrafast"));
    assert!(engine.commands_writing("optimized_1.mp4").is_empty());
    // both layers decoded on every frame
    assert_eq!(engine.decode_seeks().len(), 120);
}

#[test]
fn video_mux_uses_frame_rate_and_pattern() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    run(&renderer, &tl, &output_in(&dir)).0.unwrap();
    let mux = engine.commands_writing("output.mp4");
    assert_eq!(
        mux[0],
        [
            "-framerate",
            "30/1",
            "-i",
            "frames/frame_%06d.jpg",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "output.mp4"
        ]
    );
}

// ── Output and cleanup ─────────────────────────────────────────

#[test]
fn output_file_holds_final_container() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let renderer = ExportRenderer::new(MockEngine::default());
    let output = output_in(&dir);

    let report = run(&renderer, &tl, &output).0.unwrap();
    assert_eq!(report.output_path, output);
    assert_eq!(std::fs::read(&output).unwrap(), b"mock:final_output.mp4");
    assert_eq!(report.bytes, b"mock:final_output.mp4".len());
}

#[test]
fn intermediates_are_removed_after_export() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    run(&renderer, &tl, &output_in(&dir)).0.unwrap();
    assert!(engine.file_names().is_empty(), "left: {:?}", engine.file_names());
}

#[test]
fn empty_timeline_is_rejected() {
    let dir = media_dir();
    let renderer = ExportRenderer::new(MockEngine::default());
    let (result, seen) = run(&renderer, &Timeline::default(), &output_in(&dir));
    assert!(matches!(result, Err(FramecutError::InvalidParameter(_))));
    assert!(seen.is_empty());
    assert!(!renderer.is_exporting());
}

// ── Progress ───────────────────────────────────────────────────

#[test]
fn progress_is_monotonic_and_completes_once() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let renderer = ExportRenderer::new(MockEngine::default());

    let (result, seen) = run(&renderer, &tl, &output_in(&dir));
    result.unwrap();
    assert!(seen.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    assert_eq!(seen.iter().filter(|p| p.fraction >= 1.0).count(), 1);
    let last = seen.last().unwrap();
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.phase, ExportPhase::Done);
    for phase in [ExportPhase::Preparing, ExportPhase::Frames, ExportPhase::VideoMux, ExportPhase::AudioMux] {
        assert!(seen.iter().any(|p| p.phase == phase), "{phase:?} not reported");
    }
    let frames: Vec<u64> = seen
        .iter()
        .filter(|p| p.phase == ExportPhase::Frames)
        .map(|p| p.current_frame)
        .collect();
    assert_eq!(frames, (1..=60).collect::<Vec<_>>());
}

// ── Failures and the in-progress guard ─────────────────────────

#[test]
fn second_export_while_running_is_refused() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let renderer = ExportRenderer::new(MockEngine::default());
    let output = output_in(&dir);
    let nested_output = dir.path().join("nested.mp4");

    let mut nested = None;
    let mut on_progress = |_: ExportProgress| {
        if nested.is_none() {
            nested = Some(renderer.export(
                &tl,
                &settings(),
                &nested_output,
                &mut |_| {},
                &ExportCancel::new(),
            ));
        }
    };
    renderer
        .export(&tl, &settings(), &output, &mut on_progress, &ExportCancel::new())
        .unwrap();

    assert!(matches!(nested, Some(Err(FramecutError::ExportInProgress))));
    assert!(!nested_output.exists());
    assert!(!renderer.is_exporting());
}

#[test]
fn encode_failure_aborts_and_resets_guard() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let engine = MockEngine::failing_on("output.mp4");
    let renderer = ExportRenderer::new(engine.clone());
    let output = output_in(&dir);

    let (result, seen) = run(&renderer, &tl, &output);
    assert!(matches!(result, Err(FramecutError::EncodeFailure(_))));
    assert!(!renderer.is_exporting());
    assert!(!output.exists());
    assert!(seen.iter().all(|p| p.fraction < 1.0));
    assert!(engine.file_names().is_empty());

    engine.state.lock().fail_output = None;
    let (retry, _) = run(&renderer, &tl, &output);
    assert_eq!(retry.unwrap().frames, 60);
}

#[test]
fn frame_decode_failure_is_a_render_failure() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let renderer = ExportRenderer::new(MockEngine::failing_on("decode_1.rgba"));

    let (result, _) = run(&renderer, &tl, &output_in(&dir));
    match result {
        Err(FramecutError::RenderFailure { clip_id, .. }) => {
            assert_eq!(clip_id, tl.clips()[0].id.to_string());
        }
        other => panic!("expected render failure, got {other:?}"),
    }
    assert!(!renderer.is_exporting());
}

#[test]
fn missing_source_file_fails_export() {
    let dir = media_dir();
    let mut tl = Timeline::default();
    tl.add_clip(video_clip("gone", &dir.path().join("gone.mp4"), 1.0))
        .unwrap();
    let renderer = ExportRenderer::new(MockEngine::default());

    let (result, _) = run(&renderer, &tl, &output_in(&dir));
    assert!(matches!(result, Err(FramecutError::EncodeFailure(_))));
}

#[test]
fn cancellation_stops_between_frames() {
    let dir = media_dir();
    let tl = two_second_timeline(dir.path());
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());
    let cancel = ExportCancel::new();
    let output = output_in(&dir);

    let handle = cancel.clone();
    let mut on_progress = |p: ExportProgress| {
        if p.current_frame == 10 {
            handle.cancel();
        }
    };
    let result = renderer.export(&tl, &settings(), &output, &mut on_progress, &cancel);

    assert!(matches!(result, Err(FramecutError::ExportCancelled)));
    assert_eq!(engine.decode_seeks().len(), 10);
    assert!(engine.commands_writing("output.mp4").is_empty());
    assert!(engine.file_names().is_empty());
    assert!(!output.exists());
    assert!(!renderer.is_exporting());
}

// ── Audio ──────────────────────────────────────────────────────

#[test]
fn audio_is_trimmed_delayed_and_mixed() {
    let dir = media_dir();
    let mut tl = two_second_timeline(dir.path());
    let music = audio_clip("music", &dir.path().join("music.wav"), 10.0)
        .with_span(3.0, 4.5)
        .at(0.5);
    tl.add_clip(music).unwrap();
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    let report = run(&renderer, &tl, &output_in(&dir)).0.unwrap();
    assert_eq!(report.audio_clips, 1);

    let cmd = &engine.commands_writing("final_output.mp4")[0];
    let filter = cmd
        .iter()
        .position(|a| a == "-filter_complex")
        .map(|i| cmd[i + 1].clone())
        .unwrap();
    assert!(filter.contains("[1:a]atrim=start=3.000000:end=4.500000"));
    assert!(filter.contains("adelay=500|500"));
    assert!(filter.ends_with("[aout]"));
    assert!(cmd.windows(2).any(|w| w[0] == "-t" && w[1] == "2.000000"));
    assert!(cmd.windows(2).any(|w| w[0] == "-map" && w[1] == "[aout]"));
}

#[test]
fn muted_audio_track_exports_silent_copy() {
    let dir = media_dir();
    let mut tl = two_second_timeline(dir.path());
    tl.add_clip(audio_clip("music", &dir.path().join("music.wav"), 1.0))
        .unwrap();
    tl.set_track_muted(&TrackId::new("audio-track-1"), true).unwrap();
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    let report = run(&renderer, &tl, &output_in(&dir)).0.unwrap();
    assert_eq!(report.audio_clips, 0);
    assert_eq!(
        engine.commands_writing("final_output.mp4")[0],
        ["-i", "output.mp4", "-c:v", "copy", "final_output.mp4"]
    );
}

#[test]
fn audio_only_timeline_renders_black_frames() {
    let dir = media_dir();
    let mut tl = Timeline::default();
    tl.add_clip(audio_clip("music", &dir.path().join("music.wav"), 1.0))
        .unwrap();
    let engine = MockEngine::default();
    let renderer = ExportRenderer::new(engine.clone());

    let report = run(&renderer, &tl, &output_in(&dir)).0.unwrap();
    assert_eq!(report.frames, 30);
    assert!(engine.decode_seeks().is_empty());
    assert!(engine.commands_writing("optimized_0.mp4").is_empty());
}
