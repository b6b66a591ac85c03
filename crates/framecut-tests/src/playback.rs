//! Playback scheduling against a live compositor.

use crate::mocks::{video_clip, SolidFactory};
use framecut_core::PreviewConfig;
use framecut_render::{ManualClock, PlaybackScheduler, PreviewCompositor, TickOutcome};
use framecut_timeline::{Timeline, TimelineEvent};
use std::collections::BTreeMap;
use std::path::Path;

fn setup(duration: f64) -> (Timeline, PreviewCompositor, PlaybackScheduler<ManualClock>, ManualClock) {
    let mut tl = Timeline::default();
    tl.add_clip(video_clip("red", Path::new("red.mp4"), duration)).unwrap();
    let factory = SolidFactory {
        colors: BTreeMap::from([("red.mp4".to_string(), [255, 0, 0, 255])]),
        ..SolidFactory::default()
    };
    let compositor = PreviewCompositor::new(&PreviewConfig::default(), Box::new(factory));
    let clock = ManualClock::new(0.0);
    let scheduler = PlaybackScheduler::new(clock.clone());
    (tl, compositor, scheduler, clock)
}

#[test]
fn ticks_present_frames_until_completion() {
    let (mut tl, mut compositor, mut scheduler, clock) = setup(1.0);
    let events = tl.subscribe();

    let mut handle = scheduler.play(&mut tl, &mut compositor);
    let mut ticks = 0;
    let outcome = loop {
        clock.advance(1.0 / 60.0);
        match scheduler.tick(handle, &mut tl, &mut compositor) {
            TickOutcome::Continue(next) => handle = next,
            done => break done,
        }
        ticks += 1;
        assert!(ticks < 1000, "playback never completed");
    };

    assert_eq!(outcome, TickOutcome::Completed);
    assert_eq!(tl.current_time(), 1.0);
    let last = compositor.last_frame().unwrap();
    assert_eq!(last.time, 1.0);

    let times: Vec<f64> = events
        .try_iter()
        .filter_map(|e| match e {
            TimelineEvent::TimeUpdate { time } => Some(time),
            _ => None,
        })
        .collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(times.last(), Some(&1.0));
}

#[test]
fn presented_frame_shows_active_clip() {
    let (mut tl, mut compositor, mut scheduler, clock) = setup(5.0);
    let handle = scheduler.play(&mut tl, &mut compositor);
    clock.advance(0.5);
    let _ = scheduler.tick(handle, &mut tl, &mut compositor);

    let frame = compositor.last_frame().unwrap();
    assert_eq!(frame.drawn.len(), 1);
    // 16:9 source fills the 16:9 preview
    assert_eq!(frame.buffer.pixel(10, 10), Some([255, 0, 0, 255]));
}

#[test]
fn stop_then_stale_tick_changes_nothing() {
    let (mut tl, mut compositor, mut scheduler, clock) = setup(5.0);
    let handle = scheduler.play(&mut tl, &mut compositor);
    clock.advance(0.25);
    let TickOutcome::Continue(next) = scheduler.tick(handle, &mut tl, &mut compositor) else {
        panic!("expected playback to continue");
    };
    scheduler.stop(&mut tl);
    let events = tl.subscribe();
    clock.advance(2.0);

    assert_eq!(scheduler.tick(next, &mut tl, &mut compositor), TickOutcome::Cancelled);
    assert!((tl.current_time() - 0.25).abs() < 1e-9);
    assert!(events.try_iter().next().is_none());
}

#[test]
fn frame_steps_while_stopped() {
    let (mut tl, mut compositor, mut scheduler, _clock) = setup(5.0);
    scheduler.seek(&mut tl, &mut compositor, 1.0);
    tl.step_frames(3);
    assert!((tl.current_time() - 1.1).abs() < 1e-9);
    tl.step_frames(-100);
    assert_eq!(tl.current_time(), 0.0);
    tl.seek_to_end();
    assert_eq!(tl.current_time(), 5.0);
    assert_eq!(compositor.last_frame().map(|f| f.time), Some(1.0));
}
