//! Playback scheduling.
//!
//! The scheduler maps wall-clock time onto timeline time while the transport
//! is playing. Each tick reads the clock, moves the playhead, then hands the
//! frame time to a [`FrameTarget`]. Ticks are identified by a [`TickHandle`];
//! stopping invalidates the pending handle, so a tick that was already
//! scheduled never touches the timeline again.

use framecut_timeline::{Timeline, TransportState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::compositor::FrameTarget;

/// Source of wall-clock time in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Monotonic clock starting at zero when created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, time: f64) {
        *self.now.lock() = time;
    }

    pub fn advance(&self, seconds: f64) {
        *self.now.lock() += seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// Identifies one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a tick only runs when its handle is passed to `tick`"]
pub struct TickHandle(u64);

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame presented; run the returned tick next.
    Continue(TickHandle),
    /// Playback reached the end of the timeline and stopped.
    Completed,
    /// The handle was invalidated before it ran. Nothing changed.
    Cancelled,
}

/// Drives the transport of one timeline.
pub struct PlaybackScheduler<C: Clock> {
    clock: C,
    next_id: u64,
    pending: Option<u64>,
    interval: Duration,
}

impl<C: Clock> PlaybackScheduler<C> {
    /// Scheduler ticking at roughly 60 Hz.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            next_id: 0,
            pending: None,
            interval: Duration::from_secs_f64(1.0 / 60.0),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Whether a tick is scheduled.
    pub fn has_pending_tick(&self) -> bool {
        self.pending.is_some()
    }

    fn schedule(&mut self) -> TickHandle {
        self.next_id += 1;
        self.pending = Some(self.next_id);
        TickHandle(self.next_id)
    }

    /// Start playback and present the first frame. Returns the first tick;
    /// while already playing the pending tick is replaced.
    pub fn play(&mut self, timeline: &mut Timeline, target: &mut dyn FrameTarget) -> TickHandle {
        timeline.play(self.clock.now());
        target.present(timeline, timeline.current_time());
        self.schedule()
    }

    /// Stop playback. The pending tick is invalidated first.
    pub fn stop(&mut self, timeline: &mut Timeline) {
        self.pending = None;
        timeline.stop();
    }

    /// Seek and present the frame at the new position.
    pub fn seek(&mut self, timeline: &mut Timeline, target: &mut dyn FrameTarget, time: f64) {
        timeline.seek(time);
        target.present(timeline, timeline.current_time());
    }

    /// Run one scheduled tick.
    pub fn tick(
        &mut self,
        handle: TickHandle,
        timeline: &mut Timeline,
        target: &mut dyn FrameTarget,
    ) -> TickOutcome {
        if self.pending != Some(handle.0) {
            debug!(tick = handle.0, "Stale tick ignored");
            return TickOutcome::Cancelled;
        }
        let TransportState::Playing {
            start_wall,
            start_timeline,
        } = timeline.transport()
        else {
            self.pending = None;
            return TickOutcome::Cancelled;
        };

        let elapsed = self.clock.now() - start_wall;
        let candidate = start_timeline + elapsed;
        if candidate >= timeline.duration() {
            self.pending = None;
            timeline.complete_playback();
            target.present(timeline, timeline.current_time());
            info!(time = timeline.current_time(), "Playback completed");
            return TickOutcome::Completed;
        }

        timeline.advance_playhead(candidate);
        target.present(timeline, timeline.current_time());
        TickOutcome::Continue(self.schedule())
    }

    /// Play to the end, sleeping between ticks. Blocks the calling thread.
    pub fn run(&mut self, timeline: &mut Timeline, target: &mut dyn FrameTarget) -> TickOutcome {
        let mut handle = self.play(timeline, target);
        loop {
            std::thread::sleep(self.interval);
            match self.tick(handle, timeline, target) {
                TickOutcome::Continue(next) => handle = next,
                done => return done,
            }
        }
    }
}
