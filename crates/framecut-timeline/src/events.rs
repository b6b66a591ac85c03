//! Change notifications emitted by the timeline.
//!
//! Subscribers receive events over unbounded crossbeam channels. Emitting
//! never blocks and never fails; disconnected subscribers are dropped.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::clip::ClipId;
use crate::track::{TrackId, TrackKind};

/// A timeline change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    ClipAdded {
        clip_id: ClipId,
        track_id: TrackId,
    },
    ClipRemoved {
        clip_id: ClipId,
        track_id: TrackId,
    },
    ClipMoved {
        clip_id: ClipId,
        track_id: TrackId,
        start: f64,
    },
    ClipResized {
        clip_id: ClipId,
        source_in: f64,
        source_out: f64,
        start: f64,
    },
    DurationChanged {
        duration: f64,
    },
    TimeUpdate {
        time: f64,
    },
    PlaybackStarted {
        time: f64,
    },
    /// `completed` is set when playback ran to the end of the timeline.
    PlaybackStopped {
        time: f64,
        completed: bool,
    },
    TrackAdded {
        track_id: TrackId,
        kind: TrackKind,
    },
    TrackRemoved {
        track_id: TrackId,
    },
    TracksReordered,
    ZoomChanged {
        pixels_per_second: f64,
    },
}

impl TimelineEvent {
    /// Stable event name for presentation layers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClipAdded { .. } => "clipAdded",
            Self::ClipRemoved { .. } => "clipRemoved",
            Self::ClipMoved { .. } => "clipMoved",
            Self::ClipResized { .. } => "clipResized",
            Self::DurationChanged { .. } => "durationChanged",
            Self::TimeUpdate { .. } => "timeUpdate",
            Self::PlaybackStarted { .. } => "playbackStarted",
            Self::PlaybackStopped { .. } => "playbackStopped",
            Self::TrackAdded { .. } => "trackAdded",
            Self::TrackRemoved { .. } => "trackRemoved",
            Self::TracksReordered => "tracksReordered",
            Self::ZoomChanged { .. } => "zoomChanged",
        }
    }
}

/// Fan-out of timeline events to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<TimelineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&mut self, event: TimelineEvent) {
        tracing::trace!(event = event.name(), "emit");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
