//! Clip types for the timeline.

use framecut_core::{FramecutError, Result, TimeRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::track::{TrackId, TrackKind};

/// Stable clip identifier. Never reused once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Identifier of the `n`th part produced by splitting this clip.
    pub fn part(&self, n: u8) -> Self {
        Self(format!("{}-part{}", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a media source. Shared by every clip cut from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Path to the media file
    pub path: PathBuf,
    /// Declared media type (e.g. `video/mp4`)
    pub mime: String,
    /// Source duration in seconds, when known
    pub duration: Option<f64>,
}

impl MediaRef {
    /// Create a new media reference.
    pub fn new(path: impl Into<PathBuf>, mime: impl Into<String>, duration: Option<f64>) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
            duration,
        }
    }

    /// File extension used when staging this source for the codec engine.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin")
    }
}

/// Variant data of a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipKind {
    Video {
        width: u32,
        height: u32,
        has_audio: bool,
    },
    Audio {
        /// Video clip this audio was extracted from. Lookup only.
        linked_clip_id: Option<ClipId>,
    },
}

/// Which edge of a clip a resize drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeEdge {
    /// Moves the in point and the timeline start together.
    Left,
    /// Moves the out point.
    Right,
}

/// A trimmed span of a media source placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Unique clip ID
    pub id: ClipId,
    /// Clip name (displayed in UI)
    pub name: String,
    /// Reference to source media
    pub source: MediaRef,
    /// In point within the source, seconds
    pub source_in: f64,
    /// Out point within the source, seconds (exclusive)
    pub source_out: f64,
    /// Position on the timeline, seconds
    pub track_start_time: f64,
    /// Owning track, assigned by the timeline
    pub track_id: Option<TrackId>,
    /// Video or audio data
    pub kind: ClipKind,
}

impl Clip {
    /// Create a video clip covering the whole source, placed at zero.
    pub fn new_video(name: impl Into<String>, source: MediaRef, width: u32, height: u32) -> Self {
        let source_out = source.duration.unwrap_or(0.0);
        Self {
            id: ClipId::generate(),
            name: name.into(),
            source,
            source_in: 0.0,
            source_out,
            track_start_time: 0.0,
            track_id: None,
            kind: ClipKind::Video {
                width,
                height,
                has_audio: false,
            },
        }
    }

    /// Create an audio clip covering the whole source, placed at zero.
    pub fn new_audio(name: impl Into<String>, source: MediaRef) -> Self {
        let source_out = source.duration.unwrap_or(0.0);
        Self {
            id: ClipId::generate(),
            name: name.into(),
            source,
            source_in: 0.0,
            source_out,
            track_start_time: 0.0,
            track_id: None,
            kind: ClipKind::Audio {
                linked_clip_id: None,
            },
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = ClipId::new(id);
        self
    }

    /// Use `[source_in, source_out)` of the source.
    pub fn with_span(mut self, source_in: f64, source_out: f64) -> Self {
        self.source_in = source_in;
        self.source_out = source_out;
        self
    }

    /// Place the clip at `start` on the timeline.
    pub fn at(mut self, start: f64) -> Self {
        self.track_start_time = start;
        self
    }

    /// Mark a video clip as carrying an audio stream.
    pub fn with_audio(mut self, has: bool) -> Self {
        if let ClipKind::Video { has_audio, .. } = &mut self.kind {
            *has_audio = has;
        }
        self
    }

    /// Length on the timeline.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.source_out - self.source_in
    }

    /// Exclusive end on the timeline.
    #[inline]
    pub fn end_time(&self) -> f64 {
        self.track_start_time + self.duration()
    }

    /// Half-open interval occupied on the timeline.
    #[inline]
    pub fn timeline_range(&self) -> TimeRange {
        TimeRange::new(self.track_start_time, self.duration())
    }

    /// Span used from the source.
    #[inline]
    pub fn source_range(&self) -> TimeRange {
        TimeRange::from_start_end(self.source_in, self.source_out)
    }

    /// Kind of track this clip can live on.
    pub fn track_kind(&self) -> TrackKind {
        match self.kind {
            ClipKind::Video { .. } => TrackKind::Video,
            ClipKind::Audio { .. } => TrackKind::Audio,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, ClipKind::Video { .. })
    }

    /// Natural frame size of a video clip.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.kind {
            ClipKind::Video { width, height, .. } => Some((width, height)),
            ClipKind::Audio { .. } => None,
        }
    }

    /// The video clip this audio clip was extracted from.
    pub fn linked_clip_id(&self) -> Option<&ClipId> {
        match &self.kind {
            ClipKind::Audio { linked_clip_id } => linked_clip_id.as_ref(),
            ClipKind::Video { .. } => None,
        }
    }

    /// Source time shown at `timeline_time`, or `None` when the clip is not
    /// active then. Active means `start <= t < start + duration`.
    pub fn relative_time(&self, timeline_time: f64) -> Option<f64> {
        if self.timeline_range().contains(timeline_time) {
            Some(self.source_in + (timeline_time - self.track_start_time))
        } else {
            None
        }
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        let fields = [self.source_in, self.source_out, self.track_start_time];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(FramecutError::InvalidClip(format!(
                "{}: temporal fields must be finite",
                self.id
            )));
        }
        if self.source_in < 0.0 || self.source_out <= self.source_in {
            return Err(FramecutError::InvalidClip(format!(
                "{}: source span [{}, {}) is empty or negative",
                self.id, self.source_in, self.source_out
            )));
        }
        if self.track_start_time < 0.0 {
            return Err(FramecutError::InvalidClip(format!(
                "{}: track start {} is before zero",
                self.id, self.track_start_time
            )));
        }
        Ok(())
    }

    /// Split into `[start, at)` and `[at, end)`.
    ///
    /// Both halves inherit every field except id, name and span; ids are the
    /// parent id with a `-part1`/`-part2` suffix.
    pub fn split(&self, at: f64) -> Result<(Clip, Clip)> {
        let range = self.timeline_range();
        if !range.strictly_contains(at) {
            return Err(FramecutError::InvalidSplitPoint {
                clip_id: self.id.to_string(),
                time: at,
                start: range.start,
                end: range.end(),
            });
        }
        let seam = self.source_in + (at - self.track_start_time);

        let mut first = self.clone();
        first.id = self.id.part(1);
        first.name = format!("{} (Part 1)", self.name);
        first.source_out = seam;

        let mut second = self.clone();
        second.id = self.id.part(2);
        second.name = format!("{} (Part 2)", self.name);
        second.source_in = seam;
        // meet the first half exactly, whatever the rounding of the seam
        second.track_start_time = first.end_time();

        Ok((first, second))
    }

    /// Copy of this clip with one edge dragged to timeline time `time`.
    ///
    /// The result is clamped so the clip stays at least `min_duration` long,
    /// never starts before the source or the timeline origin, and never runs
    /// past the end of a source with known duration.
    pub fn resized(&self, edge: ResizeEdge, time: f64, min_duration: f64) -> Clip {
        let mut clip = self.clone();
        match edge {
            ResizeEdge::Left => {
                let earliest = (self.track_start_time - self.source_in).max(0.0);
                let latest = self.end_time() - min_duration;
                let start = time.min(latest).max(earliest);
                let delta = start - self.track_start_time;
                clip.source_in = self.source_in + delta;
                clip.track_start_time = start;
            }
            ResizeEdge::Right => {
                let mut end = time.max(self.track_start_time + min_duration);
                if let Some(source_duration) = self.source.duration {
                    let latest = self.track_start_time + (source_duration - self.source_in);
                    end = end.min(latest.max(self.track_start_time + min_duration));
                }
                clip.source_out = self.source_in + (end - self.track_start_time);
            }
        }
        clip
    }

    /// Audio clip linked to this video clip, for sources that carry sound.
    pub fn extract_audio(&self) -> Option<Clip> {
        match self.kind {
            ClipKind::Video {
                has_audio: true, ..
            } => Some(Clip {
                id: ClipId::generate(),
                name: format!("{} (Audio)", self.name),
                source: self.source.clone(),
                source_in: self.source_in,
                source_out: self.source_out,
                track_start_time: self.track_start_time,
                track_id: None,
                kind: ClipKind::Audio {
                    linked_clip_id: Some(self.id.clone()),
                },
            }),
            _ => None,
        }
    }
}
