//! Track types for the timeline.

use framecut_core::{FramecutError, Result, TimeRange, TIME_EPSILON};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::clip::ClipId;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// Prefix used for generated track ids.
    pub fn prefix(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }

    /// Human readable label used in track names.
    pub fn label(self) -> &'static str {
        match self {
            TrackKind::Video => "Video",
            TrackKind::Audio => "Audio",
        }
    }
}

/// Track identifier, e.g. `video-track-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The `n`th generated id for tracks of `kind`.
    pub fn numbered(kind: TrackKind, n: u32) -> Self {
        Self(format!("{}-track-{}", kind.prefix(), n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Membership entry: a clip id with the interval it occupies.
///
/// The interval is cached here so the track can enforce exclusivity without
/// owning the clip values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSlot {
    pub clip_id: ClipId,
    pub start: f64,
    pub end: f64,
}

impl TrackSlot {
    pub fn new(clip_id: ClipId, range: TimeRange) -> Self {
        Self {
            clip_id,
            start: range.start,
            end: range.end(),
        }
    }

    #[inline]
    pub fn range(&self) -> TimeRange {
        TimeRange::from_start_end(self.start, self.end)
    }
}

/// Active clips at one instant. Tracks rarely hold more than a couple.
pub type ActiveClips = SmallVec<[ClipId; 2]>;

/// An ordered, typed lane of non-overlapping clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Track kind
    pub kind: TrackKind,
    /// Stacking order, lower is drawn first
    pub index: usize,
    /// Membership sorted by start time
    slots: Vec<TrackSlot>,
    /// Is track muted
    pub muted: bool,
    /// Is track locked (prevent edits)
    pub locked: bool,
}

impl Track {
    /// Create an empty track.
    pub fn new(id: TrackId, name: impl Into<String>, kind: TrackKind, index: usize) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            index,
            slots: Vec::new(),
            muted: false,
            locked: false,
        }
    }

    pub fn slots(&self) -> &[TrackSlot] {
        &self.slots
    }

    /// Member clip ids in start order.
    pub fn clip_ids(&self) -> impl Iterator<Item = &ClipId> + '_ {
        self.slots.iter().map(|s| &s.clip_id)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, clip_id: &ClipId) -> bool {
        self.position_of(clip_id).is_some()
    }

    /// End of the last clip on this track.
    pub fn end_time(&self) -> f64 {
        self.slots.iter().map(|s| s.end).fold(0.0, f64::max)
    }

    fn position_of(&self, clip_id: &ClipId) -> Option<usize> {
        self.slots.iter().position(|s| &s.clip_id == clip_id)
    }

    /// First member overlapping `range` by more than [`TIME_EPSILON`],
    /// ignoring `ignore`.
    pub fn conflict_with(&self, range: TimeRange, ignore: Option<&ClipId>) -> Option<&ClipId> {
        self.slots
            .iter()
            .filter(|s| Some(&s.clip_id) != ignore)
            .find(|s| collides(s.range(), range))
            .map(|s| &s.clip_id)
    }

    /// Whether `range` fits without touching any member except `ignore`.
    pub fn can_place(&self, range: TimeRange, ignore: Option<&ClipId>) -> bool {
        self.conflict_with(range, ignore).is_none()
    }

    fn overlap_error(&self, clip_id: &ClipId, range: TimeRange, conflicting: &ClipId) -> FramecutError {
        FramecutError::OverlapConflict {
            clip_id: clip_id.to_string(),
            track_id: self.id.to_string(),
            conflicting: conflicting.to_string(),
            start: range.start,
            end: range.end(),
        }
    }

    /// Insert a clip interval, keeping membership sorted by start.
    pub fn add(&mut self, clip_id: ClipId, range: TimeRange) -> Result<()> {
        if let Some(other) = self.conflict_with(range, None) {
            return Err(self.overlap_error(&clip_id, range, other));
        }
        let at = self.slots.partition_point(|s| s.start <= range.start);
        self.slots.insert(at, TrackSlot::new(clip_id, range));
        Ok(())
    }

    /// Remove a clip from membership.
    pub fn remove(&mut self, clip_id: &ClipId) -> Result<TrackSlot> {
        let pos = self.position_of(clip_id).ok_or_else(|| {
            FramecutError::NotFound(format!("clip {clip_id} on track {}", self.id))
        })?;
        Ok(self.slots.remove(pos))
    }

    /// Replace a member by two halves. Both halves are checked against the
    /// other members first; on conflict nothing changes.
    pub fn split_member(
        &mut self,
        clip_id: &ClipId,
        first: (ClipId, TimeRange),
        second: (ClipId, TimeRange),
    ) -> Result<()> {
        let pos = self.position_of(clip_id).ok_or_else(|| {
            FramecutError::NotFound(format!("clip {clip_id} on track {}", self.id))
        })?;
        for (part, range) in [&first, &second] {
            if let Some(other) = self.conflict_with(*range, Some(clip_id)) {
                return Err(self.overlap_error(part, *range, other));
            }
        }
        if collides(first.1, second.1) {
            return Err(self.overlap_error(&second.0, second.1, &first.0));
        }

        self.slots.remove(pos);
        for (part, range) in [first, second] {
            let at = self.slots.partition_point(|s| s.start <= range.start);
            self.slots.insert(at, TrackSlot::new(part, range));
        }
        Ok(())
    }

    /// Move a member to `new_start`, keeping its length.
    pub fn move_clip(&mut self, clip_id: &ClipId, new_start: f64) -> Result<()> {
        let pos = self.position_of(clip_id).ok_or_else(|| {
            FramecutError::NotFound(format!("clip {clip_id} on track {}", self.id))
        })?;
        let length = self.slots[pos].end - self.slots[pos].start;
        self.update_range(clip_id, TimeRange::new(new_start, length))
    }

    /// Replace a member's interval. Fails without mutation on overlap.
    pub fn update_range(&mut self, clip_id: &ClipId, range: TimeRange) -> Result<()> {
        if let Some(other) = self.conflict_with(range, Some(clip_id)) {
            return Err(self.overlap_error(clip_id, range, other));
        }
        let slot = self.remove(clip_id)?;
        let at = self.slots.partition_point(|s| s.start <= range.start);
        self.slots.insert(at, TrackSlot::new(slot.clip_id, range));
        Ok(())
    }

    /// Member whose interval contains `time`, if any.
    ///
    /// Only the last slot starting at or before `time` can hold it; a
    /// sub-epsilon tail of the slot before yields to its successor.
    pub fn clips_active_at(&self, time: f64) -> ActiveClips {
        let after = self.slots.partition_point(|s| s.start <= time);
        self.slots[..after]
            .last()
            .filter(|s| s.range().contains(time))
            .map(|s| s.clip_id.clone())
            .into_iter()
            .collect()
    }

    /// Check the sorted and exclusive membership invariants.
    pub fn is_consistent(&self) -> bool {
        self.slots
            .windows(2)
            .all(|w| w[0].start <= w[1].start && w[0].end <= w[1].start + TIME_EPSILON)
    }
}

/// Overlap beyond float noise. Edits that derive both sides of a seam from
/// different sums may leave the halves an ulp apart.
fn collides(a: TimeRange, b: TimeRange) -> bool {
    a.start < b.end() - TIME_EPSILON && b.start < a.end() - TIME_EPSILON
}
