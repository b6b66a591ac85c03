//! The composition graph: tracks, the master clip list and the transport.
//!
//! `Timeline` is the single owner of every clip. Tracks only keep ordered id
//! slots, and every structural mutation goes through a method here so the
//! master list and the track memberships never disagree. Each mutation
//! recomputes the derived duration and emits change events.

use crossbeam_channel::Receiver;
use framecut_core::{format_clock, FramecutError, Result, TimeRange, TimelineConfig, TIME_EPSILON};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clip::{Clip, ClipId, ResizeEdge};
use crate::events::{EventBus, TimelineEvent};
use crate::track::{Track, TrackId, TrackKind};

/// Transport state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportState {
    Stopped,
    /// Playback anchor: wall clock and timeline time when playback started
    /// or was last re-anchored by a seek.
    Playing {
        start_wall: f64,
        start_timeline: f64,
    },
}

/// A clip active at some instant, with the track that holds it.
#[derive(Debug, Clone, Copy)]
pub struct ActiveClip<'a> {
    pub track: &'a Track,
    pub clip: &'a Clip,
    /// Source time shown at the queried instant.
    pub source_time: f64,
}

/// Serializable track header. Membership is rebuilt from clip affiliations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub locked: bool,
}

/// Persistent form of a timeline. Tracks are listed in stacking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub name: String,
    pub tracks: Vec<TrackSnapshot>,
    pub clips: Vec<Clip>,
    pub pixels_per_second: f64,
    #[serde(default)]
    pub current_time: f64,
}

/// Tracks and clips arranged in time, plus the playhead and view zoom.
#[derive(Debug)]
pub struct Timeline {
    name: String,
    config: TimelineConfig,
    /// Ordered by stacking index; `tracks[i].index == i`.
    tracks: Vec<Track>,
    /// Master clip list, insertion order.
    clips: Vec<Clip>,
    duration: f64,
    current_time: f64,
    pixels_per_second: f64,
    transport: TransportState,
    video_tracks_created: u32,
    audio_tracks_created: u32,
    events: EventBus,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(TimelineConfig::default())
    }
}

impl Timeline {
    /// Create a timeline holding the two reserved default tracks.
    pub fn new(config: TimelineConfig) -> Self {
        let mut timeline = Self {
            name: "Untitled".to_string(),
            pixels_per_second: config.base_pixels_per_second,
            config,
            tracks: Vec::new(),
            clips: Vec::new(),
            duration: 0.0,
            current_time: 0.0,
            transport: TransportState::Stopped,
            video_tracks_created: 0,
            audio_tracks_created: 0,
            events: EventBus::new(),
        };
        timeline.add_track(TrackKind::Video);
        timeline.add_track(TrackKind::Audio);
        timeline
    }

    // ---- accessors ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Register a change listener.
    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        self.events.subscribe()
    }

    /// Tracks in stacking order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    pub fn tracks_of_kind(&self, kind: TrackKind) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// Master clip list.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, id: &ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| &c.id == id)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.transport, TransportState::Playing { .. })
    }

    /// `"HH:MM:SS / HH:MM:SS"` for the playhead and the total duration.
    pub fn status_text(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.current_time),
            format_clock(self.duration)
        )
    }

    /// Whether `id` names one of the two protected default tracks.
    pub fn is_reserved_track(&self, id: &TrackId) -> bool {
        [TrackKind::Video, TrackKind::Audio]
            .into_iter()
            .any(|kind| *id == TrackId::numbered(kind, 1))
    }

    /// Active clips at `time` across all tracks, ordered by track index.
    pub fn active_clips_at(&self, time: f64) -> Vec<ActiveClip<'_>> {
        let mut active = Vec::new();
        for track in &self.tracks {
            for clip_id in track.clips_active_at(time) {
                let Some(clip) = self.clip(&clip_id) else {
                    continue;
                };
                if let Some(source_time) = clip.relative_time(time) {
                    active.push(ActiveClip {
                        track,
                        clip,
                        source_time,
                    });
                }
            }
        }
        active
    }

    /// Audio clips whose `linked_clip_id` names `video_id`.
    pub fn linked_clips(&self, video_id: &ClipId) -> Vec<&Clip> {
        self.clips
            .iter()
            .filter(|c| c.linked_clip_id() == Some(video_id))
            .collect()
    }

    fn track_pos(&self, id: &TrackId) -> Result<usize> {
        self.tracks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| FramecutError::NotFound(format!("track {id}")))
    }

    fn clip_pos(&self, id: &ClipId) -> Result<usize> {
        self.clips
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| FramecutError::NotFound(format!("clip {id}")))
    }

    /// Position of the track holding clip `clips[pos]`.
    fn owning_track_pos(&self, pos: usize) -> Result<usize> {
        let clip = &self.clips[pos];
        let track_id = clip
            .track_id
            .as_ref()
            .ok_or_else(|| FramecutError::NotFound(format!("track for clip {}", clip.id)))?;
        self.track_pos(track_id)
    }

    fn ensure_unlocked(track: &Track) -> Result<()> {
        if track.locked {
            return Err(FramecutError::TrackLocked {
                track_id: track.id.to_string(),
            });
        }
        Ok(())
    }

    // ---- tracks ----

    /// Append an empty track of `kind` at the top of the stack.
    pub fn add_track(&mut self, kind: TrackKind) -> TrackId {
        let n = match kind {
            TrackKind::Video => {
                self.video_tracks_created += 1;
                self.video_tracks_created
            }
            TrackKind::Audio => {
                self.audio_tracks_created += 1;
                self.audio_tracks_created
            }
        };
        let id = TrackId::numbered(kind, n);
        let index = self.tracks.len();
        let name = format!("{} {}", kind.label(), n);
        self.tracks.push(Track::new(id.clone(), name, kind, index));
        debug!(track = %id, index, "Track added");
        self.events.emit(TimelineEvent::TrackAdded {
            track_id: id.clone(),
            kind,
        });
        id
    }

    /// Remove a track together with its clips. Reserved tracks only lose
    /// their clips.
    pub fn remove_track(&mut self, id: &TrackId) -> Result<Vec<Clip>> {
        let pos = self.track_pos(id)?;
        Self::ensure_unlocked(&self.tracks[pos])?;
        let members: Vec<ClipId> = self.tracks[pos].clip_ids().cloned().collect();

        let mut removed = Vec::with_capacity(members.len());
        for clip_id in members {
            self.tracks[pos].remove(&clip_id)?;
            let clip_pos = self.clip_pos(&clip_id)?;
            removed.push(self.clips.remove(clip_pos));
            self.events.emit(TimelineEvent::ClipRemoved {
                clip_id,
                track_id: id.clone(),
            });
        }
        if !self.is_reserved_track(id) {
            self.drop_track(pos);
        }
        self.recompute_duration();
        info!(track = %id, clips = removed.len(), "Track removed");
        Ok(removed)
    }

    fn drop_track(&mut self, pos: usize) {
        let track = self.tracks.remove(pos);
        self.reindex_tracks();
        self.events.emit(TimelineEvent::TrackRemoved { track_id: track.id });
    }

    fn reindex_tracks(&mut self) {
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.index = i;
        }
    }

    /// Move a track to `new_position` in the stack, re-deriving every index.
    pub fn reorder_track(&mut self, id: &TrackId, new_position: usize) -> Result<()> {
        let pos = self.track_pos(id)?;
        let target = new_position.min(self.tracks.len() - 1);
        if target == pos {
            return Ok(());
        }
        let track = self.tracks.remove(pos);
        self.tracks.insert(target, track);
        self.reindex_tracks();
        info!(track = %id, from = pos, to = target, "Track reordered");
        self.events.emit(TimelineEvent::TracksReordered);
        Ok(())
    }

    pub fn set_track_muted(&mut self, id: &TrackId, muted: bool) -> Result<()> {
        let pos = self.track_pos(id)?;
        self.tracks[pos].muted = muted;
        Ok(())
    }

    pub fn set_track_locked(&mut self, id: &TrackId, locked: bool) -> Result<()> {
        let pos = self.track_pos(id)?;
        self.tracks[pos].locked = locked;
        Ok(())
    }

    // ---- clip mutations ----

    fn check_new_clip(&self, clip: &Clip) -> Result<()> {
        clip.validate()?;
        if self.clip(&clip.id).is_some() {
            return Err(FramecutError::InvalidClip(format!(
                "clip id {} already exists",
                clip.id
            )));
        }
        Ok(())
    }

    /// Place a clip on the first unlocked track of its kind that has room,
    /// creating a new track when none does. Returns the chosen track.
    pub fn add_clip(&mut self, clip: Clip) -> Result<TrackId> {
        self.check_new_clip(&clip)?;
        let kind = clip.track_kind();
        let range = clip.timeline_range();
        let existing = self
            .tracks
            .iter()
            .position(|t| t.kind == kind && !t.locked && t.can_place(range, None));
        let pos = match existing {
            Some(pos) => pos,
            None => {
                self.add_track(kind);
                self.tracks.len() - 1
            }
        };
        let track_id = self.tracks[pos].id.clone();
        self.insert_clip(pos, clip)?;
        Ok(track_id)
    }

    /// Place a clip on a specific track.
    pub fn add_clip_to_track(&mut self, clip: Clip, track_id: &TrackId) -> Result<()> {
        self.check_new_clip(&clip)?;
        let pos = self.track_pos(track_id)?;
        let track = &self.tracks[pos];
        if track.kind != clip.track_kind() {
            return Err(FramecutError::TrackKindMismatch(format!(
                "{:?} clip {} cannot go on {:?} track {}",
                clip.track_kind(),
                clip.id,
                track.kind,
                track.id
            )));
        }
        Self::ensure_unlocked(track)?;
        self.insert_clip(pos, clip)
    }

    fn insert_clip(&mut self, track_pos: usize, mut clip: Clip) -> Result<()> {
        let track = &mut self.tracks[track_pos];
        track.add(clip.id.clone(), clip.timeline_range())?;
        clip.track_id = Some(track.id.clone());
        let track_id = track.id.clone();
        info!(clip = %clip.id, track = %track_id, start = clip.track_start_time, duration = clip.duration(), "Clip added");
        let clip_id = clip.id.clone();
        self.clips.push(clip);
        self.events.emit(TimelineEvent::ClipAdded { clip_id, track_id });
        self.recompute_duration();
        Ok(())
    }

    /// Remove a clip. An emptied track disappears unless it is reserved.
    /// Linked clips are left in place.
    pub fn remove_clip(&mut self, id: &ClipId) -> Result<Clip> {
        let pos = self.clip_pos(id)?;
        let track_pos = self.owning_track_pos(pos)?;
        Self::ensure_unlocked(&self.tracks[track_pos])?;

        self.tracks[track_pos].remove(id)?;
        let clip = self.clips.remove(pos);
        let track_id = self.tracks[track_pos].id.clone();
        info!(clip = %id, track = %track_id, "Clip removed");
        self.events.emit(TimelineEvent::ClipRemoved {
            clip_id: id.clone(),
            track_id: track_id.clone(),
        });

        if self.tracks[track_pos].is_empty() && !self.is_reserved_track(&track_id) {
            self.drop_track(track_pos);
        }
        self.recompute_duration();
        Ok(clip)
    }

    /// Remove a clip and every audio clip linked to it.
    ///
    /// All owning tracks are checked for locks first so nothing is removed
    /// when any of them is locked.
    pub fn remove_clip_with_linked(&mut self, id: &ClipId) -> Result<Vec<Clip>> {
        let mut ids = vec![id.clone()];
        ids.extend(self.linked_clips(id).into_iter().map(|c| c.id.clone()));
        for clip_id in &ids {
            let pos = self.clip_pos(clip_id)?;
            let track_pos = self.owning_track_pos(pos)?;
            Self::ensure_unlocked(&self.tracks[track_pos])?;
        }
        ids.iter().map(|clip_id| self.remove_clip(clip_id)).collect()
    }

    /// Move a clip to `new_start` (clamped to zero), optionally onto another
    /// track of the same kind. On conflict nothing changes.
    pub fn move_clip(
        &mut self,
        id: &ClipId,
        new_start: f64,
        new_track: Option<&TrackId>,
    ) -> Result<()> {
        if !new_start.is_finite() {
            return Err(FramecutError::InvalidParameter(format!(
                "move target {new_start} is not finite"
            )));
        }
        let new_start = new_start.max(0.0);
        let pos = self.clip_pos(id)?;
        let from = self.owning_track_pos(pos)?;
        let to = match new_track {
            Some(track_id) => self.track_pos(track_id)?,
            None => from,
        };
        let clip_kind = self.clips[pos].track_kind();
        if self.tracks[to].kind != clip_kind {
            return Err(FramecutError::TrackKindMismatch(format!(
                "{:?} clip {} cannot move to {:?} track {}",
                clip_kind, id, self.tracks[to].kind, self.tracks[to].id
            )));
        }
        Self::ensure_unlocked(&self.tracks[from])?;
        Self::ensure_unlocked(&self.tracks[to])?;

        let range = TimeRange::new(new_start, self.clips[pos].duration());
        if from == to {
            self.tracks[from].update_range(id, range)?;
        } else {
            if let Some(other) = self.tracks[to].conflict_with(range, None) {
                return Err(FramecutError::OverlapConflict {
                    clip_id: id.to_string(),
                    track_id: self.tracks[to].id.to_string(),
                    conflicting: other.to_string(),
                    start: range.start,
                    end: range.end(),
                });
            }
            self.tracks[from].remove(id)?;
            self.tracks[to].add(id.clone(), range)?;
        }

        let track_id = self.tracks[to].id.clone();
        let clip = &mut self.clips[pos];
        clip.track_start_time = new_start;
        clip.track_id = Some(track_id.clone());
        info!(clip = %id, track = %track_id, start = new_start, "Clip moved");
        self.events.emit(TimelineEvent::ClipMoved {
            clip_id: id.clone(),
            track_id,
            start: new_start,
        });
        self.recompute_duration();
        Ok(())
    }

    /// Drag one edge of a clip to timeline time `time`.
    pub fn resize_clip(&mut self, id: &ClipId, edge: ResizeEdge, time: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(FramecutError::InvalidParameter(format!(
                "resize target {time} is not finite"
            )));
        }
        let pos = self.clip_pos(id)?;
        let track_pos = self.owning_track_pos(pos)?;
        Self::ensure_unlocked(&self.tracks[track_pos])?;

        let resized = self.clips[pos].resized(edge, time, self.config.min_clip_duration);
        self.tracks[track_pos].update_range(id, resized.timeline_range())?;

        info!(clip = %id, ?edge, source_in = resized.source_in, source_out = resized.source_out, "Clip resized");
        self.events.emit(TimelineEvent::ClipResized {
            clip_id: id.clone(),
            source_in: resized.source_in,
            source_out: resized.source_out,
            start: resized.track_start_time,
        });
        self.clips[pos] = resized;
        self.recompute_duration();
        Ok(())
    }

    /// Split every clip under the playhead into two halves on the same track.
    ///
    /// Clips that cannot be split (playhead on a boundary, locked track,
    /// part ids already taken) are skipped. Returns the new id pairs.
    pub fn split_at_playhead(&mut self) -> Vec<(ClipId, ClipId)> {
        let at = self.current_time;
        let candidates: Vec<ClipId> = self
            .clips
            .iter()
            .filter(|c| c.timeline_range().strictly_contains(at))
            .map(|c| c.id.clone())
            .collect();

        let mut produced = Vec::new();
        for id in candidates {
            match self.split_clip(&id, at) {
                Ok(pair) => produced.push(pair),
                Err(e) => warn!(clip = %id, time = at, error = %e, "Split skipped"),
            }
        }
        produced
    }

    /// Replace one clip by its halves around `at`.
    pub fn split_clip(&mut self, id: &ClipId, at: f64) -> Result<(ClipId, ClipId)> {
        let pos = self.clip_pos(id)?;
        let track_pos = self.owning_track_pos(pos)?;
        Self::ensure_unlocked(&self.tracks[track_pos])?;

        let (first, second) = self.clips[pos].split(at)?;
        for part in [&first.id, &second.id] {
            if self.clip(part).is_some() {
                return Err(FramecutError::InvalidClip(format!(
                    "split of {id} would reuse existing id {part}"
                )));
            }
        }

        let track = &mut self.tracks[track_pos];
        track.split_member(
            id,
            (first.id.clone(), first.timeline_range()),
            (second.id.clone(), second.timeline_range()),
        )?;
        let track_id = track.id.clone();

        let ids = (first.id.clone(), second.id.clone());
        self.clips[pos] = first;
        self.clips.insert(pos + 1, second);

        info!(clip = %id, time = at, "Clip split");
        self.events.emit(TimelineEvent::ClipRemoved {
            clip_id: id.clone(),
            track_id: track_id.clone(),
        });
        for clip_id in [&ids.0, &ids.1] {
            self.events.emit(TimelineEvent::ClipAdded {
                clip_id: clip_id.clone(),
                track_id: track_id.clone(),
            });
        }
        self.recompute_duration();
        Ok(ids)
    }

    /// Derive the duration from the clips and clamp the playhead into it.
    fn recompute_duration(&mut self) {
        let duration = self.clips.iter().map(Clip::end_time).fold(0.0, f64::max);
        if (duration - self.duration).abs() > TIME_EPSILON {
            self.duration = duration;
            debug!(duration, "Duration changed");
            self.events.emit(TimelineEvent::DurationChanged { duration });
        } else {
            self.duration = duration;
        }
        if self.current_time > self.duration {
            self.current_time = self.duration;
            self.events.emit(TimelineEvent::TimeUpdate {
                time: self.current_time,
            });
        }
    }

    // ---- view ----

    pub fn pixels_per_second(&self) -> f64 {
        self.pixels_per_second
    }

    /// Zoom relative to the base pixels per second.
    pub fn scale(&self) -> f64 {
        self.pixels_per_second / self.config.base_pixels_per_second
    }

    pub fn time_to_pixels(&self, time: f64) -> f64 {
        time * self.pixels_per_second
    }

    pub fn pixels_to_time(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_second
    }

    /// Set the zoom, clamped to the configured bounds.
    pub fn set_pixels_per_second(&mut self, pps: f64) {
        let base = self.config.base_pixels_per_second;
        let min = base * self.config.min_zoom;
        let max = base * self.config.max_zoom;
        let clamped = if pps.is_finite() { pps.clamp(min, max) } else { base };
        if (clamped - self.pixels_per_second).abs() > TIME_EPSILON {
            self.pixels_per_second = clamped;
            self.events.emit(TimelineEvent::ZoomChanged {
                pixels_per_second: clamped,
            });
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_pixels_per_second(self.pixels_per_second * self.config.zoom_factor);
    }

    pub fn zoom_out(&mut self) {
        self.set_pixels_per_second(self.pixels_per_second / self.config.zoom_factor);
    }

    // ---- transport ----

    /// Start playback anchored at wall time `now`. No-op while playing.
    pub fn play(&mut self, now: f64) {
        if self.is_playing() {
            return;
        }
        self.transport = TransportState::Playing {
            start_wall: now,
            start_timeline: self.current_time,
        };
        info!(time = self.current_time, "Playback started");
        self.events.emit(TimelineEvent::PlaybackStarted {
            time: self.current_time,
        });
    }

    /// Stop playback, keeping the playhead where it is.
    pub fn stop(&mut self) {
        self.halt(false);
    }

    fn halt(&mut self, completed: bool) {
        if !self.is_playing() {
            return;
        }
        self.transport = TransportState::Stopped;
        info!(time = self.current_time, completed, "Playback stopped");
        self.events.emit(TimelineEvent::PlaybackStopped {
            time: self.current_time,
            completed,
        });
    }

    /// Move the playhead, clamped to `[0, duration]`. While playing the
    /// anchor follows so the next tick continues from the new position.
    pub fn seek(&mut self, time: f64) {
        let target = if time.is_finite() {
            time.clamp(0.0, self.duration)
        } else {
            0.0
        };
        if let TransportState::Playing {
            start_timeline, ..
        } = &mut self.transport
        {
            // Shift the anchor by the jump so elapsed wall time keeps
            // counting from the seek target.
            *start_timeline += target - self.current_time;
            debug!(time = target, "Seek while playing");
        }
        self.current_time = target;
        self.events.emit(TimelineEvent::TimeUpdate { time: target });
    }

    /// Step the playhead by whole frames of the nudge rate.
    pub fn step_frames(&mut self, frames: i64) {
        let step = self.config.nudge_frame_rate.frame_duration();
        self.seek(self.current_time + frames as f64 * step);
    }

    pub fn seek_to_start(&mut self) {
        self.seek(0.0);
    }

    pub fn seek_to_end(&mut self) {
        self.seek(self.duration);
    }

    /// Advance the playhead from a playback tick without touching the anchor.
    pub fn advance_playhead(&mut self, time: f64) {
        self.current_time = time.clamp(0.0, self.duration);
        self.events.emit(TimelineEvent::TimeUpdate {
            time: self.current_time,
        });
    }

    /// Playback reached the end: park the playhead there and stop.
    pub fn complete_playback(&mut self) {
        self.current_time = self.duration;
        self.events.emit(TimelineEvent::TimeUpdate {
            time: self.current_time,
        });
        self.halt(true);
    }

    // ---- persistence ----

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            name: self.name.clone(),
            tracks: self
                .tracks
                .iter()
                .map(|t| TrackSnapshot {
                    id: t.id.clone(),
                    name: t.name.clone(),
                    kind: t.kind,
                    muted: t.muted,
                    locked: t.locked,
                })
                .collect(),
            clips: self.clips.clone(),
            pixels_per_second: self.pixels_per_second,
            current_time: self.current_time,
        }
    }

    /// Rebuild a timeline, re-checking every invariant.
    pub fn from_snapshot(config: TimelineConfig, snapshot: TimelineSnapshot) -> Result<Self> {
        let mut timeline = Self {
            name: snapshot.name,
            pixels_per_second: config.base_pixels_per_second,
            config,
            tracks: Vec::new(),
            clips: Vec::new(),
            duration: 0.0,
            current_time: 0.0,
            transport: TransportState::Stopped,
            video_tracks_created: 0,
            audio_tracks_created: 0,
            events: EventBus::new(),
        };

        let mut locks = Vec::new();
        for (index, header) in snapshot.tracks.into_iter().enumerate() {
            if timeline.track(&header.id).is_some() {
                return Err(FramecutError::Serialization(format!(
                    "duplicate track id {}",
                    header.id
                )));
            }
            let number = header
                .id
                .as_str()
                .rsplit('-')
                .next()
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(0);
            match header.kind {
                TrackKind::Video => {
                    timeline.video_tracks_created = timeline.video_tracks_created.max(number)
                }
                TrackKind::Audio => {
                    timeline.audio_tracks_created = timeline.audio_tracks_created.max(number)
                }
            }
            let mut track = Track::new(header.id, header.name, header.kind, index);
            track.muted = header.muted;
            locks.push((track.id.clone(), header.locked));
            timeline.tracks.push(track);
        }

        // Reserved defaults always exist.
        for kind in [TrackKind::Video, TrackKind::Audio] {
            let id = TrackId::numbered(kind, 1);
            if timeline.track(&id).is_none() {
                let index = timeline.tracks.len();
                let name = format!("{} 1", kind.label());
                timeline.tracks.push(Track::new(id, name, kind, index));
                match kind {
                    TrackKind::Video => timeline.video_tracks_created = timeline.video_tracks_created.max(1),
                    TrackKind::Audio => timeline.audio_tracks_created = timeline.audio_tracks_created.max(1),
                }
            }
        }

        for clip in snapshot.clips {
            let track_id = clip.track_id.clone().ok_or_else(|| {
                FramecutError::Serialization(format!("clip {} has no track", clip.id))
            })?;
            timeline.add_clip_to_track(clip, &track_id)?;
        }

        // Locks apply after the clips are back in place.
        for (track_id, locked) in locks {
            if let Some(track) = timeline.tracks.iter_mut().find(|t| t.id == track_id) {
                track.locked = locked;
            }
        }
        timeline.set_pixels_per_second(snapshot.pixels_per_second);
        timeline.current_time = snapshot.current_time.clamp(0.0, timeline.duration);
        Ok(timeline)
    }

    /// Check that the master list and memberships agree and no track
    /// holds overlapping clips.
    pub fn is_consistent(&self) -> bool {
        let members: usize = self.tracks.iter().map(Track::len).sum();
        members == self.clips.len()
            && self.tracks.iter().enumerate().all(|(i, t)| t.index == i && t.is_consistent())
            && self.clips.iter().all(|c| {
                c.track_id
                    .as_ref()
                    .and_then(|id| self.track(id))
                    .is_some_and(|t| {
                        t.slots().iter().any(|s| {
                            s.clip_id == c.id
                                && s.start == c.track_start_time
                                && s.end == c.end_time()
                        })
                    })
            })
    }
}
