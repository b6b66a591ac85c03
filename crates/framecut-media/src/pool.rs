//! Clip pool: imported media waiting to be placed on the timeline.
//!
//! Pool clips are templates. Placing one copies it onto the timeline under
//! fresh ids, so the same media can be placed any number of times; removing
//! a pool entry never touches clips already on the timeline.

use framecut_core::{FramecutError, Result};
use framecut_timeline::{Clip, ClipId, ClipKind, Timeline};
use tracing::{debug, info, warn};

use crate::import::ImportedMedia;

/// Imported clips in import order.
#[derive(Debug, Clone, Default)]
pub struct ClipPool {
    clips: Vec<Clip>,
}

impl ClipPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn get(&self, id: &ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| &c.id == id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Audio entry extracted from the pool video `video_id`.
    pub fn linked_audio(&self, video_id: &ClipId) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|c| c.linked_clip_id() == Some(video_id))
    }

    /// Add the clips of one import. Returns the id of the primary clip.
    pub fn insert(&mut self, media: ImportedMedia) -> ClipId {
        let id = media.clip.id.clone();
        debug!(clip = %id, name = %media.clip.name, "Added to pool");
        self.clips.push(media.clip);
        self.clips.extend(media.audio);
        id
    }

    /// Place a copy of pool clip `id` at the start of `timeline`.
    ///
    /// A video brings its linked audio along, re-linked to the new video
    /// id. An audio entry placed on its own carries no link, since its
    /// video is not on the timeline. Returns the new timeline ids, video
    /// first. On failure the timeline is left as it was.
    pub fn add_to_timeline(&self, id: &ClipId, timeline: &mut Timeline) -> Result<Vec<ClipId>> {
        let clip = self.get(id).ok_or_else(|| not_in_pool(id))?;

        let placed = placement(clip, None);
        let placed_id = placed.id.clone();
        timeline.add_clip(placed)?;

        let mut ids = vec![placed_id.clone()];
        if clip.is_video() {
            if let Some(audio) = self.linked_audio(id) {
                let audio = placement(audio, Some(placed_id.clone()));
                let audio_id = audio.id.clone();
                if let Err(e) = timeline.add_clip(audio) {
                    if let Err(rollback) = timeline.remove_clip(&placed_id) {
                        warn!(clip = %placed_id, error = %rollback, "Rollback failed");
                    }
                    return Err(e);
                }
                ids.push(audio_id);
            }
        }
        info!(clip = %id, placed = ids.len(), "Pool clip added to timeline");
        Ok(ids)
    }

    /// Drop pool entry `id`. Removing a video also drops its linked audio.
    /// Returns the removed entries.
    pub fn remove(&mut self, id: &ClipId) -> Result<Vec<Clip>> {
        let pos = self
            .clips
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| not_in_pool(id))?;
        let clip = self.clips.remove(pos);

        let mut removed = vec![clip];
        if removed[0].is_video() {
            let (linked, kept): (Vec<Clip>, Vec<Clip>) = std::mem::take(&mut self.clips)
                .into_iter()
                .partition(|c| c.linked_clip_id() == Some(id));
            self.clips = kept;
            removed.extend(linked);
        }
        debug!(clip = %id, removed = removed.len(), "Removed from pool");
        Ok(removed)
    }
}

fn not_in_pool(id: &ClipId) -> FramecutError {
    FramecutError::NotFound(format!("clip {id} in pool"))
}

/// Timeline copy of a pool clip: fresh id, placed at zero, no track yet.
fn placement(clip: &Clip, link: Option<ClipId>) -> Clip {
    let mut placed = clip.clone().at(0.0);
    placed.id = ClipId::generate();
    placed.track_id = None;
    if let ClipKind::Audio { linked_clip_id } = &mut placed.kind {
        *linked_clip_id = link;
    }
    placed
}
