//! Per-compositor cache of open media handles.
//!
//! Handles are keyed by clip id, opened lazily on first use and then reused
//! for every frame. They are only closed through `release`/`release_all`.

use framecut_core::Result;
use framecut_media::{FrameSource, FrameSourceFactory};
use framecut_timeline::{Clip, ClipId};
use std::collections::HashMap;
use tracing::debug;

/// Open frame sources for the clips a compositor has drawn.
pub struct HandleCache {
    factory: Box<dyn FrameSourceFactory>,
    handles: HashMap<ClipId, Box<dyn FrameSource>>,
    opened: u64,
}

impl HandleCache {
    pub fn new(factory: Box<dyn FrameSourceFactory>) -> Self {
        Self {
            factory,
            handles: HashMap::new(),
            opened: 0,
        }
    }

    /// Handle for `clip`, opening one when none is cached.
    pub fn acquire(&mut self, clip: &Clip) -> Result<&mut Box<dyn FrameSource>> {
        use std::collections::hash_map::Entry;

        match self.handles.entry(clip.id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let handle = self.factory.open(clip)?;
                self.opened += 1;
                debug!(clip = %clip.id, "Media handle opened");
                Ok(entry.insert(handle))
            }
        }
    }

    /// Close the handle of one clip. Returns whether one was open.
    pub fn release(&mut self, clip_id: &ClipId) -> bool {
        let released = self.handles.remove(clip_id).is_some();
        if released {
            debug!(clip = %clip_id, "Media handle released");
        }
        released
    }

    /// Close every handle.
    pub fn release_all(&mut self) {
        self.handles.clear();
    }

    pub fn contains(&self, clip_id: &ClipId) -> bool {
        self.handles.contains_key(clip_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Total handles opened over the cache's lifetime.
    pub fn opened_count(&self) -> u64 {
        self.opened
    }
}
