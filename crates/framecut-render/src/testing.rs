//! Stub frame sources for unit tests.

use framecut_core::{FrameBuffer, FramecutError, Result, Rgba};
use framecut_media::{FrameSource, FrameSourceFactory};
use framecut_timeline::{Clip, ClipId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opens solid-color sources at each clip's natural size.
#[derive(Default)]
pub struct StubFactory {
    /// Clips whose handle cannot be opened.
    pub failing: Vec<ClipId>,
    pub colors: HashMap<ClipId, Rgba>,
    pub seeks: Arc<AtomicUsize>,
}

struct StubSource {
    width: u32,
    height: u32,
    position: f64,
    frame: FrameBuffer,
    seeks: Arc<AtomicUsize>,
}

impl FrameSourceFactory for StubFactory {
    fn open(&self, clip: &Clip) -> Result<Box<dyn FrameSource>> {
        if self.failing.contains(&clip.id) {
            return Err(FramecutError::Decode(format!("cannot open {}", clip.id)));
        }
        let (width, height) = clip.dimensions().unwrap_or((1, 1));
        let mut frame = FrameBuffer::new(width, height);
        frame.fill(self.colors.get(&clip.id).copied().unwrap_or([255, 255, 255, 255]));
        Ok(Box::new(StubSource {
            width,
            height,
            position: 0.0,
            frame,
            seeks: Arc::clone(&self.seeks),
        }))
    }
}

impl FrameSource for StubSource {
    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        self.position = time;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Result<&FrameBuffer> {
        Ok(&self.frame)
    }
}
