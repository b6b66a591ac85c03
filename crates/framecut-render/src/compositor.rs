//! CPU frame compositor.
//!
//! Resolves the clips active at a timeline time, stacks them by track index
//! (lowest first, painter's algorithm) and draws each video frame aspect-fit
//! into an RGBA8 canvas. Audio clips are only reported as audible. A clip
//! that fails to render leaves a placeholder in its region and compositing
//! continues with the next layer.

use crossbeam_channel::Receiver;
use framecut_core::{FrameBuffer, FramecutError, PreviewConfig, Rect, Result};
use framecut_timeline::{Clip, ClipId, ClipKind, Timeline, TimelineEvent};
use tracing::{debug, warn};

use crate::cache::HandleCache;
use framecut_media::FrameSourceFactory;

/// When a cached handle is re-seeked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekPolicy {
    /// Seek only when the handle drifted further than this many seconds.
    Tolerance(f64),
    /// Seek before every frame.
    Exact,
}

impl SeekPolicy {
    fn needs_seek(self, position: f64, target: f64) -> bool {
        match self {
            SeekPolicy::Tolerance(epsilon) => (position - target).abs() > epsilon,
            SeekPolicy::Exact => true,
        }
    }
}

/// A composited output frame.
#[derive(Debug)]
pub struct CompositedFrame {
    pub buffer: FrameBuffer,
    /// Timeline time the frame shows.
    pub time: f64,
    /// Video clips drawn, bottom layer first.
    pub drawn: Vec<ClipId>,
    /// Audio clips that should be heard at this time.
    pub audible: Vec<ClipId>,
    /// One `RenderFailure` per clip that could not be drawn.
    pub failures: Vec<FramecutError>,
}

impl CompositedFrame {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Composites timeline frames for live preview.
pub struct PreviewCompositor {
    width: u32,
    height: u32,
    policy: SeekPolicy,
    cache: HandleCache,
    events: Option<Receiver<TimelineEvent>>,
    last_frame: Option<CompositedFrame>,
}

impl PreviewCompositor {
    /// Compositor for the preview canvas, re-seeking past the configured
    /// tolerance.
    pub fn new(config: &PreviewConfig, factory: Box<dyn FrameSourceFactory>) -> Self {
        Self::with_policy(
            config.width,
            config.height,
            SeekPolicy::Tolerance(config.seek_epsilon),
            factory,
        )
    }

    pub fn with_policy(
        width: u32,
        height: u32,
        policy: SeekPolicy,
        factory: Box<dyn FrameSourceFactory>,
    ) -> Self {
        Self {
            width,
            height,
            policy,
            cache: HandleCache::new(factory),
            events: None,
            last_frame: None,
        }
    }

    /// Follow a timeline so handles of removed clips get released.
    pub fn attach(&mut self, timeline: &mut Timeline) {
        self.events = Some(timeline.subscribe());
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    /// The most recent frame produced by `present`.
    pub fn last_frame(&self) -> Option<&CompositedFrame> {
        self.last_frame.as_ref()
    }

    /// Apply pending timeline events.
    pub fn sync_events(&mut self) {
        let Some(events) = &self.events else {
            return;
        };
        for event in events.try_iter() {
            if let TimelineEvent::ClipRemoved { clip_id, .. } = event {
                self.cache.release(&clip_id);
            }
        }
    }

    /// Close every open handle.
    pub fn release_all(&mut self) {
        self.cache.release_all();
    }

    /// Composite the timeline at `time`.
    pub fn render(&mut self, timeline: &Timeline, time: f64) -> CompositedFrame {
        self.sync_events();

        let canvas = Rect::canvas(self.width, self.height);
        let mut frame = CompositedFrame {
            buffer: FrameBuffer::black(self.width, self.height),
            time,
            drawn: Vec::new(),
            audible: Vec::new(),
            failures: Vec::new(),
        };

        for active in timeline.active_clips_at(time) {
            if active.track.muted {
                continue;
            }
            let clip = active.clip;
            match clip.kind {
                ClipKind::Audio { .. } => frame.audible.push(clip.id.clone()),
                ClipKind::Video { width, height, .. } => {
                    match draw_clip(
                        &mut self.cache,
                        self.policy,
                        &mut frame.buffer,
                        canvas,
                        clip,
                        active.source_time,
                    ) {
                        Ok(()) => frame.drawn.push(clip.id.clone()),
                        Err(e) => {
                            warn!(clip = %clip.id, time, error = %e, "Clip failed to render");
                            frame.buffer.draw_error_placeholder(canvas.aspect_fit(width, height));
                            frame.failures.push(FramecutError::RenderFailure {
                                clip_id: clip.id.to_string(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
        frame
    }
}

fn draw_clip(
    cache: &mut HandleCache,
    policy: SeekPolicy,
    buffer: &mut FrameBuffer,
    canvas: Rect,
    clip: &Clip,
    source_time: f64,
) -> Result<()> {
    let handle = cache.acquire(clip)?;
    if policy.needs_seek(handle.position(), source_time) {
        debug!(clip = %clip.id, from = handle.position(), to = source_time, "Seek");
        handle.seek(source_time)?;
    }
    let image = handle.frame()?;
    buffer.draw_scaled(image, canvas.aspect_fit(image.width, image.height));
    Ok(())
}

/// Receives the frame composited on each playback tick.
pub trait FrameTarget {
    fn present(&mut self, timeline: &Timeline, time: f64);
}

impl FrameTarget for PreviewCompositor {
    fn present(&mut self, timeline: &Timeline, time: f64) {
        let frame = self.render(timeline, time);
        self.last_frame = Some(frame);
    }
}
