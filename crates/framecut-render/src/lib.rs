//! Framecut Render - preview compositing, playback and export
//!
//! - [`PreviewCompositor`] draws the timeline at any time into an RGBA canvas
//! - [`PlaybackScheduler`] moves the playhead from an injectable clock
//! - [`ExportRenderer`] renders every frame and muxes the final video

pub mod cache;
pub mod compositor;
pub mod export;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use cache::HandleCache;
pub use compositor::{CompositedFrame, FrameTarget, PreviewCompositor, SeekPolicy};
pub use export::{
    audio_mix_filter, ExportCancel, ExportPhase, ExportProgress, ExportRenderer, ExportReport,
    ExportSettings,
};
pub use scheduler::{Clock, ManualClock, PlaybackScheduler, SystemClock, TickHandle, TickOutcome};
