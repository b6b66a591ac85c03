//! Framecut Media - FFmpeg integration for media I/O
//!
//! This crate handles:
//! - The codec engine boundary used by export
//! - Media file probing through ffprobe
//! - Seekable frame sources for preview
//! - Importing uploaded bytes as clips
//! - The clip pool that imported clips wait in

pub mod engine;
pub mod decoder;
pub mod import;
pub mod pool;
pub mod probe;

pub use decoder::{FfmpegSourceFactory, FrameSource, FrameSourceFactory, VideoDecoder};
pub use engine::{ffmpeg_binary, ffprobe_binary, CodecEngine, FfmpegEngine};
pub use import::{ImportedMedia, Importer};
pub use pool::ClipPool;
pub use probe::{FfprobeProber, MediaProbe, MediaProber};

/// Report whether the ffmpeg binary can be found.
pub fn init() -> bool {
    let installed = ffmpeg_sidecar::command::ffmpeg_is_installed();
    if installed {
        tracing::info!(binary = %ffmpeg_binary().display(), "Framecut media initialized");
    } else {
        tracing::warn!("ffmpeg not found; preview decoding and export are unavailable");
    }
    installed
}
