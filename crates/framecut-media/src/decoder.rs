//! Video decoder backed by an `ffmpeg` subprocess.
//!
//! A [`FrameSource`] is a seekable media handle: the preview compositor keeps
//! one per clip, seeks it when the playhead drifts, and pulls the frame at
//! the current position.

use framecut_core::{FrameBuffer, FramecutError, Result};
use framecut_timeline::Clip;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::engine::ffmpeg_binary;

/// A seekable source of decoded frames.
pub trait FrameSource: Send {
    /// Source time of the frame the handle currently shows.
    fn position(&self) -> f64;

    /// Move to source time `time`.
    fn seek(&mut self, time: f64) -> Result<()>;

    /// Natural frame size.
    fn dimensions(&self) -> (u32, u32);

    /// Frame at the current position.
    fn frame(&mut self) -> Result<&FrameBuffer>;
}

/// Opens frame sources for clips.
pub trait FrameSourceFactory: Send {
    fn open(&self, clip: &Clip) -> Result<Box<dyn FrameSource>>;
}

/// Video decoder using FFmpeg.
///
/// The binary is located through ffmpeg-sidecar's path resolution and run
/// with [`std::process::Command`]; each decoded position runs one `-ss` seek
/// and grabs a single RGBA frame from stdout.
pub struct VideoDecoder {
    binary: PathBuf,
    path: PathBuf,
    width: u32,
    height: u32,
    position: f64,
    frame: Option<FrameBuffer>,
}

impl VideoDecoder {
    /// Open a video file for decoding at its natural size.
    pub fn open<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FramecutError::NotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }
        if width == 0 || height == 0 {
            return Err(FramecutError::InvalidVideoDimensions {
                name: path.display().to_string(),
                width,
                height,
            });
        }
        info!(path = %path.display(), width, height, "Opening video file");
        Ok(Self {
            binary: ffmpeg_binary(),
            path: path.to_path_buf(),
            width,
            height,
            position: 0.0,
            frame: None,
        })
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode_at(&self, time: f64) -> Result<FrameBuffer> {
        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{time:.6}"))
            .arg("-i")
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-s"])
            .arg(format!("{}x{}", self.width, self.height))
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| FramecutError::Decode(format!("Failed to spawn ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(FramecutError::Decode(format!(
                "ffmpeg could not decode {} at {time:.3}s ({})",
                self.path.display(),
                output.status
            )));
        }
        FrameBuffer::from_rgba(self.width, self.height, output.stdout)
    }
}

impl FrameSource for VideoDecoder {
    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(FramecutError::InvalidParameter(format!(
                "seek target {time} out of range"
            )));
        }
        debug!(path = %self.path.display(), time, "Seek");
        self.position = time;
        self.frame = None;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Result<&FrameBuffer> {
        if self.frame.is_none() {
            self.frame = Some(self.decode_at(self.position)?);
        }
        self.frame
            .as_ref()
            .ok_or_else(|| FramecutError::Decode("frame unavailable".into()))
    }
}

/// Opens a [`VideoDecoder`] for each video clip.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegSourceFactory;

impl FrameSourceFactory for FfmpegSourceFactory {
    fn open(&self, clip: &Clip) -> Result<Box<dyn FrameSource>> {
        let (width, height) = clip.dimensions().ok_or_else(|| {
            FramecutError::InvalidParameter(format!("clip {} has no video", clip.id))
        })?;
        Ok(Box::new(VideoDecoder::open(&clip.source.path, width, height)?))
    }
}
