//! Media file probing to get metadata without full decode.

use framecut_core::{FramecutError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::engine::ffprobe_binary;

/// Information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProbe {
    /// File path
    pub path: String,
    /// Duration in seconds
    pub duration: f64,
    /// Video streams
    pub video_streams: Vec<VideoStreamInfo>,
    /// Audio streams
    pub audio_streams: Vec<AudioStreamInfo>,
    /// Container format
    pub format: String,
}

/// Information about a video stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

/// Information about an audio stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl MediaProbe {
    /// Check if the file has video.
    pub fn has_video(&self) -> bool {
        !self.video_streams.is_empty()
    }

    /// Check if the file has audio.
    pub fn has_audio(&self) -> bool {
        !self.audio_streams.is_empty()
    }

    /// Get the primary video stream info.
    pub fn primary_video(&self) -> Option<&VideoStreamInfo> {
        self.video_streams.first()
    }

    /// Get the primary audio stream info.
    pub fn primary_audio(&self) -> Option<&AudioStreamInfo> {
        self.audio_streams.first()
    }

    /// Frame size of the primary video stream, `(0, 0)` without one.
    pub fn dimensions(&self) -> (u32, u32) {
        self.primary_video()
            .map(|v| (v.width, v.height))
            .unwrap_or((0, 0))
    }
}

/// Reads duration and stream layout of a media file.
///
/// Probing may block; the importer bounds the wait.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<MediaProbe>;
}

/// Prober backed by `ffprobe -print_format json`.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new() -> Self {
        Self {
            binary: ffprobe_binary(),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<MediaProbe> {
        if !path.exists() {
            return Err(FramecutError::NotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| FramecutError::Metadata(format!("Failed to run ffprobe: {e}")))?;
        if !output.status.success() {
            return Err(FramecutError::Metadata(format!(
                "ffprobe could not read {} ({})",
                path.display(),
                output.status
            )));
        }
        parse_ffprobe_json(&path.to_string_lossy(), &output.stdout)
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    channels: Option<u16>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

/// Parse ffprobe's JSON report.
///
/// The container duration wins; the longest stream duration is the fallback.
pub fn parse_ffprobe_json(path: &str, data: &[u8]) -> Result<MediaProbe> {
    let parsed: FfprobeOutput = serde_json::from_slice(data)
        .map_err(|e| FramecutError::Metadata(format!("Invalid ffprobe output: {e}")))?;

    let parse_secs = |s: &Option<String>| s.as_deref().and_then(|v| v.parse::<f64>().ok());
    let stream_duration = parsed
        .streams
        .iter()
        .filter_map(|s| parse_secs(&s.duration))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| parse_secs(&f.duration))
        .or(stream_duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| FramecutError::Metadata(format!("No duration reported for {path}")))?;

    let mut video_streams = Vec::new();
    let mut audio_streams = Vec::new();
    for stream in parsed.streams {
        let codec = stream.codec_name.unwrap_or_default();
        match stream.codec_type.as_deref() {
            Some("video") => video_streams.push(VideoStreamInfo {
                index: stream.index,
                codec,
                width: stream.width.unwrap_or(0),
                height: stream.height.unwrap_or(0),
            }),
            Some("audio") => audio_streams.push(AudioStreamInfo {
                index: stream.index,
                codec,
                sample_rate: stream
                    .sample_rate
                    .as_deref()
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(0),
                channels: stream.channels.unwrap_or(0),
            }),
            _ => {}
        }
    }

    Ok(MediaProbe {
        path: path.to_string(),
        duration,
        video_streams,
        audio_streams,
        format: parsed
            .format
            .and_then(|f| f.format_name)
            .unwrap_or_default(),
    })
}
