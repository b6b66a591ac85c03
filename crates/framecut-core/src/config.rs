//! Editor configuration.
//!
//! Every component takes its own section so tests can build one without
//! touching the filesystem. `EditorConfig::load` reads
//! `<config_dir>/framecut/config.json` and falls back to defaults.

use crate::error::{FramecutError, Result};
use crate::time::FrameRate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global editor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub timeline: TimelineConfig,
    pub preview: PreviewConfig,
    pub export: ExportDefaults,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

/// Timeline view and editing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Pixels per second at zoom 1.0.
    pub base_pixels_per_second: f64,
    /// Lowest zoom, as a multiple of the base.
    pub min_zoom: f64,
    /// Highest zoom, as a multiple of the base.
    pub max_zoom: f64,
    /// Factor applied by one zoom step.
    pub zoom_factor: f64,
    /// Resizes never shrink a clip below this many seconds.
    pub min_clip_duration: f64,
    /// Frame rate used by frame-step playhead navigation.
    pub nudge_frame_rate: FrameRate,
}

/// Live preview canvas settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    /// A cached handle is only re-seeked when it drifted further than this.
    pub seek_epsilon: f64,
}

/// Defaults offered for new exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// JPEG quality of intermediate frames (1-100).
    pub quality: u8,
}

/// Media import settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Seconds to wait for a metadata probe.
    pub metadata_timeout_secs: f64,
    pub video_types: Vec<String>,
    pub audio_types: Vec<String>,
    /// Where imported media is stored. `None` uses the system temp dir.
    pub media_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framecut_render=debug,warn").
    pub level: String,
    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            base_pixels_per_second: 100.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
            zoom_factor: 1.2,
            min_clip_duration: 0.1,
            nudge_frame_rate: FrameRate::FPS_30,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            seek_epsilon: 0.2,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: FrameRate::FPS_30,
            quality: 90,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: 10.0,
            video_types: ["video/mp4", "video/webm", "video/ogg", "video/quicktime"]
                .map(String::from)
                .to_vec(),
            audio_types: ["audio/mpeg", "audio/wav", "audio/ogg", "audio/aac"]
                .map(String::from)
                .to_vec(),
            media_dir: None,
        }
    }
}

impl ImportConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.metadata_timeout_secs.max(0.0))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EditorConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = config_file_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| FramecutError::Serialization(format!("Invalid config: {e}")))
    }

    /// Write config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FramecutError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("framecut").join("config.json"))
}
