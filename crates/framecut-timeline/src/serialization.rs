//! Project serialization with versioning and migration.
//!
//! Uses JSON with a schema version field for forward-compatible persistence.

use framecut_core::{FramecutError, Result, TimelineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::timeline::{Timeline, TimelineSnapshot};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned project file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Schema version for migration.
    pub version: u32,
    /// The timeline data.
    pub timeline: TimelineSnapshot,
    /// Application version that wrote this file.
    pub app_version: String,
}

impl ProjectFile {
    /// Capture the current state of a timeline.
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            version: CURRENT_VERSION,
            timeline: timeline.snapshot(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Rebuild the timeline, re-validating every clip placement.
    pub fn into_timeline(self, config: TimelineConfig) -> Result<Timeline> {
        Timeline::from_snapshot(config, self.timeline)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            FramecutError::Serialization(format!("Failed to serialize project: {}", e))
        })
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| FramecutError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        if version > CURRENT_VERSION {
            return Err(FramecutError::Serialization(format!(
                "Project file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;

        serde_json::from_value(migrated)
            .map_err(|e| FramecutError::Serialization(format!("Failed to parse project: {}", e)))
    }

    /// Save project to a file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        tracing::info!(path = %path.display(), "Project saved");
        Ok(())
    }

    /// Load project from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 files are a bare timeline snapshot.
                if data.get("version").is_none() {
                    data = serde_json::json!({
                        "version": 1,
                        "timeline": data,
                        "app_version": "0.1.0",
                    });
                }
                version = 1;
            }
            _ => {
                return Err(FramecutError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}
