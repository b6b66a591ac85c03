//! Error types for Framecut.

use thiserror::Error;

/// Main error type for Framecut operations.
#[derive(Error, Debug)]
pub enum FramecutError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Split requested at a point that is not strictly inside the clip.
    #[error("Invalid split point {time:.3}s for clip {clip_id} spanning [{start:.3}s, {end:.3}s)")]
    InvalidSplitPoint {
        clip_id: String,
        time: f64,
        start: f64,
        end: f64,
    },

    /// Placement would intersect another clip on the same track.
    #[error("Clip {clip_id} at [{start:.3}s, {end:.3}s) overlaps {conflicting} on track {track_id}")]
    OverlapConflict {
        clip_id: String,
        track_id: String,
        conflicting: String,
        start: f64,
        end: f64,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Timed out after {seconds:.1}s waiting for metadata of {name}")]
    MetadataTimeout { name: String, seconds: f64 },

    #[error("Invalid video dimensions {width}x{height} for {name}")]
    InvalidVideoDimensions { name: String, width: u32, height: u32 },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Decode error: {0}")]
    Decode(String),

    /// An external engine command failed.
    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    #[error("Render failure for clip {clip_id}: {reason}")]
    RenderFailure { clip_id: String, reason: String },

    #[error("Export already in progress")]
    ExportInProgress,

    #[error("Export cancelled")]
    ExportCancelled,

    #[error("Track {track_id} is locked")]
    TrackLocked { track_id: String },

    #[error("Track kind mismatch: {0}")]
    TrackKindMismatch(String),

    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FramecutError {
    /// Structural errors are rejected before any state changes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidSplitPoint { .. }
                | Self::OverlapConflict { .. }
                | Self::TrackLocked { .. }
                | Self::TrackKindMismatch(_)
                | Self::InvalidClip(_)
        )
    }
}

/// Result type alias for Framecut operations.
pub type Result<T> = std::result::Result<T, FramecutError>;
