//! Framecut Core - Foundation types for the timeline engine
//!
//! This crate provides the fundamental types used throughout Framecut:
//! - Error taxonomy shared by every crate
//! - Time representation (FrameRate, TimeRange)
//! - RGBA frame buffers and geometry for compositing
//! - Configuration and logging setup

pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod logging;
pub mod time;

pub use config::{
    EditorConfig, ExportDefaults, ImportConfig, LoggingConfig, PreviewConfig, TimelineConfig,
};
pub use error::{FramecutError, Result};
pub use frame::{FrameBuffer, Rgba};
pub use geometry::{Rect, Vec2};
pub use time::{format_clock, FrameRate, TimeRange, TIME_EPSILON};
