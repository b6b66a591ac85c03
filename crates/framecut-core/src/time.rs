//! Time representation for timeline editing.
//!
//! Timeline positions are seconds stored as `f64`. Frame rates stay rational
//! so that frame timestamps are computed from integers (`index * den / num`)
//! instead of accumulating a floating-point frame duration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing derived times.
pub const TIME_EPSILON: f64 = 1e-9;

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Whole-number rate such as 30 fps.
    #[inline]
    pub const fn fps(frames_per_second: u32) -> Self {
        Self::new(frames_per_second, 1)
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame in seconds.
    #[inline]
    pub fn frame_duration(self) -> f64 {
        self.denominator as f64 / self.numerator as f64
    }

    /// Timestamp of frame `index`.
    #[inline]
    pub fn frame_time(self, index: u64) -> f64 {
        (index as f64 * self.denominator as f64) / self.numerator as f64
    }

    /// Number of frames needed to cover `duration` seconds, rounded up.
    pub fn frames_for(self, duration: f64) -> u64 {
        if duration <= 0.0 || self.numerator == 0 {
            return 0;
        }
        let exact = duration * self.numerator as f64 / self.denominator as f64;
        (exact - TIME_EPSILON).ceil().max(0.0) as u64
    }

    /// Argument form understood by ffmpeg (`30/1`, `30000/1001`).
    pub fn as_ffmpeg_arg(self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }

    /// Check the rate is usable for rendering.
    pub fn is_valid(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A half-open time range `[start, start + duration)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub start: f64,
    /// Duration of the range
    pub duration: f64,
}

impl TimeRange {
    /// Create a new time range from start and duration.
    #[inline]
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// Create a time range from start and end times.
    #[inline]
    pub fn from_start_end(start: f64, end: f64) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    /// End time (exclusive).
    #[inline]
    pub fn end(self) -> f64 {
        self.start + self.duration
    }

    /// Check if a time is within this range.
    #[inline]
    pub fn contains(self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    /// Check if `time` lies strictly between start and end.
    #[inline]
    pub fn strictly_contains(self, time: f64) -> bool {
        time > self.start && time < self.end()
    }

    /// Check if two ranges overlap. Touching ranges do not.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Empty range starting at zero.
    pub const EMPTY: Self = Self {
        start: 0.0,
        duration: 0.0,
    };
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Format seconds as `HH:MM:SS` (fractional seconds are truncated).
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
