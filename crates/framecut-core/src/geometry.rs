//! Geometric primitives for frame placement.

use bytemuck::{Pod, Zeroable};
use glam::Vec2 as GlamVec2;
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole canvas.
    #[inline]
    pub fn canvas(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Create a rectangle from center and size.
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self {
            x: center.x - size.x * 0.5,
            y: center.y - size.y * 0.5,
            width: size.x,
            height: size.y,
        }
    }

    /// Maximum corner (bottom-right).
    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub fn contains(self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    /// Largest rectangle with the source aspect ratio centered inside `self`.
    ///
    /// A wider container gets pillarbox bars left and right, a taller one gets
    /// letterbox bars top and bottom. Degenerate sources fill the container.
    pub fn aspect_fit(self, source_width: u32, source_height: u32) -> Self {
        if source_width == 0 || source_height == 0 || self.height <= 0.0 {
            return self;
        }
        let source_aspect = source_width as f32 / source_height as f32;
        let container_aspect = self.width / self.height;

        let size = if container_aspect > source_aspect {
            Vec2::new(self.height * source_aspect, self.height)
        } else {
            Vec2::new(self.width, self.width / source_aspect)
        };
        Self::from_center_size(self.center(), size)
    }

    /// Integer pixel bounds `(x0, y0, x1, y1)` clipped to a `width`x`height` canvas.
    pub fn pixel_bounds(self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp_x = |v: f32| v.round().clamp(0.0, width as f32) as u32;
        let clamp_y = |v: f32| v.round().clamp(0.0, height as f32) as u32;
        let max = self.max();
        (clamp_x(self.x), clamp_y(self.y), clamp_x(max.x), clamp_y(max.y))
    }
}
