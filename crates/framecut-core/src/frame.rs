//! RGBA8 frame buffers used by the preview and export compositors.
//!
//! Rows are tightly packed (`stride == width * 4`) so a buffer can be handed
//! to ffmpeg as `rawvideo`/`rgba` or to the JPEG encoder without repacking.

use crate::error::{FramecutError, Result};
use crate::geometry::Rect;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// One RGBA8 pixel.
pub type Rgba = [u8; 4];

/// Opaque black.
pub const BLACK: Rgba = [0, 0, 0, 255];

/// Fill used for clips that failed to render.
pub const ERROR_RED: Rgba = [200, 30, 30, 255];

const ERROR_MARK: Rgba = [255, 255, 255, 255];

/// A video frame in CPU memory.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a transparent frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Create an opaque black frame.
    pub fn black(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height);
        frame.fill(BLACK);
        frame
    }

    /// Wrap raw RGBA8 bytes, e.g. a frame read back from ffmpeg.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(FramecutError::InvalidParameter(format!(
                "RGBA buffer for {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Raw RGBA8 bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixels as `[u8; 4]` items.
    #[inline]
    pub fn pixels(&self) -> &[Rgba] {
        bytemuck::cast_slice(&self.data)
    }

    #[inline]
    fn pixels_mut(&mut self) -> &mut [Rgba] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Read one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels()
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Fill the whole frame.
    pub fn fill(&mut self, color: Rgba) {
        self.pixels_mut().fill(color);
    }

    /// Fill a rectangle (clipped to the frame).
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let (x0, y0, x1, y1) = rect.pixel_bounds(self.width, self.height);
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let width = self.width as usize;
        let pixels = self.pixels_mut();
        for y in y0..y1 {
            let row = y as usize * width;
            pixels[row + x0 as usize..row + x1 as usize].fill(color);
        }
    }

    /// Draw `source` scaled (nearest neighbour) into `dest`, painting over
    /// what is already there.
    pub fn draw_scaled(&mut self, source: &FrameBuffer, dest: Rect) {
        if source.width == 0 || source.height == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let (x0, y0, x1, y1) = dest.pixel_bounds(self.width, self.height);
        let sx_scale = source.width as f32 / dest.width;
        let sy_scale = source.height as f32 / dest.height;
        let width = self.width as usize;
        let src = source.pixels();
        let src_width = source.width as usize;
        let dst = self.pixels_mut();

        for y in y0..y1 {
            let sy = (((y as f32 + 0.5 - dest.y) * sy_scale) as u32).min(source.height - 1);
            let src_row = sy as usize * src_width;
            let dst_row = y as usize * width;
            for x in x0..x1 {
                let sx = (((x as f32 + 0.5 - dest.x) * sx_scale) as u32).min(source.width - 1);
                dst[dst_row + x as usize] = src[src_row + sx as usize];
            }
        }
    }

    /// Paint a visible error marker (red box with a white cross) over `rect`.
    pub fn draw_error_placeholder(&mut self, rect: Rect) {
        self.fill_rect(rect, ERROR_RED);
        let (x0, y0, x1, y1) = rect.pixel_bounds(self.width, self.height);
        let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
        if w == 0 || h == 0 {
            return;
        }
        let width = self.width as usize;
        let steps = w.max(h);
        let pixels = self.pixels_mut();
        for i in 0..steps {
            let x = x0 + (i as u64 * w as u64 / steps as u64) as u32;
            let y = y0 + (i as u64 * h as u64 / steps as u64) as u32;
            let y_mirror = y1 - 1 - (y - y0);
            pixels[y as usize * width + x as usize] = ERROR_MARK;
            pixels[y_mirror as usize * width + x as usize] = ERROR_MARK;
        }
    }

    /// Drop the alpha channel.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels()
            .iter()
            .flat_map(|&[r, g, b, _]| [r, g, b])
            .collect()
    }

    /// Encode as a baseline JPEG still. `quality` is clamped to 1..=100.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode(&self.to_rgb8(), self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| FramecutError::EncodeFailure(format!("JPEG encoding failed: {e}")))?;
        Ok(out)
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [Rgba; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        let mut frame = Self::new(width, height);
        let w = width as usize;
        for (i, px) in frame.pixels_mut().iter_mut().enumerate() {
            let x = i % w.max(1);
            *px = BARS[x * 8 / w.max(1)];
        }
        frame
    }
}
