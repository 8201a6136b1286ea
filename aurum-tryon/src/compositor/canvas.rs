//! Drawing surface
//!
//! A small subset of a 2D canvas API: clear, scaled image draws, a
//! translate/scale transform and export of the current contents as PNG.
//! [`RasterCanvas`] implements it on top of an in-memory RGBA buffer.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("Failed to encode canvas: {0}")]
    Encode(#[from] image::ImageError),
}

/// Axis-aligned affine transform (scale then translate)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// Map a point from user space to canvas pixels
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.scale_x * x + self.translate_x,
            self.scale_y * y + self.translate_y,
        )
    }

    /// Append a translation (applied before the existing transform)
    pub fn then_translate(self, dx: f32, dy: f32) -> Self {
        Self {
            translate_x: self.translate_x + self.scale_x * dx,
            translate_y: self.translate_y + self.scale_y * dy,
            ..self
        }
    }

    /// Append a scale (applied before the existing transform)
    pub fn then_scale(self, sx: f32, sy: f32) -> Self {
        Self {
            scale_x: self.scale_x * sx,
            scale_y: self.scale_y * sy,
            ..self
        }
    }
}

/// Canvas-like drawing surface
pub trait Canvas {
    /// Current size in pixels
    fn size(&self) -> (u32, u32);

    /// Change the size; contents are discarded
    fn resize(&mut self, width: u32, height: u32);

    /// Clear to transparent
    fn clear(&mut self);

    fn translate(&mut self, dx: f32, dy: f32);

    fn scale(&mut self, sx: f32, sy: f32);

    fn reset_transform(&mut self);

    /// Draw `image` scaled into the rectangle `(x, y, width, height)` in
    /// user space
    fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32);

    /// Current contents as PNG bytes
    fn export_png(&self) -> Result<Vec<u8>, CanvasError>;
}

/// Size of a canvas that has not been drawn to yet
pub const DEFAULT_CANVAS_WIDTH: u32 = 300;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 150;

/// In-memory canvas
pub struct RasterCanvas {
    pixels: RgbaImage,
    transform: Transform,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            transform: Transform::IDENTITY,
        }
    }

    /// Current pixels
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }
}

impl Default for RasterCanvas {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.pixels.dimensions() != (width, height) {
            self.pixels = RgbaImage::new(width, height);
        }
        self.transform = Transform::IDENTITY;
    }

    fn clear(&mut self) {
        self.pixels.pixels_mut().for_each(|p| p.0 = [0, 0, 0, 0]);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.transform = self.transform.then_translate(dx, dy);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.transform = self.transform.then_scale(sx, sy);
    }

    fn reset_transform(&mut self) {
        self.transform = Transform::IDENTITY;
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32) {
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        let (x0, y0) = self.transform.apply(x, y);
        let (x1, y1) = self.transform.apply(x + width, y + height);
        let target_w = (x1 - x0).abs().round() as u32;
        let target_h = (y1 - y0).abs().round() as u32;
        if target_w == 0 || target_h == 0 {
            return;
        }

        let mut scaled = if image.dimensions() == (target_w, target_h) {
            image.clone()
        } else {
            imageops::resize(image, target_w, target_h, FilterType::Triangle)
        };

        // Negative scale mirrors the image about its own rectangle
        if x1 < x0 {
            imageops::flip_horizontal_in_place(&mut scaled);
        }
        if y1 < y0 {
            imageops::flip_vertical_in_place(&mut scaled);
        }

        let left = x0.min(x1).round() as i64;
        let top = y0.min(y1).round() as i64;
        imageops::overlay(&mut self.pixels, &scaled, left, top);
    }

    /// A zero-sized canvas exports as a single transparent pixel
    fn export_png(&self) -> Result<Vec<u8>, CanvasError> {
        let mut bytes = Vec::new();
        let (width, height) = self.pixels.dimensions();
        if width == 0 || height == 0 {
            RgbaImage::new(1, 1).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        } else {
            self.pixels
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
        Ok(bytes)
    }
}
