//! Video frames
//!
//! The try-on core never talks to a camera device directly. Whatever owns
//! the device wraps each picture in a [`CameraFrame`] and pushes it into the
//! frame pump; [`FrameSource`] is the seam for that producer.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::{Rgba, RgbaImage};

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixels, shared so detectors and the compositor can hold the
    /// same frame without copying
    pub image: Arc<RgbaImage>,
    /// Frame number
    pub frame_number: u64,
    /// Frame timestamp
    pub timestamp: Instant,
}

impl CameraFrame {
    pub fn new(image: Arc<RgbaImage>, frame_number: u64, timestamp: Instant) -> Self {
        Self {
            image,
            frame_number,
            timestamp,
        }
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Producer of camera frames
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted
    fn next_frame(&mut self) -> Option<CameraFrame>;
}

/// Repeats one still picture as a live feed (headless runs and tests)
pub struct StillFrameSource {
    image: Arc<RgbaImage>,
    frame_count: u64,
}

impl StillFrameSource {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
            frame_count: 0,
        }
    }

    /// Solid color feed
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    /// Load the still from an image file
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }

    /// Frames produced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSource for StillFrameSource {
    fn next_frame(&mut self) -> Option<CameraFrame> {
        let frame = CameraFrame::new(self.image.clone(), self.frame_count, Instant::now());
        self.frame_count += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_source_numbers_frames() {
        let mut source = StillFrameSource::solid(4, 3, [10, 20, 30, 255]);
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();

        assert_eq!(a.frame_number, 0);
        assert_eq!(b.frame_number, 1);
        assert_eq!((a.width(), a.height()), (4, 3));
        assert!(Arc::ptr_eq(&a.image, &b.image));
        assert_eq!(source.frame_count(), 2);
    }
}
