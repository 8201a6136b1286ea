//! Overlay compositor
//!
//! Draws the mirrored camera frame and places the selected jewelry on top
//! of it, anchored to face landmarks. Anchors are converted straight into
//! mirrored screen space, so overlays are drawn with an identity transform.
//!
//! Sizing uses the on-screen distance between the two ear anchors as the
//! only scale reference:
//!
//! | Overlay | Width | Position |
//! |---|---|---|
//! | Earring | `ear_distance * 0.25` | centered on each ear anchor, top edge on the anchor |
//! | Necklace | `ear_distance * 1.2` | centered on the neck anchor, `ear_distance * 0.2` below it |
//!
//! Heights follow the image's own aspect ratio.

pub mod canvas;

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub use canvas::{Canvas, CanvasError, RasterCanvas, Transform};

use crate::camera::CameraFrame;
use crate::catalog::Slot;
use crate::navigation::Selection;
use crate::tracking::FaceLandmarks;

/// Face mesh indices and overlay proportions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Face mesh landmark near the left ear (in image space)
    pub left_ear_index: usize,
    /// Face mesh landmark near the right ear (in image space)
    pub right_ear_index: usize,
    /// Chin landmark used as the neck anchor
    pub neck_index: usize,
    pub earring_scale: f32,
    pub necklace_scale: f32,
    /// Necklace drop below the neck anchor, as a fraction of ear distance
    pub necklace_drop: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            left_ear_index: 132,
            right_ear_index: 361,
            neck_index: 152,
            earring_scale: 0.25,
            necklace_scale: 1.2,
            necklace_drop: 0.2,
        }
    }
}

/// Screen-space point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Screen-space rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Anchor points in mirrored screen space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceAnchors {
    pub left_ear: Point,
    pub right_ear: Point,
    pub neck: Point,
}

impl FaceAnchors {
    /// Project the configured landmarks onto a `width` x `height` canvas,
    /// flipping x to match the mirrored video.
    ///
    /// `None` if the mesh doesn't contain one of the indices.
    pub fn locate(face: &FaceLandmarks, config: &OverlayConfig, width: f32, height: f32) -> Option<Self> {
        let project = |index: usize| {
            face.get(index)
                .map(|lm| Point::new((1.0 - lm.x) * width, lm.y * height))
        };
        Some(Self {
            left_ear: project(config.left_ear_index)?,
            right_ear: project(config.right_ear_index)?,
            neck: project(config.neck_index)?,
        })
    }

    pub fn ear_distance(&self) -> f32 {
        self.left_ear.distance(&self.right_ear)
    }
}

/// Size of an overlay `width` wide, keeping the image's aspect ratio
fn scaled_size(image: &RgbaImage, width: f32) -> Option<(f32, f32)> {
    if image.width() == 0 {
        return None;
    }
    let ratio = image.height() as f32 / image.width() as f32;
    Some((width, width * ratio))
}

/// Earring rectangles, one per ear.
///
/// The first rectangle sits on the `right_ear` anchor and the second on
/// `left_ear`. With the mirrored video, the "right ear" landmark appears
/// on the viewer's left.
pub fn earring_rects(anchors: &FaceAnchors, image: &RgbaImage, scale: f32) -> Option<[Rect; 2]> {
    let (w, h) = scaled_size(image, anchors.ear_distance() * scale)?;
    let at = |anchor: Point| Rect {
        x: anchor.x - w / 2.0,
        y: anchor.y,
        width: w,
        height: h,
    };
    Some([at(anchors.right_ear), at(anchors.left_ear)])
}

/// Necklace rectangle below the neck anchor
pub fn necklace_rect(anchors: &FaceAnchors, image: &RgbaImage, scale: f32, drop: f32) -> Option<Rect> {
    let ear_distance = anchors.ear_distance();
    let (w, h) = scaled_size(image, ear_distance * scale)?;
    Some(Rect {
        x: anchors.neck.x - w / 2.0,
        y: anchors.neck.y + ear_distance * drop,
        width: w,
        height: h,
    })
}

/// One overlay draw
#[derive(Clone, Debug)]
pub struct OverlayPlacement {
    pub slot: Slot,
    pub image: Arc<RgbaImage>,
    pub rect: Rect,
}

/// Stateless per-frame compositor
#[derive(Clone, Debug, Default)]
pub struct OverlayCompositor {
    config: OverlayConfig,
}

impl OverlayCompositor {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Where each selected, loaded overlay goes for this face.
    ///
    /// Empty without a face. Images that haven't finished loading are
    /// skipped for this frame.
    pub fn place_overlays(
        &self,
        face: Option<&FaceLandmarks>,
        selection: &Selection,
        width: f32,
        height: f32,
    ) -> Vec<OverlayPlacement> {
        let mut placements = Vec::new();
        let Some(face) = face else {
            return placements;
        };
        let Some(anchors) = FaceAnchors::locate(face, &self.config, width, height) else {
            log::debug!("Face mesh is missing anchor landmarks");
            return placements;
        };

        if let Some(image) = selection.earring.as_ref().and_then(|h| h.image()) {
            if let Some(rects) = earring_rects(&anchors, &image, self.config.earring_scale) {
                for rect in rects {
                    placements.push(OverlayPlacement {
                        slot: Slot::Earring,
                        image: image.clone(),
                        rect,
                    });
                }
            }
        }

        if let Some(image) = selection.necklace.as_ref().and_then(|h| h.image()) {
            if let Some(rect) = necklace_rect(
                &anchors,
                &image,
                self.config.necklace_scale,
                self.config.necklace_drop,
            ) {
                placements.push(OverlayPlacement {
                    slot: Slot::Necklace,
                    image,
                    rect,
                });
            }
        }

        placements
    }

    /// Render one frame: mirrored video, then overlays in screen space.
    ///
    /// Returns the number of overlay draws issued.
    pub fn compose<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        frame: &CameraFrame,
        face: Option<&FaceLandmarks>,
        selection: &Selection,
    ) -> usize {
        let (width, height) = (frame.width(), frame.height());
        canvas.resize(width, height);
        canvas.clear();

        let (w, h) = (width as f32, height as f32);
        canvas.translate(w, 0.0);
        canvas.scale(-1.0, 1.0);
        canvas.draw_image(&frame.image, 0.0, 0.0, w, h);
        canvas.reset_transform();

        let placements = self.place_overlays(face, selection, w, h);
        for placement in &placements {
            let r = placement.rect;
            canvas.draw_image(&placement.image, r.x, r.y, r.width, r.height);
        }
        placements.len()
    }
}
