use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::BBox;

/// One detector hit. Coordinates are crop-local when returned by a
/// [`Detector`] and original-image after [`crate::adapter::sweep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: i32,
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    /// Reason this hit cannot be trusted, if any.
    pub fn malformed(&self) -> Option<&'static str> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Some("confidence outside [0, 1]");
        }
        if !self.bbox.is_finite() {
            return Some("non-finite bbox coordinate");
        }
        if self.bbox.x2 < self.bbox.x1 || self.bbox.y2 < self.bbox.y1 {
            return Some("inverted bbox");
        }
        None
    }
}

/// Object detector. Implementations must tolerate concurrent calls from
/// independent analyses, either by being stateless or by locking internally.
///
/// Implementations report failures as `Err`; a failed crop is dropped and the
/// sweep continues. Panics are not contained: they unwind out of the sweep
/// and out of `Engine::analyze`, so callers needing isolation run the
/// analysis on its own task or thread.
pub trait Detector: Send + Sync {
    /// Detect objects in `rgb` with confidence >= `conf_threshold`.
    /// Boxes are in pixel coordinates of `rgb`.
    fn detect(&self, rgb: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, rgb: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>> {
        (**self).detect(rgb, conf_threshold)
    }
}

impl<D: Detector + ?Sized> Detector for std::sync::Arc<D> {
    fn detect(&self, rgb: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>> {
        (**self).detect(rgb, conf_threshold)
    }
}
