use image::{imageops, RgbImage};
use std::borrow::Cow;

pub const DEFAULT_CROP_SCALES: [f64; 3] = [0.9, 0.8, 0.7];

/// Rectangular view into the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop {
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
    /// None for the full image
    pub scale: Option<f64>,
}

impl Crop {
    pub fn full(width: u32, height: u32) -> Self {
        Self { offset_x: 0, offset_y: 0, width, height, scale: None }
    }

    /// Center crop covering `scale` of each dimension, or None if it would be empty.
    pub fn center(width: u32, height: u32, scale: f64) -> Option<Self> {
        let cw = (width as f64 * scale) as u32;
        let ch = (height as f64 * scale) as u32;
        if cw == 0 || ch == 0 {
            return None;
        }
        let cw = cw.min(width);
        let ch = ch.min(height);
        Some(Self {
            offset_x: (width - cw) / 2,
            offset_y: (height - ch) / 2,
            width: cw,
            height: ch,
            scale: Some(scale),
        })
    }

    pub fn is_full(&self, img: &RgbImage) -> bool {
        self.offset_x == 0 && self.offset_y == 0 && self.width == img.width() && self.height == img.height()
    }

    /// Pixels of this crop. The full-image crop borrows the source.
    pub fn pixels<'a>(&self, img: &'a RgbImage) -> Cow<'a, RgbImage> {
        if self.is_full(img) {
            Cow::Borrowed(img)
        } else {
            Cow::Owned(imageops::crop_imm(img, self.offset_x, self.offset_y, self.width, self.height).to_image())
        }
    }
}

/// Full image first, then one center crop per scale in the given order.
/// Degenerate crops are skipped.
pub fn generate_crops(width: u32, height: u32, scales: &[f64]) -> Vec<Crop> {
    let mut crops = Vec::with_capacity(scales.len() + 1);
    crops.push(Crop::full(width, height));
    crops.extend(scales.iter().filter_map(|&s| Crop::center(width, height, s)));
    crops
}
