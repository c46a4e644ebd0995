use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, corners `(x1, y1)` .. `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self { x1: v[0], y1: v[1], x2: v[2], y2: v[3] }
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x2 as f64 - self.x1 as f64
    }

    pub fn height(&self) -> f64 {
        self.y2 as f64 - self.y1 as f64
    }

    /// Area with negative extents clamped to zero.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// Smallest box containing both.
    pub fn enclose(&self, o: &BBox) -> Self {
        Self::new(self.x1.min(o.x1), self.y1.min(o.y1), self.x2.max(o.x2), self.y2.max(o.y2))
    }

    pub fn intersection_area(&self, o: &BBox) -> f64 {
        let ix1 = self.x1.max(o.x1) as f64;
        let iy1 = self.y1.max(o.y1) as f64;
        let ix2 = self.x2.min(o.x2) as f64;
        let iy2 = self.y2.min(o.y2) as f64;
        (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0)
    }

    pub fn iou(&self, o: &BBox) -> f64 {
        let inter = self.intersection_area(o);
        let union = self.area() + o.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1 as f64, self.y1 as f64, self.x2 as f64, self.y2 as f64]
    }
}
