use image::RgbImage;
use tracing::{debug, warn};

use crate::{Crop, Detection, Detector};

/// Pooled detector output over all crops.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Original-image coordinates, in discovery order (crop order, then detector order).
    pub detections: Vec<Detection>,
    pub crops_ok: usize,
    /// One message per crop whose detector call failed.
    pub failures: Vec<String>,
}

impl Sweep {
    pub fn all_failed(&self) -> bool {
        self.crops_ok == 0 && !self.failures.is_empty()
    }
}

/// Run `detector` on every crop in order and map boxes back onto `img`.
/// A failing crop is logged and dropped.
pub fn sweep<D: Detector + ?Sized>(detector: &D, img: &RgbImage, crops: &[Crop], conf_threshold: f32) -> Sweep {
    let mut out = Sweep::default();

    for (i, crop) in crops.iter().enumerate() {
        let pixels = crop.pixels(img);
        let dets = match detector.detect(&pixels, conf_threshold) {
            Ok(d) => d,
            Err(e) => {
                warn!("crop {} ({}x{}+{}+{}): detector failed: {:#}", i, crop.width, crop.height, crop.offset_x, crop.offset_y, e);
                out.failures.push(format!("detector failed on crop {} (scale {}): {:#}", i, scale_label(crop), e));
                continue;
            }
        };
        debug!("crop {} scale={}: {} raw boxes", i, scale_label(crop), dets.len());

        let (dx, dy) = (crop.offset_x as f32, crop.offset_y as f32);
        out.detections.extend(dets.into_iter().map(|d| Detection { bbox: d.bbox.translate(dx, dy), ..d }));
        out.crops_ok += 1;
    }
    out
}

fn scale_label(crop: &Crop) -> String {
    crop.scale.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "full".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_crops, BBox};
    use std::sync::Mutex;

    /// Returns one fixed box per call, fails on listed call indices.
    struct Scripted {
        fail_on: Vec<usize>,
        calls: Mutex<usize>,
    }

    impl Detector for Scripted {
        fn detect(&self, rgb: &RgbImage, _conf: f32) -> anyhow::Result<Vec<Detection>> {
            let mut n = self.calls.lock().unwrap();
            let idx = *n;
            *n += 1;
            anyhow::ensure!(!self.fail_on.contains(&idx), "device lost");
            Ok(vec![Detection {
                class_id: idx as i32,
                confidence: 0.5,
                bbox: BBox::new(0.0, 0.0, rgb.width() as f32, rgb.height() as f32),
            }])
        }
    }

    #[test]
    fn test_boxes_translated_to_image_coords() {
        let img = RgbImage::new(100, 100);
        let crops = generate_crops(100, 100, &[0.8]);
        let det = Scripted { fail_on: vec![], calls: Mutex::new(0) };
        let sw = sweep(&det, &img, &crops, 0.25);
        assert_eq!(sw.crops_ok, 2);
        assert_eq!(sw.detections[0].bbox, BBox::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(sw.detections[1].bbox, BBox::new(10.0, 10.0, 90.0, 90.0));
    }

    #[test]
    fn test_failed_crops_dropped() {
        let img = RgbImage::new(100, 100);
        let crops = generate_crops(100, 100, &[0.9, 0.8, 0.7]);
        let det = Scripted { fail_on: vec![1, 3], calls: Mutex::new(0) };
        let sw = sweep(&det, &img, &crops, 0.25);
        assert_eq!(sw.crops_ok, 2);
        assert_eq!(sw.failures.len(), 2);
        assert!(!sw.all_failed());
        let ids: Vec<i32> = sw.detections.iter().map(|d| d.class_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_all_failed() {
        let img = RgbImage::new(10, 10);
        let crops = generate_crops(10, 10, &[]);
        let det = Scripted { fail_on: vec![0], calls: Mutex::new(0) };
        let sw = sweep(&det, &img, &crops, 0.25);
        assert!(sw.all_failed());
        assert!(sw.detections.is_empty());
    }

    struct Panicky;

    impl Detector for Panicky {
        fn detect(&self, _rgb: &RgbImage, _conf: f32) -> anyhow::Result<Vec<Detection>> {
            panic!("driver bug");
        }
    }

    #[test]
    #[should_panic(expected = "driver bug")]
    fn test_detector_panic_is_not_swallowed() {
        let img = RgbImage::new(10, 10);
        sweep(&Panicky, &img, &generate_crops(10, 10, &[]), 0.25);
    }
}
