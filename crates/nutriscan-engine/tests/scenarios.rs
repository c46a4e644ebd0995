use std::collections::HashMap;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use nutriscan_engine::{Engine, EngineConfig};
use nutriscan_nutrition::{NutritionTable, PortionModel};
use nutriscan_proto::{ImageDimensions, Nutrition, NO_ITEMS_MESSAGE};
use nutriscan_vision::{BBox, Detection, Detector, ReplayDetector};

enum Reply {
    Boxes(Vec<Detection>),
    Fail(&'static str),
}

/// Answers by crop width. Unlisted crops see nothing.
#[derive(Default)]
struct Scripted {
    by_width: HashMap<u32, Reply>,
}

impl Scripted {
    fn on(mut self, width: u32, dets: Vec<Detection>) -> Self {
        self.by_width.insert(width, Reply::Boxes(dets));
        self
    }

    fn fail(mut self, width: u32, msg: &'static str) -> Self {
        self.by_width.insert(width, Reply::Fail(msg));
        self
    }
}

impl Detector for Scripted {
    fn detect(&self, rgb: &RgbImage, conf_threshold: f32) -> anyhow::Result<Vec<Detection>> {
        match self.by_width.get(&rgb.width()) {
            None => Ok(vec![]),
            Some(Reply::Fail(msg)) => anyhow::bail!("{}", msg),
            Some(Reply::Boxes(d)) => Ok(d.iter().filter(|d| d.confidence >= conf_threshold).cloned().collect()),
        }
    }
}

const CATEGORIES: [&str; 3] = ["apple", "rice", "kimchi"];

fn det(class_id: i32, confidence: f32, b: [f32; 4]) -> Detection {
    Detection { class_id, confidence, bbox: BBox::from(b) }
}

fn engine(detector: impl Detector + 'static) -> Engine {
    let table = NutritionTable::from_json(
        r#"{
            "apple": {"calories_per_100g": 52, "protein_per_100g": 0.3, "fat_per_100g": 0.2,
                      "carbs_per_100g": 14, "fiber_per_100g": 2.4, "sugar_per_100g": 10.4},
            "rice": {"calories_per_100g": 130, "protein_per_100g": 2.7, "fat_per_100g": 0.3,
                     "carbs_per_100g": 28.2, "fiber_per_100g": 0.4, "sugar_per_100g": 0.1}
        }"#,
    )
    .unwrap();
    Engine::new(
        Box::new(detector),
        CATEGORIES.iter().map(|s| s.to_string()).collect(),
        table,
        PortionModel::default(),
        EngineConfig::default(),
    )
    .unwrap()
}

fn plate() -> RgbImage {
    RgbImage::from_pixel(1000, 1000, image::Rgb([240, 240, 235]))
}

fn assert_totals_consistent(out: &nutriscan_proto::AnalysisOutcome) {
    assert_eq!(out.items_count, out.detections.len());
    let sum: Nutrition = out.detections.iter().map(|d| d.nutrition).sum();
    assert_eq!(out.total_nutrition, Some(sum.round1()));
}

#[test]
fn test_single_apple_quarter_of_image() {
    let e = engine(Scripted::default().on(1000, vec![det(0, 0.92, [250.0, 250.0, 750.0, 750.0])]));
    let out = e.analyze_image(&plate());

    assert!(out.success);
    assert_eq!(out.items_count, 1);
    let item = &out.detections[0];
    assert_eq!(item.food, "apple");
    assert_eq!(item.portion_g, 90);
    assert_eq!(item.nutrition.calories, 46.8);
    assert_eq!(item.confidence, 0.92);
    assert_eq!(item.bbox, [250.0, 250.0, 750.0, 750.0]);
    assert_eq!(out.total_nutrition.unwrap().calories, 46.8);
    assert_eq!(out.image_dimensions, Some(ImageDimensions { width: 1000, height: 1000 }));
    assert_totals_consistent(&out);
}

#[test]
fn test_nothing_detected() {
    let out = engine(Scripted::default()).analyze_image(&plate());
    assert!(out.success);
    assert_eq!(out.items_count, 0);
    assert!(out.detections.is_empty());
    assert_eq!(out.total_nutrition, Some(Nutrition::zero()));
    assert_eq!(out.message.as_deref(), Some(NO_ITEMS_MESSAGE));
}

#[test]
fn test_same_item_from_two_crops_merges() {
    // full image sees [200,200,500,500]; the 0.8 crop (offset 100) sees [200,300,500,600] -> iou 0.5
    let e = engine(
        Scripted::default()
            .on(1000, vec![det(1, 0.6, [200.0, 200.0, 500.0, 500.0])])
            .on(800, vec![det(1, 0.85, [100.0, 200.0, 400.0, 500.0])]),
    );
    let out = e.analyze_image(&plate());

    assert!(out.success);
    assert_eq!(out.items_count, 1);
    let item = &out.detections[0];
    assert_eq!(item.food, "rice");
    assert_eq!(item.confidence, 0.85);
    assert_eq!(item.bbox, [200.0, 200.0, 500.0, 600.0]);
    // 300x400 of 1000x1000 -> 200 * 0.12 * 1.8 = 43.2 -> clamped
    assert_eq!(item.portion_g, 80);
    assert_totals_consistent(&out);
}

#[test]
fn test_different_foods_same_spot_stay_separate() {
    let e = engine(Scripted::default().on(
        1000,
        vec![det(0, 0.7, [100.0, 100.0, 400.0, 400.0]), det(1, 0.7, [100.0, 100.0, 400.0, 400.0])],
    ));
    let out = e.analyze_image(&plate());
    let foods: Vec<&str> = out.detections.iter().map(|d| d.food.as_str()).collect();
    assert_eq!(foods, vec!["apple", "rice"]);
}

#[test]
fn test_partial_detector_failure_still_reports() {
    let e = engine(
        Scripted::default()
            .on(1000, vec![det(0, 0.9, [0.0, 0.0, 600.0, 600.0])])
            .fail(900, "accelerator reset")
            .on(800, vec![det(1, 0.7, [500.0, 500.0, 800.0, 800.0])])
            .fail(700, "accelerator reset"),
    );
    let out = e.analyze_image(&plate());

    assert!(out.success);
    assert_eq!(out.items_count, 2);
    assert_eq!(out.warnings.len(), 2);
    assert!(out.warnings.iter().all(|w| w.contains("accelerator reset")));
    // rice box translated by the 0.8 crop offset
    assert_eq!(out.detections[1].bbox, [600.0, 600.0, 900.0, 900.0]);
    assert_totals_consistent(&out);
}

#[test]
fn test_every_crop_failing_is_empty_not_error() {
    let e = engine(
        Scripted::default()
            .fail(1000, "boom")
            .fail(900, "boom")
            .fail(800, "boom")
            .fail(700, "boom"),
    );
    let out = e.analyze_image(&plate());
    assert!(out.success);
    assert_eq!(out.items_count, 0);
    assert_eq!(out.warnings.len(), 4);
    assert_eq!(out.message.as_deref(), Some(NO_ITEMS_MESSAGE));
}

#[test]
fn test_uncurated_food_reported_with_zero_nutrition() {
    let e = engine(
        Scripted::default()
            .on(1000, vec![det(2, 0.66, [0.0, 0.0, 500.0, 500.0]), det(0, 0.8, [600.0, 600.0, 900.0, 900.0])]),
    );
    let out = e.analyze_image(&plate());
    assert_eq!(out.items_count, 2);
    let kimchi = out.detections.iter().find(|d| d.food == "kimchi").unwrap();
    assert_eq!(kimchi.nutrition, Nutrition::zero());
    assert_eq!(kimchi.portion_g, 90);
    assert_totals_consistent(&out);
}

#[test]
fn test_class_out_of_range_is_failure() {
    let e = engine(Scripted::default().on(1000, vec![det(7, 0.9, [0.0, 0.0, 10.0, 10.0])]));
    let out = e.analyze_image(&plate());
    let v = serde_json::to_value(&out).unwrap();
    assert_eq!(v["total_nutrition"], serde_json::json!({}));

    assert!(!out.success);
    assert_eq!(out.items_count, 0);
    assert!(out.detections.is_empty());
    assert!(out.total_nutrition.is_none());
    assert!(out.error.unwrap().starts_with("Analysis failed:"));
}

#[test]
fn test_below_threshold_ignored() {
    let e = engine(Scripted::default().on(1000, vec![det(0, 0.1, [0.0, 0.0, 500.0, 500.0])]));
    let out = e.analyze_image(&plate());
    assert_eq!(out.items_count, 0);
}

#[test]
fn test_many_items_totals() {
    let dets = vec![
        det(0, 0.91, [0.0, 0.0, 333.0, 333.0]),
        det(1, 0.83, [400.0, 0.0, 777.0, 310.0]),
        det(0, 0.55, [0.0, 500.0, 210.0, 990.0]),
        det(1, 0.47, [500.0, 500.0, 1000.0, 1000.0]),
    ];
    let out = engine(Scripted::default().on(1000, dets)).analyze_image(&plate());
    assert_eq!(out.items_count, 4);
    for d in &out.detections {
        assert!((80..=600).contains(&d.portion_g));
    }
    let conf: Vec<f64> = out.detections.iter().map(|d| d.confidence).collect();
    assert_eq!(conf, vec![0.91, 0.83, 0.55, 0.47]);
    assert_totals_consistent(&out);
}

#[test]
fn test_encoded_png_bytes() {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(plate()).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();

    let e = engine(Scripted::default().on(1000, vec![det(0, 0.92, [250.0, 250.0, 750.0, 750.0])]));
    let out = e.analyze(&buf);
    assert!(out.success);
    assert_eq!(out.detections[0].nutrition.calories, 46.8);
}

#[test]
fn test_replay_detector_end_to_end() {
    let replay = ReplayDetector::from_json(
        r#"{"crops": [
            {"width": 1000, "height": 1000, "detections": [{"class_id": 0, "confidence": 0.9, "bbox": [250, 250, 750, 750]}]},
            {"width": 900, "height": 900, "error": "timeout"}
        ]}"#,
    )
    .unwrap();
    let out = engine(replay).analyze_image(&plate());
    assert!(out.success);
    assert_eq!(out.items_count, 1);
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn test_concurrent_analyses_agree() {
    let e = engine(
        Scripted::default()
            .on(1000, vec![det(0, 0.6, [200.0, 200.0, 500.0, 500.0])])
            .on(800, vec![det(0, 0.85, [100.0, 200.0, 400.0, 500.0])]),
    );
    let img = plate();
    let expected = e.analyze_image(&img);

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| e.analyze_image(&img))).collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}
