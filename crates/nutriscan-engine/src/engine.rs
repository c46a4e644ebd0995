use anyhow::Result;
use image::RgbImage;
use nutriscan_nutrition::{NutritionTable, PortionModel};
use nutriscan_proto::{AnalysisOutcome, ImageDimensions};
use nutriscan_vision::{cluster_detections, generate_crops, sweep, Detection, Detector, DEFAULT_CLUSTER_IOU, DEFAULT_CROP_SCALES};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::aggregate::aggregate;
use crate::{EngineError, ModelBundle};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub conf_threshold: f32,
    /// Center-crop scales, tried in this order after the full image.
    pub crop_scales: Vec<f64>,
    pub cluster_iou_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            crop_scales: DEFAULT_CROP_SCALES.to_vec(),
            cluster_iou_threshold: DEFAULT_CLUSTER_IOU,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.conf_threshold),
            "conf_threshold must be within [0, 1], got {}",
            self.conf_threshold
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.cluster_iou_threshold),
            "cluster_iou_threshold must be within [0, 1], got {}",
            self.cluster_iou_threshold
        );
        for s in &self.crop_scales {
            anyhow::ensure!(*s > 0.0 && *s <= 1.0, "crop scale {} outside (0, 1]", s);
        }
        Ok(())
    }
}

/// Detection fusion and nutrition aggregation over a single image.
///
/// Holds its collaborators for the lifetime of the process. `analyze` takes
/// `&self` and keeps all per-request state on the stack, so one engine can
/// serve concurrent requests as long as the detector can.
pub struct Engine {
    detector: Box<dyn Detector>,
    categories: Vec<String>,
    nutrition: NutritionTable,
    portion: PortionModel,
    cfg: EngineConfig,
}

impl Engine {
    pub fn new(
        detector: Box<dyn Detector>,
        categories: Vec<String>,
        nutrition: NutritionTable,
        portion: PortionModel,
        cfg: EngineConfig,
    ) -> Result<Self> {
        cfg.validate()?;
        portion.validate()?;
        anyhow::ensure!(!categories.is_empty(), "engine needs at least one food category");
        info!(
            "engine: {} categories, {} curated, crops=full+{:?}, conf>={}, merge iou>{}",
            categories.len(),
            nutrition.len(),
            cfg.crop_scales,
            cfg.conf_threshold,
            cfg.cluster_iou_threshold
        );
        Ok(Self { detector, categories, nutrition, portion, cfg })
    }

    pub fn from_bundle(detector: Box<dyn Detector>, bundle: ModelBundle, portion: PortionModel, cfg: EngineConfig) -> Result<Self> {
        Self::new(detector, bundle.categories, bundle.nutrition, portion, cfg)
    }

    /// Analyze encoded image bytes. Never fails: errors become a `success: false` outcome.
    pub fn analyze(&self, image_bytes: &[u8]) -> AnalysisOutcome {
        let res = image::load_from_memory(image_bytes)
            .map_err(EngineError::from)
            .and_then(|img| self.try_analyze(&img.to_rgb8()));
        Self::boundary(res)
    }

    /// Analyze an already decoded image. Never fails.
    pub fn analyze_image(&self, img: &RgbImage) -> AnalysisOutcome {
        Self::boundary(self.try_analyze(img))
    }

    fn boundary(res: Result<AnalysisOutcome, EngineError>) -> AnalysisOutcome {
        match res {
            Ok(out) => out,
            Err(e) => {
                error!("engine: analysis failed: {}", e);
                AnalysisOutcome::failure(format!("Analysis failed: {}", e))
            }
        }
    }

    /// The pipeline without the boundary: crops, detector sweep, clustering, aggregation.
    pub fn try_analyze(&self, img: &RgbImage) -> Result<AnalysisOutcome, EngineError> {
        let dims = ImageDimensions { width: img.width(), height: img.height() };
        let crops = generate_crops(dims.width, dims.height, &self.cfg.crop_scales);
        let sw = sweep(self.detector.as_ref(), img, &crops, self.cfg.conf_threshold);

        if sw.all_failed() {
            warn!("engine: detector failed on all {} crops", crops.len());
        }
        if sw.detections.is_empty() {
            debug!("engine: no detections in {}x{}", dims.width, dims.height);
            return Ok(AnalysisOutcome::empty(dims, sw.failures));
        }

        check_detections(&sw.detections)?;
        let clusters = cluster_detections(&sw.detections, self.cfg.cluster_iou_threshold);
        debug!("engine: {} raw detections -> {} items", sw.detections.len(), clusters.len());

        let mut out = aggregate(&clusters, &self.categories, &self.nutrition, &self.portion, dims)?;
        out.warnings = sw.failures;
        Ok(out)
    }
}

fn check_detections(dets: &[Detection]) -> Result<(), EngineError> {
    for (index, d) in dets.iter().enumerate() {
        if let Some(reason) = d.malformed() {
            return Err(EngineError::MalformedDetection { index, class_id: d.class_id, reason });
        }
    }
    Ok(())
}
