use anyhow::{Context, Result};
use image::RgbImage;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::{Detection, Detector};

/// Recorded detector output for one crop size.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayCrop {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// When set, calls for this crop size fail with this message.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFile {
    pub crops: Vec<ReplayCrop>,
}

/// Detector that answers from a JSON recording keyed by crop dimensions.
/// Crop sizes absent from the recording yield no detections.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    crops: Vec<ReplayCrop>,
}

impl ReplayDetector {
    pub fn new(crops: Vec<ReplayCrop>) -> Self {
        Self { crops }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let f: ReplayFile = serde_json::from_str(s).context("parse replay json")?;
        Ok(Self::new(f.crops))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read replay file {}", path.display()))?;
        let d = Self::from_json(&s)?;
        info!("vision: replay detector with {} recorded crops from {}", d.crops.len(), path.display());
        Ok(d)
    }
}

impl Detector for ReplayDetector {
    fn detect(&self, rgb: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>> {
        let Some(rec) = self.crops.iter().find(|c| c.width == rgb.width() && c.height == rgb.height()) else {
            return Ok(Vec::new());
        };
        if let Some(msg) = &rec.error {
            anyhow::bail!("{}", msg);
        }
        Ok(rec.detections.iter().filter(|d| d.confidence >= conf_threshold).cloned().collect())
    }
}
