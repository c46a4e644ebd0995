use anyhow::Result;
use serde::Deserialize;

/// Area-ratio portion heuristic: grams = base * (bbox_area / image_area) * scaling,
/// truncated and clamped to [min_g, max_g].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortionModel {
    pub base_g: f64,
    pub scaling: f64,
    pub min_g: u32,
    pub max_g: u32,
    /// Used when the image has no area.
    pub default_g: u32,
}

impl Default for PortionModel {
    fn default() -> Self {
        Self { base_g: 200.0, scaling: 1.8, min_g: 80, max_g: 600, default_g: 150 }
    }
}

impl PortionModel {
    /// Reject constants under which `estimate` could leave `[min_g, max_g]`.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.base_g > 0.0 && self.base_g.is_finite(), "portion.base_g must be > 0");
        anyhow::ensure!(self.scaling > 0.0 && self.scaling.is_finite(), "portion.scaling must be > 0");
        anyhow::ensure!(self.min_g <= self.max_g, "portion.min_g {} > portion.max_g {}", self.min_g, self.max_g);
        anyhow::ensure!(
            self.default_g >= self.min_g && self.default_g <= self.max_g,
            "portion.default_g {} outside {}..={}",
            self.default_g,
            self.min_g,
            self.max_g
        );
        Ok(())
    }

    pub fn estimate(&self, bbox_area: f64, image_area: f64) -> u32 {
        if image_area == 0.0 {
            return self.default_g;
        }
        let relative = bbox_area / image_area;
        let estimated = self.base_g * relative * self.scaling;
        // `as` saturates: negatives and NaN go to 0, huge values to u32::MAX
        let grams = estimated as u32;
        grams.min(self.max_g).max(self.min_g)
    }
}
