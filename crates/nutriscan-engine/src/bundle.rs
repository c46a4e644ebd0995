use anyhow::{Context, Result};
use nutriscan_nutrition::NutritionTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the model artifacts live. File names are relative to `dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_labels_file")]
    pub labels_file: String,
    #[serde(default = "default_nutrition_file")]
    pub nutrition_file: String,
    #[serde(default = "default_model_info_file")]
    pub model_info_file: String,
}

fn default_model_file() -> String { "best.tflite".into() }
fn default_labels_file() -> String { "data.yaml".into() }
fn default_nutrition_file() -> String { "nutrition_mapping.json".into() }
fn default_model_info_file() -> String { "model_info.json".into() }

impl ModelsConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            model_file: default_model_file(),
            labels_file: default_labels_file(),
            nutrition_file: default_nutrition_file(),
            model_info_file: default_model_info_file(),
        }
    }

    pub fn model_path(&self) -> PathBuf { self.dir.join(&self.model_file) }
    pub fn labels_path(&self) -> PathBuf { self.dir.join(&self.labels_file) }
    pub fn nutrition_path(&self) -> PathBuf { self.dir.join(&self.nutrition_file) }
    pub fn model_info_path(&self) -> PathBuf { self.dir.join(&self.model_info_file) }
}

/// Optional metadata shipped next to the weights.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub num_classes: Option<usize>,
    pub input_size: Option<u32>,
}

impl ModelInfo {
    /// True unless the recorded square input size differs from `w` x `h`.
    pub fn input_matches(&self, w: u32, h: u32) -> bool {
        self.input_size.map_or(true, |s| s == w && s == h)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelNames {
    List(Vec<String>),
    Indexed(BTreeMap<usize, String>),
}

#[derive(Debug, Deserialize)]
struct LabelsFile {
    names: LabelNames,
}

/// Category names by class id, from a YOLO dataset file's `names` key.
pub fn parse_labels(yaml: &str) -> Result<Vec<String>> {
    let f: LabelsFile = serde_yaml::from_str(yaml).context("parse labels yaml")?;
    match f.names {
        LabelNames::List(v) => Ok(v),
        LabelNames::Indexed(m) => {
            // ids must be 0..n with no gaps
            for (expect, id) in m.keys().enumerate() {
                anyhow::ensure!(*id == expect, "labels: class id {} missing", expect);
            }
            Ok(m.into_values().collect())
        }
    }
}

/// Everything the engine needs besides the detector itself.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub categories: Vec<String>,
    pub nutrition: NutritionTable,
    pub info: ModelInfo,
}

impl ModelBundle {
    /// Check that all required files exist, reporting every missing one at once.
    pub fn validate(cfg: &ModelsConfig, require_model: bool) -> Result<()> {
        let mut required = vec![
            (cfg.nutrition_path(), "nutrition_mapping"),
            (cfg.labels_path(), "labels"),
            (cfg.model_info_path(), "model_info"),
        ];
        if require_model {
            required.insert(0, (cfg.model_path(), "model"));
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|(p, _)| !p.exists())
            .map(|(p, kind)| format!("{} ({})", file_name(p), kind))
            .collect();
        anyhow::ensure!(missing.is_empty(), "missing model files in {}: {}", cfg.dir.display(), missing.join(", "));
        info!("bundle: all model files present in {}", cfg.dir.display());
        Ok(())
    }

    pub fn load(cfg: &ModelsConfig, require_model: bool) -> Result<Self> {
        Self::validate(cfg, require_model)?;

        let labels_path = cfg.labels_path();
        let yaml = std::fs::read_to_string(&labels_path)
            .with_context(|| format!("read labels {}", labels_path.display()))?;
        let categories = parse_labels(&yaml)?;
        anyhow::ensure!(!categories.is_empty(), "labels file {} has no names", labels_path.display());
        info!("bundle: loaded {} food categories", categories.len());

        let nutrition = NutritionTable::load(&cfg.nutrition_path())?;

        let info_path = cfg.model_info_path();
        let s = std::fs::read_to_string(&info_path)
            .with_context(|| format!("read model info {}", info_path.display()))?;
        let info: ModelInfo = serde_json::from_str(&s).context("parse model info json")?;
        if let Some(n) = info.num_classes {
            if n != categories.len() {
                warn!("bundle: model_info num_classes={} but labels list {} names", n, categories.len());
            }
        }
        info!(
            "bundle: model {} version {}",
            info.name.as_deref().unwrap_or("?"),
            info.version.as_deref().unwrap_or("?")
        );

        Ok(Self { categories, nutrition, info })
    }
}

fn file_name(p: &Path) -> String {
    p.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| p.display().to_string())
}
