use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use nutriscan_engine::{Engine, EngineConfig, ModelBundle, ModelsConfig};
use nutriscan_nutrition::{doctor as nutrition_doctor, PortionModel};
use nutriscan_proto::AnalysisOutcome;
use nutriscan_vision::{Detector, ReplayDetector};

#[cfg(feature = "vision-tflite")]
use nutriscan_vision::tflite::{TfliteConfig, TfliteDetector};

#[derive(Debug, Parser)]
#[command(name = "nutriscan", version, about = "nutriscan - food photo detection and nutrition totals")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config and model bundle.
    Doctor,
    /// Analyze one or more images and print one JSON result per image.
    Analyze {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    Vision { #[command(subcommand)] cmd: VisionCmd },
}

#[derive(Debug, Subcommand)]
enum VisionCmd { Inspect }

#[derive(Debug, serde::Deserialize)]
struct Config {
    models: ModelsConfig,
    detector: DetectorCfg,
    #[serde(default)]
    engine: EngineCfg,
    #[serde(default)]
    portion: PortionModel,
}

#[derive(Debug, serde::Deserialize)]
struct DetectorCfg {
    backend: String,
    #[serde(default = "default_conf_threshold")]
    conf_threshold: f32,
    #[serde(default)]
    use_coral: bool,
    #[serde(default = "default_img_size")]
    img_w: u32,
    #[serde(default = "default_img_size")]
    img_h: u32,
    #[serde(default = "default_output_layout")]
    output_layout: String,
    #[serde(default = "default_nms_iou")]
    nms_iou_threshold: f64,
    #[serde(default = "default_max_detections")]
    max_detections: usize,
    num_threads: Option<i32>,
    replay_file: Option<String>,
}

fn default_conf_threshold() -> f32 { 0.25 }
fn default_img_size() -> u32 { 640 }
fn default_output_layout() -> String { "ultralytics".into() }
fn default_nms_iou() -> f64 { 0.45 }
fn default_max_detections() -> usize { 100 }

/// `[engine]`: the engine's own keys plus the CLI-side timeout.
#[derive(Debug, serde::Deserialize)]
struct EngineCfg {
    #[serde(flatten)]
    core: EngineConfig,
    #[serde(default = "default_timeout_s")]
    timeout_s: u64,
}

fn default_timeout_s() -> u64 { 30 }

impl Default for EngineCfg {
    fn default() -> Self {
        Self { core: EngineConfig::default(), timeout_s: default_timeout_s() }
    }
}

impl Config {
    fn engine_config(&self) -> EngineConfig {
        // the threshold is configured with the detector
        EngineConfig { conf_threshold: self.detector.conf_threshold, ..self.engine.core.clone() }
    }

    fn needs_model_file(&self) -> bool {
        self.detector.backend == "tflite"
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg).await?,
        Command::Analyze { images, pretty } => analyze(&cfg, images, pretty).await?,
        Command::Vision { cmd } => vision_cmd(&cfg, cmd).await?,
    }
    Ok(())
}

async fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    cfg.engine_config().validate()?;
    anyhow::ensure!(cfg.engine.timeout_s > 0, "engine.timeout_s must be > 0");
    cfg.portion.validate()?;

    let bundle = ModelBundle::load(&cfg.models, cfg.needs_model_file())?;
    nutrition_doctor::check_table(&bundle.nutrition)?;

    let missing = nutrition_doctor::uncurated(&bundle.categories, &bundle.nutrition);
    if missing.is_empty() {
        info!("doctor: all {} categories have nutrition entries", bundle.categories.len());
    } else {
        warn!(
            "doctor: {} of {} categories have no nutrition entry (reported as zeros): {}",
            missing.len(),
            bundle.categories.len(),
            missing.join(", ")
        );
    }

    check_input_size(cfg, &bundle);
    init_detector(cfg, bundle.categories.len())?;

    info!("doctor: OK");
    Ok(())
}

async fn analyze(cfg: &Config, images: Vec<PathBuf>, pretty: bool) -> Result<()> {
    let engine = Arc::new(build_engine(cfg)?);
    let timeout = Duration::from_secs(cfg.engine.timeout_s.max(1));

    let tasks: Vec<_> = images
        .into_iter()
        .map(|path| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let out = analyze_one(engine, &path, timeout).await;
                (path, out)
            })
        })
        .collect();

    for t in tasks {
        let (path, out) = t.await.context("analysis task")?;
        info!(
            "analyze: {} -> success={} items={}",
            path.display(),
            out.success,
            out.items_count
        );
        let json = if pretty { serde_json::to_string_pretty(&out)? } else { serde_json::to_string(&out)? };
        println!("{}", json);
    }
    Ok(())
}

/// Read and analyze one image on the blocking pool. Always yields an outcome.
async fn analyze_one(engine: Arc<Engine>, path: &Path, timeout: Duration) -> AnalysisOutcome {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => return AnalysisOutcome::failure(format!("Analysis failed: read {}: {}", path.display(), e)),
    };

    let job = tokio::task::spawn_blocking(move || engine.analyze(&bytes));
    match tokio::time::timeout(timeout, job).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => AnalysisOutcome::failure(format!("Analysis failed: worker aborted: {}", e)),
        Err(_) => {
            warn!("analyze: {} timed out after {:?}", path.display(), timeout);
            AnalysisOutcome::failure(format!("Analysis failed: timed out after {}s", timeout.as_secs()))
        }
    }
}

fn build_engine(cfg: &Config) -> Result<Engine> {
    let bundle = ModelBundle::load(&cfg.models, cfg.needs_model_file())?;
    check_input_size(cfg, &bundle);
    let detector = init_detector(cfg, bundle.categories.len())?;
    Engine::from_bundle(detector, bundle, cfg.portion.clone(), cfg.engine_config())
}

fn check_input_size(cfg: &Config, bundle: &ModelBundle) {
    let d = &cfg.detector;
    if cfg.needs_model_file() && !bundle.info.input_matches(d.img_w, d.img_h) {
        warn!(
            "vision: model_info input_size={:?} but detector resizes to {}x{}",
            bundle.info.input_size, d.img_w, d.img_h
        );
    }
}

async fn vision_cmd(cfg: &Config, cmd: VisionCmd) -> Result<()> {
    match cmd {
        VisionCmd::Inspect => {
            #[cfg(not(feature = "vision-tflite"))]
            {
                let _ = cfg;
                anyhow::bail!("vision backend not available; build with --features vision-tflite");
            }

            #[cfg(feature = "vision-tflite")]
            {
                let bundle = ModelBundle::load(&cfg.models, true)?;
                let det = TfliteDetector::new(tflite_config(cfg, bundle.categories.len()))?;
                print!("{}", det.inspect()?);
                Ok(())
            }
        }
    }
}

fn init_detector(cfg: &Config, num_classes: usize) -> Result<Box<dyn Detector>> {
    let d = &cfg.detector;
    match d.backend.as_str() {
        "replay" => {
            let path = d.replay_file.as_deref().context("detector.replay_file missing for replay backend")?;
            Ok(Box::new(ReplayDetector::load(Path::new(path))?))
        }
        "tflite" => {
            #[cfg(not(feature = "vision-tflite"))]
            {
                let _ = num_classes;
                anyhow::bail!("detector.backend=tflite but binary not built with --features vision-tflite");
            }

            #[cfg(feature = "vision-tflite")]
            {
                Ok(Box::new(TfliteDetector::new(tflite_config(cfg, num_classes))?))
            }
        }
        other => anyhow::bail!("unknown detector.backend: {}", other),
    }
}

#[cfg(feature = "vision-tflite")]
fn tflite_config(cfg: &Config, num_classes: usize) -> TfliteConfig {
    let d = &cfg.detector;
    TfliteConfig {
        model_path: cfg.models.model_path().to_string_lossy().into_owned(),
        use_coral: d.use_coral,
        img_w: d.img_w,
        img_h: d.img_h,
        num_classes,
        output_layout: d.output_layout.clone(),
        nms_iou_threshold: d.nms_iou_threshold,
        max_detections: d.max_detections,
        num_threads: d.num_threads.unwrap_or(2),
    }
}
