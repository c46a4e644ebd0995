pub mod adapter;
pub mod bbox;
pub mod cluster;
pub mod crop;
pub mod detector;
mod nms;
pub mod replay;
#[cfg(feature = "vision-tflite")]
pub mod tflite;
mod ultralytics;

pub use adapter::{sweep, Sweep};
pub use bbox::BBox;
pub use cluster::{cluster_detections, Cluster, DEFAULT_CLUSTER_IOU};
pub use crop::{generate_crops, Crop, DEFAULT_CROP_SCALES};
pub use detector::{Detection, Detector};
pub use nms::nms_filter;
pub use replay::ReplayDetector;
pub use ultralytics::postprocess_ultralytics;
