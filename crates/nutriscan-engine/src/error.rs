use thiserror::Error;

/// Internal invariant violations. Never escape [`crate::Engine::analyze`];
/// they become a `success: false` outcome.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("malformed detection #{index} (class {class_id}): {reason}")]
    MalformedDetection { index: usize, class_id: i32, reason: &'static str },
    #[error("class id {class_id} out of range (have {categories} categories)")]
    UnknownClass { class_id: i32, categories: usize },
}
