pub mod aggregate;
pub mod bundle;
pub mod engine;
pub mod error;

pub use bundle::{parse_labels, ModelBundle, ModelInfo, ModelsConfig};
pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
