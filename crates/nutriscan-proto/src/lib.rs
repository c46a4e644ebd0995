pub mod outcome;

pub use outcome::{round1, round3, AnalysisOutcome, DetectionResult, ImageDimensions, Nutrition, NO_ITEMS_MESSAGE};
