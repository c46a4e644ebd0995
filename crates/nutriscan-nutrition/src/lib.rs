pub mod doctor;
pub mod portion;
pub mod table;

pub use portion::PortionModel;
pub use table::{NutritionFacts, NutritionTable};
