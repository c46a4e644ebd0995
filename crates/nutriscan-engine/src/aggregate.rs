use nutriscan_nutrition::{NutritionTable, PortionModel};
use nutriscan_proto::{round3, AnalysisOutcome, DetectionResult, ImageDimensions, Nutrition};
use nutriscan_vision::Cluster;
use tracing::debug;

use crate::EngineError;

/// Turn finalized clusters into per-item results and image totals.
///
/// Totals add up the per-item values as reported and are rounded once at the end.
pub fn aggregate(
    clusters: &[Cluster],
    categories: &[String],
    table: &NutritionTable,
    portion: &PortionModel,
    dims: ImageDimensions,
) -> Result<AnalysisOutcome, EngineError> {
    let image_area = dims.width as f64 * dims.height as f64;
    let mut detections = Vec::with_capacity(clusters.len());
    let mut total = Nutrition::zero();

    for cl in clusters {
        let food = category(categories, cl.class_id)?;
        let portion_g = portion.estimate(cl.bbox.area(), image_area);
        let nutrition = table.nutrition_for(food, portion_g);
        total += nutrition;

        debug!("item: {} conf={:.3} members={} portion={}g kcal={}", food, cl.confidence, cl.members, portion_g, nutrition.calories);
        detections.push(DetectionResult {
            food: food.to_string(),
            confidence: round3(cl.confidence as f64),
            portion_g,
            bbox: cl.bbox.as_array(),
            nutrition,
        });
    }

    Ok(AnalysisOutcome {
        success: true,
        items_count: detections.len(),
        detections,
        total_nutrition: Some(total.round1()),
        image_dimensions: Some(dims),
        message: None,
        warnings: vec![],
        error: None,
    })
}

fn category(categories: &[String], class_id: i32) -> Result<&str, EngineError> {
    usize::try_from(class_id)
        .ok()
        .and_then(|i| categories.get(i))
        .map(|s| s.as_str())
        .ok_or(EngineError::UnknownClass { class_id, categories: categories.len() })
}
