use anyhow::Result;

use crate::NutritionTable;

pub fn check_table(table: &NutritionTable) -> Result<()> {
    anyhow::ensure!(!table.is_empty(), "nutrition mapping is empty");
    for (name, facts) in table.iter() {
        for (field, v) in facts.as_nutrition().fields() {
            anyhow::ensure!(v.is_finite() && v >= 0.0, "nutrition[{}].{} invalid: {}", name, field, v);
        }
    }
    Ok(())
}

/// Categories the detector can emit that have no nutrition entry.
pub fn uncurated<'a>(categories: &'a [String], table: &NutritionTable) -> Vec<&'a str> {
    categories
        .iter()
        .filter(|c| !table.contains(c))
        .map(|c| c.as_str())
        .collect()
}
