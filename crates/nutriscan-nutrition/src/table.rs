use anyhow::{Context, Result};
use nutriscan_proto::Nutrition;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Per-100g reference values for one food category.
/// Missing keys in the mapping file read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NutritionFacts {
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub fat_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fiber_per_100g: f64,
    pub sugar_per_100g: f64,
}

impl NutritionFacts {
    pub fn as_nutrition(&self) -> Nutrition {
        Nutrition {
            calories: self.calories_per_100g,
            protein: self.protein_per_100g,
            fat: self.fat_per_100g,
            carbs: self.carbs_per_100g,
            fiber: self.fiber_per_100g,
            sugar: self.sugar_per_100g,
        }
    }

    /// Scale to `portion_g` without rounding.
    pub fn for_portion(&self, portion_g: u32) -> Nutrition {
        let g = portion_g as f64;
        self.as_nutrition().map(|per_100g| per_100g / 100.0 * g)
    }
}

/// Category name -> per-100g facts.
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    entries: HashMap<String, NutritionFacts>,
}

impl NutritionTable {
    pub fn from_json(s: &str) -> Result<Self> {
        let entries: HashMap<String, NutritionFacts> =
            serde_json::from_str(s).context("parse nutrition mapping json")?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read nutrition mapping {}", path.display()))?;
        let table = Self::from_json(&s)?;
        info!("nutrition: loaded {} items from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn get(&self, category: &str) -> Option<&NutritionFacts> {
        self.entries.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.entries.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NutritionFacts)> {
        self.entries.iter()
    }

    /// Unrounded nutrition for `portion_g` grams of `category`.
    /// Uncurated categories yield zeros.
    pub fn raw_for(&self, category: &str, portion_g: u32) -> Nutrition {
        self.get(category)
            .map(|f| f.for_portion(portion_g))
            .unwrap_or_default()
    }

    /// Nutrition for `portion_g` grams of `category`, each field rounded to one decimal.
    pub fn nutrition_for(&self, category: &str, portion_g: u32) -> Nutrition {
        self.raw_for(category, portion_g).round1()
    }
}
