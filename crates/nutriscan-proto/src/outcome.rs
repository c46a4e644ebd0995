use serde::{Deserialize, Serialize, Serializer};

pub const NO_ITEMS_MESSAGE: &str = "No food items detected";

/// Macro nutrients for a given mass of food.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64, // grams
    pub fat: f64,     // grams
    pub carbs: f64,   // grams
    pub fiber: f64,   // grams
    pub sugar: f64,   // grams
}

impl Nutrition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Round every field to one decimal place.
    pub fn round1(&self) -> Self {
        self.map(round1)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            calories: f(self.calories),
            protein: f(self.protein),
            fat: f(self.fat),
            carbs: f(self.carbs),
            fiber: f(self.fiber),
            sugar: f(self.sugar),
        }
    }

    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("calories", self.calories),
            ("protein", self.protein),
            ("fat", self.fat),
            ("carbs", self.carbs),
            ("fiber", self.fiber),
            ("sugar", self.sugar),
        ]
    }
}

impl std::ops::Add for Nutrition {
    type Output = Nutrition;

    fn add(self, o: Nutrition) -> Nutrition {
        Nutrition {
            calories: self.calories + o.calories,
            protein: self.protein + o.protein,
            fat: self.fat + o.fat,
            carbs: self.carbs + o.carbs,
            fiber: self.fiber + o.fiber,
            sugar: self.sugar + o.sugar,
        }
    }
}

impl std::ops::AddAssign for Nutrition {
    fn add_assign(&mut self, o: Nutrition) {
        *self = *self + o;
    }
}

impl std::iter::Sum for Nutrition {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Nutrition::zero(), |acc, n| acc + n)
    }
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub food: String,
    pub confidence: f64,
    pub portion_g: u32,
    /// [x1, y1, x2, y2] in original image pixels
    pub bbox: [f64; 4],
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub detections: Vec<DetectionResult>,
    // failures report `{}` here
    #[serde(serialize_with = "totals_or_empty")]
    pub total_nutrition: Option<Nutrition>,
    pub items_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dimensions: Option<ImageDimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisOutcome {
    /// Well-formed result for an image in which nothing was found.
    pub fn empty(dims: ImageDimensions, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            detections: vec![],
            total_nutrition: Some(Nutrition::zero()),
            items_count: 0,
            image_dimensions: Some(dims),
            message: Some(NO_ITEMS_MESSAGE.to_string()),
            warnings,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            detections: vec![],
            total_nutrition: None,
            items_count: 0,
            image_dimensions: None,
            message: None,
            warnings: vec![],
            error: Some(error.into()),
        }
    }
}

fn totals_or_empty<S: Serializer>(totals: &Option<Nutrition>, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    match totals {
        Some(n) => n.serialize(s),
        None => s.serialize_map(Some(0))?.end(),
    }
}
