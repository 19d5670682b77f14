//! Ingredient breakdown rows

use serde::{Deserialize, Serialize};

/// Lexical category of an ingredient, used only by reconciliation heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngredientCategory {
    Salt,
    Starch,
    Seasoning,
    Fat,
    Sugar,
    Veg,
    #[default]
    Other,
}

impl IngredientCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngredientCategory::Salt => "salt",
            IngredientCategory::Starch => "starch",
            IngredientCategory::Seasoning => "seasoning",
            IngredientCategory::Fat => "fat",
            IngredientCategory::Sugar => "sugar",
            IngredientCategory::Veg => "veg",
            IngredientCategory::Other => "other",
        }
    }
}

/// One named ingredient in a record's breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRow {
    /// Stable position in the breakdown
    pub index: usize,
    pub name: String,
    pub estimated_grams: Option<f64>,
    pub kcal_per_100g: Option<f64>,
    /// Whole kcal; always set after reconciliation
    pub estimated_kcal: Option<i64>,
    /// True when the kcal value came from a heuristic rather than evidence
    pub assumed: bool,
    pub category: IngredientCategory,
}

impl IngredientRow {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            estimated_grams: None,
            kcal_per_100g: None,
            estimated_kcal: None,
            assumed: false,
            category: IngredientCategory::Other,
        }
    }

    pub fn with_grams(mut self, grams: f64, kcal_per_100g: Option<f64>) -> Self {
        self.estimated_grams = Some(grams);
        self.kcal_per_100g = kcal_per_100g;
        self
    }

    pub fn with_kcal(mut self, kcal: i64) -> Self {
        self.estimated_kcal = Some(kcal);
        self
    }
}

/// Sum of reconciled kcal values; `None` rows count as zero
pub fn total_kcal(rows: &[IngredientRow]) -> i64 {
    rows.iter().filter_map(|r| r.estimated_kcal).fold(0, i64::saturating_add)
}
