//! Nutrition record
//!
//! The single output of a scan session. Created once per scan and replaced
//! wholesale on recalculation.

use serde::{Deserialize, Serialize};

use super::{AlternativeCandidate, IngredientRow, NutrientSet};
use crate::nutrition::converter::Quantity;
use crate::nutrition::volume::VolumeEstimate;

/// Title given to records with no usable identification
pub const UNKNOWN_PRODUCT_TITLE: &str = "Unknown product";

/// Capture mode, which fixes the recognition path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Barcode,
    Label,
    GenericFood,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Barcode => "barcode",
            ScanMode::Label => "label",
            ScanMode::GenericFood => "generic_food",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "barcode" | "ean" | "upc" => Some(ScanMode::Barcode),
            "label" | "nutrition_label" => Some(ScanMode::Label),
            "generic_food" | "generic" | "food" | "meal" => Some(ScanMode::GenericFood),
            _ => None,
        }
    }
}

/// Where the record's values came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Recognition stages that produced evidence, in run order
    pub stages_run: Vec<String>,
    /// Stages whose call failed or timed out
    pub stages_failed: Vec<String>,
    pub barcode_validated: bool,
    pub product_db_hit: bool,
    pub catalog_fill: bool,
    pub language_normalized: bool,
    pub unknown_product: bool,
    pub water_override: bool,
    pub alternatives_fallback_used: bool,
    pub user_overrides: bool,
}

/// Structured, internally consistent nutrition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub scan_id: String,
    pub mode: ScanMode,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub barcode: Option<String>,
    pub per_100g: NutrientSet,
    pub per_serving: NutrientSet,
    pub per_package: NutrientSet,
    pub serving_size: Option<Quantity>,
    pub serving_label: Option<String>,
    pub servings_per_package: Option<f64>,
    pub net_quantity: Option<Quantity>,
    /// Whole-kcal total the ingredient breakdown sums to
    pub energy_kcal_total: Option<f64>,
    pub ingredients: Vec<IngredientRow>,
    pub alternatives: Vec<AlternativeCandidate>,
    pub beverage: Option<VolumeEstimate>,
    /// 0..=10
    pub health_score: Option<f64>,
    pub provenance: Provenance,
    pub created_at: String,
}

impl NutritionRecord {
    /// Empty record with nothing known
    pub fn new(scan_id: impl Into<String>, mode: ScanMode, title: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
            mode,
            title: title.into(),
            brand: None,
            category: None,
            icon: None,
            barcode: None,
            per_100g: NutrientSet::default(),
            per_serving: NutrientSet::default(),
            per_package: NutrientSet::default(),
            serving_size: None,
            serving_label: None,
            servings_per_package: None,
            net_quantity: None,
            energy_kcal_total: None,
            ingredients: Vec::new(),
            alternatives: Vec::new(),
            beverage: None,
            health_score: None,
            provenance: Provenance::default(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Explicit "unknown product" record, optionally carrying a validated barcode
    pub fn unknown(scan_id: impl Into<String>, mode: ScanMode, barcode: Option<String>) -> Self {
        let mut record = Self::new(scan_id, mode, UNKNOWN_PRODUCT_TITLE);
        record.provenance.barcode_validated = barcode.is_some();
        record.barcode = barcode;
        record.provenance.unknown_product = true;
        record
    }

    /// Energy the record is displayed with: package, then serving
    pub fn display_energy_kcal(&self) -> Option<f64> {
        self.per_package.energy_kcal.or(self.per_serving.energy_kcal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_parsing() {
        assert_eq!(ScanMode::from_str("Barcode"), Some(ScanMode::Barcode));
        assert_eq!(ScanMode::from_str("label"), Some(ScanMode::Label));
        assert_eq!(ScanMode::from_str("food"), Some(ScanMode::GenericFood));
        assert_eq!(ScanMode::from_str("video"), None);
        assert_eq!(ScanMode::GenericFood.as_str(), "generic_food");
    }

    #[test]
    fn test_unknown_record() {
        let record = NutritionRecord::unknown("s1", ScanMode::Barcode, Some("4006381333931".into()));
        assert_eq!(record.title, UNKNOWN_PRODUCT_TITLE);
        assert!(record.provenance.unknown_product);
        assert!(record.provenance.barcode_validated);
        assert_eq!(record.energy_kcal_total, None);
        assert!(record.per_100g.is_empty());
    }
}
