//! Unit types and conversion constants
//!
//! Fixed conversion factors shared by every recognition path. All evidence is
//! brought into kcal / g / ml / mg before it reaches the reconciler.

use serde::{Deserialize, Serialize};

/// Canonical dimension of a measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityKind {
    /// Stored in grams
    Mass,
    /// Stored in milliliters
    Volume,
}

impl QuantityKind {
    pub fn canonical_unit(&self) -> &'static str {
        match self {
            QuantityKind::Mass => "g",
            QuantityKind::Volume => "ml",
        }
    }
}

/// Category of a measurement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCategory {
    /// Weight/mass units (g, oz, lb, kg)
    Weight,
    /// Volume units (ml, cl, l, fl oz, cup)
    Volume,
    /// Count/discrete units (each, piece, slice)
    Count,
    /// Anything we cannot convert on our own (scoop, handful)
    Custom,
}

// ============================================================================
// Energy and Mineral Constants
// ============================================================================

/// Kilojoules per kilocalorie
pub const KJ_PER_KCAL: f64 = 4.184;
/// Milligrams of sodium per gram of salt (label convention, salt = sodium x 2.5)
pub const SODIUM_MG_PER_SALT_G: f64 = 393.0;
/// Milligrams per gram
pub const MG_PER_G: f64 = 1000.0;

// ============================================================================
// Volume Conversion Constants (to milliliters)
// ============================================================================

/// Milliliters per teaspoon
pub const ML_PER_TSP: f64 = 4.92892;
/// Milliliters per tablespoon
pub const ML_PER_TBSP: f64 = 14.7868;
/// Milliliters per fluid ounce
pub const ML_PER_FL_OZ: f64 = 29.5735;
/// Milliliters per centiliter
pub const ML_PER_CL: f64 = 10.0;
/// Milliliters per deciliter
pub const ML_PER_DL: f64 = 100.0;
/// Milliliters per cup (US)
pub const ML_PER_CUP: f64 = 236.588;
/// Milliliters per pint (US)
pub const ML_PER_PINT: f64 = 473.176;
/// Milliliters per liter
pub const ML_PER_LITER: f64 = 1000.0;
/// Milliliters per gallon (US)
pub const ML_PER_GALLON: f64 = 3785.41;

// ============================================================================
// Weight Conversion Constants (to grams)
// ============================================================================

/// Grams per milligram
pub const G_PER_MG: f64 = 0.001;
/// Grams per kilogram
pub const G_PER_KG: f64 = 1000.0;
/// Grams per ounce
pub const G_PER_OZ: f64 = 28.3495;
/// Grams per pound
pub const G_PER_LB: f64 = 453.592;

// ============================================================================
// Unit Recognition
// ============================================================================

/// Get the conversion factor to grams for a weight unit
pub fn grams_per_unit(unit: &str) -> Option<f64> {
    let lower = unit.to_lowercase();

    match lower.trim() {
        "g" | "gr" | "gram" | "grams" | "gramm" | "grammes" => Some(1.0),
        "mg" | "milligram" | "milligrams" => Some(G_PER_MG),
        "kg" | "kilogram" | "kilograms" => Some(G_PER_KG),
        "oz" | "ounce" | "ounces" => Some(G_PER_OZ),
        "lb" | "lbs" | "pound" | "pounds" => Some(G_PER_LB),
        _ => None,
    }
}

/// Get the conversion factor to milliliters for a volume unit
pub fn ml_per_unit(unit: &str) -> Option<f64> {
    let lower = unit.to_lowercase();

    match lower.trim() {
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => Some(1.0),
        "cl" | "centiliter" | "centilitre" => Some(ML_PER_CL),
        "dl" | "deciliter" | "decilitre" => Some(ML_PER_DL),
        "l" | "liter" | "liters" | "litre" | "litres" | "ltr" => Some(ML_PER_LITER),
        "tsp" | "teaspoon" | "teaspoons" => Some(ML_PER_TSP),
        "tbsp" | "tablespoon" | "tablespoons" => Some(ML_PER_TBSP),
        "fl oz" | "fl. oz" | "fl.oz" | "floz" | "fluid ounce" | "fluid ounces" => {
            Some(ML_PER_FL_OZ)
        }
        "cup" | "cups" => Some(ML_PER_CUP),
        "pint" | "pints" => Some(ML_PER_PINT),
        "gallon" | "gallons" => Some(ML_PER_GALLON),
        _ => None,
    }
}

/// Determine the category of a unit string
pub fn categorize_unit(unit: &str) -> UnitCategory {
    let lower = unit.to_lowercase();
    let trimmed = lower.trim();

    if grams_per_unit(trimmed).is_some() {
        return UnitCategory::Weight;
    }

    if ml_per_unit(trimmed).is_some() {
        return UnitCategory::Volume;
    }

    match trimmed {
        "each" | "piece" | "pieces" | "item" | "items" | "count" | "unit" | "units" | "pcs" => {
            UnitCategory::Count
        }
        _ => UnitCategory::Custom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_weight_units() {
        assert_eq!(categorize_unit("g"), UnitCategory::Weight);
        assert_eq!(categorize_unit("oz"), UnitCategory::Weight);
        assert_eq!(categorize_unit("KG"), UnitCategory::Weight);
    }

    #[test]
    fn test_categorize_volume_units() {
        assert_eq!(categorize_unit("ml"), UnitCategory::Volume);
        assert_eq!(categorize_unit("cl"), UnitCategory::Volume);
        assert_eq!(categorize_unit("fl oz"), UnitCategory::Volume);
        assert_eq!(categorize_unit("L"), UnitCategory::Volume);
    }

    #[test]
    fn test_categorize_count_and_custom() {
        assert_eq!(categorize_unit("piece"), UnitCategory::Count);
        assert_eq!(categorize_unit("scoop"), UnitCategory::Custom);
    }

    #[test]
    fn test_fl_oz_is_not_ounce() {
        assert_eq!(ml_per_unit("fl oz"), Some(ML_PER_FL_OZ));
        assert_eq!(grams_per_unit("fl oz"), None);
        assert_eq!(grams_per_unit("oz"), Some(G_PER_OZ));
    }
}
