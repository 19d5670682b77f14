//! Shared nutrition data structures
//!
//! Every field is optional: `None` means "no evidence", `Some(0.0)` means a
//! measured zero. Nothing in the crate turns one into the other except the
//! plain-water override.

use serde::{Deserialize, Serialize};

/// Normalized nutrient values (kcal / g / mg)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientSet {
    pub energy_kcal: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub calcium_mg: Option<f64>,
}

impl NutrientSet {
    /// All fields measured as zero
    pub fn zero() -> Self {
        Self {
            energy_kcal: Some(0.0),
            protein_g: Some(0.0),
            fat_g: Some(0.0),
            carbs_g: Some(0.0),
            sugar_g: Some(0.0),
            fiber_g: Some(0.0),
            sodium_mg: Some(0.0),
            calcium_mg: Some(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }

    /// True when any of energy/protein/fat/carbs is still unknown
    pub fn has_missing_macros(&self) -> bool {
        self.energy_kcal.is_none()
            || self.protein_g.is_none()
            || self.fat_g.is_none()
            || self.carbs_g.is_none()
    }

    fn values(&self) -> [Option<f64>; 8] {
        [
            self.energy_kcal,
            self.protein_g,
            self.fat_g,
            self.carbs_g,
            self.sugar_g,
            self.fiber_g,
            self.sodium_mg,
            self.calcium_mg,
        ]
    }

    /// Field-wise combination of two sets
    pub fn combine<F>(&self, other: &NutrientSet, f: F) -> NutrientSet
    where
        F: Fn(Option<f64>, Option<f64>) -> Option<f64>,
    {
        NutrientSet {
            energy_kcal: f(self.energy_kcal, other.energy_kcal),
            protein_g: f(self.protein_g, other.protein_g),
            fat_g: f(self.fat_g, other.fat_g),
            carbs_g: f(self.carbs_g, other.carbs_g),
            sugar_g: f(self.sugar_g, other.sugar_g),
            fiber_g: f(self.fiber_g, other.fiber_g),
            sodium_mg: f(self.sodium_mg, other.sodium_mg),
            calcium_mg: f(self.calcium_mg, other.calcium_mg),
        }
    }

    /// Fill still-null fields from `other`; populated fields are never overwritten
    pub fn merge_missing(&mut self, other: &NutrientSet) {
        *self = self.combine(other, |mine, theirs| mine.or(theirs));
    }

    /// Scale every known value; unknown values stay unknown
    pub fn scale(&self, multiplier: f64) -> NutrientSet {
        self.combine(&NutrientSet::default(), |v, _| v.map(|x| x * multiplier))
    }

    /// Drop non-finite and negative values
    pub fn sanitized(&self) -> NutrientSet {
        self.combine(&NutrientSet::default(), |v, _| v.filter(|x| x.is_finite() && *x >= 0.0))
    }
}

/// Nutrient values as read from a label, before unit normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNutrients {
    pub energy_kcal: Option<f64>,
    pub energy_kj: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub salt_g: Option<f64>,
    pub calcium_mg: Option<f64>,
}

impl RawNutrients {
    pub fn is_empty(&self) -> bool {
        [
            self.energy_kcal,
            self.energy_kj,
            self.protein_g,
            self.fat_g,
            self.carbs_g,
            self.sugar_g,
            self.fiber_g,
            self.sodium_mg,
            self.salt_g,
            self.calcium_mg,
        ]
        .iter()
        .all(Option::is_none)
    }

    pub fn merge_missing(&mut self, other: &RawNutrients) {
        self.energy_kcal = self.energy_kcal.or(other.energy_kcal);
        self.energy_kj = self.energy_kj.or(other.energy_kj);
        self.protein_g = self.protein_g.or(other.protein_g);
        self.fat_g = self.fat_g.or(other.fat_g);
        self.carbs_g = self.carbs_g.or(other.carbs_g);
        self.sugar_g = self.sugar_g.or(other.sugar_g);
        self.fiber_g = self.fiber_g.or(other.fiber_g);
        self.sodium_mg = self.sodium_mg.or(other.sodium_mg);
        self.salt_g = self.salt_g.or(other.salt_g);
        self.calcium_mg = self.calcium_mg.or(other.calcium_mg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut a = NutrientSet {
            energy_kcal: Some(100.0),
            fat_g: Some(0.0),
            ..Default::default()
        };
        let b = NutrientSet {
            energy_kcal: Some(999.0),
            fat_g: Some(5.0),
            protein_g: Some(3.0),
            ..Default::default()
        };
        a.merge_missing(&b);
        assert_eq!(a.energy_kcal, Some(100.0));
        // a measured zero is evidence and must survive the merge
        assert_eq!(a.fat_g, Some(0.0));
        assert_eq!(a.protein_g, Some(3.0));
        assert_eq!(a.sugar_g, None);
    }

    #[test]
    fn test_scale_preserves_unknowns() {
        let set = NutrientSet {
            energy_kcal: Some(200.0),
            ..Default::default()
        };
        let scaled = set.scale(0.5);
        assert_eq!(scaled.energy_kcal, Some(100.0));
        assert_eq!(scaled.protein_g, None);
    }

    #[test]
    fn test_sanitized_drops_bad_values() {
        let set = NutrientSet {
            energy_kcal: Some(f64::NAN),
            fat_g: Some(-1.0),
            carbs_g: Some(12.0),
            ..Default::default()
        };
        let clean = set.sanitized();
        assert_eq!(clean.energy_kcal, None);
        assert_eq!(clean.fat_g, None);
        assert_eq!(clean.carbs_g, Some(12.0));
        assert!(!clean.is_empty());
        assert!(NutrientSet::default().is_empty());
    }
}
