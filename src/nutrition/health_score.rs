//! Health score
//!
//! A coarse 0-10 rating from per-100g values: energy density, sugar, fat and
//! sodium cost points, fiber and protein earn some back.

use crate::models::NutrientSet;

const BASE_SCORE: f64 = 7.0;

/// (threshold, points) pairs, checked from the highest threshold down
const ENERGY_PENALTIES: [(f64, f64); 3] = [(400.0, 2.5), (250.0, 1.5), (150.0, 0.5)];
const SUGAR_PENALTIES: [(f64, f64); 3] = [(22.5, 2.5), (12.5, 1.5), (5.0, 0.5)];
const FAT_PENALTIES: [(f64, f64); 3] = [(17.5, 2.0), (10.0, 1.0), (3.0, 0.25)];
const SODIUM_PENALTIES: [(f64, f64); 3] = [(600.0, 2.0), (300.0, 1.0), (120.0, 0.25)];
const FIBER_BONUSES: [(f64, f64); 2] = [(6.0, 1.5), (3.0, 0.75)];
const PROTEIN_BONUSES: [(f64, f64); 2] = [(10.0, 1.0), (5.0, 0.5)];

fn points(value: Option<f64>, table: &[(f64, f64)]) -> f64 {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return 0.0;
    };
    table
        .iter()
        .find(|(threshold, _)| v > *threshold)
        .map(|(_, p)| *p)
        .unwrap_or(0.0)
}

/// Score per-100g values; `None` when energy density is unknown
pub fn health_score(per_100g: &NutrientSet) -> Option<f64> {
    per_100g.energy_kcal.filter(|e| e.is_finite() && *e >= 0.0)?;

    let score = BASE_SCORE
        - points(per_100g.energy_kcal, &ENERGY_PENALTIES)
        - points(per_100g.sugar_g, &SUGAR_PENALTIES)
        - points(per_100g.fat_g, &FAT_PENALTIES)
        - points(per_100g.sodium_mg, &SODIUM_PENALTIES)
        + points(per_100g.fiber_g, &FIBER_BONUSES)
        + points(per_100g.protein_g, &PROTEIN_BONUSES);

    Some((score.clamp(0.0, 10.0) * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_energy_gives_no_score() {
        assert_eq!(health_score(&NutrientSet::default()), None);
    }

    #[test]
    fn test_candy_scores_low() {
        let candy = NutrientSet {
            energy_kcal: Some(530.0),
            sugar_g: Some(55.0),
            fat_g: Some(30.0),
            sodium_mg: Some(100.0),
            ..Default::default()
        };
        assert_eq!(health_score(&candy), Some(0.0));
    }

    #[test]
    fn test_lentils_score_high() {
        let lentils = NutrientSet {
            energy_kcal: Some(116.0),
            sugar_g: Some(1.8),
            fat_g: Some(0.4),
            sodium_mg: Some(2.0),
            fiber_g: Some(7.9),
            protein_g: Some(9.0),
            ..Default::default()
        };
        assert_eq!(health_score(&lentils), Some(9.0));
    }

    #[test]
    fn test_zero_energy_is_scored() {
        assert_eq!(health_score(&NutrientSet::zero()), Some(7.0));
    }
}
