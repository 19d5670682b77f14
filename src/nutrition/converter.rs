//! Unit and energy normalization
//!
//! Pure conversions from whatever a label or model reports into kcal, g, ml
//! and mg, plus the per-100g -> per-serving -> per-package derivations.
//! Missing evidence stays `None`; these functions never invent a zero.

use serde::{Deserialize, Serialize};

use super::units::{
    categorize_unit, grams_per_unit, ml_per_unit, QuantityKind, UnitCategory, G_PER_OZ,
    KJ_PER_KCAL, ML_PER_FL_OZ, SODIUM_MG_PER_SALT_G,
};
use crate::models::{NutrientSet, RawNutrients};

/// A measured amount in canonical units (g or ml)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub kind: QuantityKind,
}

impl Quantity {
    pub fn grams(value: f64) -> Self {
        Self { value, kind: QuantityKind::Mass }
    }

    pub fn millilitres(value: f64) -> Self {
        Self { value, kind: QuantityKind::Volume }
    }
}

// ============================================================================
// Scalar conversions
// ============================================================================

pub fn kj_to_kcal(kj: f64) -> f64 {
    kj / KJ_PER_KCAL
}

pub fn kcal_to_kj(kcal: f64) -> f64 {
    kcal * KJ_PER_KCAL
}

/// Sodium in mg for a salt amount in g, rounded to a whole milligram
pub fn salt_to_sodium_mg(salt_g: f64) -> f64 {
    (salt_g * SODIUM_MG_PER_SALT_G).round()
}

pub fn fl_oz_to_ml(fl_oz: f64) -> f64 {
    fl_oz * ML_PER_FL_OZ
}

pub fn oz_to_g(oz: f64) -> f64 {
    oz * G_PER_OZ
}

fn finite_non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Energy in kcal, preferring a direct kcal reading over a converted kJ one
pub fn normalize_energy(kcal: Option<f64>, kj: Option<f64>) -> Option<f64> {
    finite_non_negative(kcal).or_else(|| finite_non_negative(kj).map(kj_to_kcal))
}

/// Sodium in mg, preferring a direct sodium reading over a converted salt one
pub fn normalize_sodium(sodium_mg: Option<f64>, salt_g: Option<f64>) -> Option<f64> {
    finite_non_negative(sodium_mg).or_else(|| finite_non_negative(salt_g).map(salt_to_sodium_mg))
}

/// Convert a raw label reading into the canonical unit system
pub fn normalize_nutrients(raw: &RawNutrients) -> NutrientSet {
    NutrientSet {
        energy_kcal: normalize_energy(raw.energy_kcal, raw.energy_kj),
        protein_g: finite_non_negative(raw.protein_g),
        fat_g: finite_non_negative(raw.fat_g),
        carbs_g: finite_non_negative(raw.carbs_g),
        sugar_g: finite_non_negative(raw.sugar_g),
        fiber_g: finite_non_negative(raw.fiber_g),
        sodium_mg: normalize_sodium(raw.sodium_mg, raw.salt_g),
        calcium_mg: finite_non_negative(raw.calcium_mg),
    }
}

// ============================================================================
// Basis derivations
// ============================================================================

/// per_serving = per_100g * serving_size_g / 100
pub fn per_serving_from_per_100g(per_100g: Option<f64>, serving_size_g: Option<f64>) -> Option<f64> {
    match (finite_non_negative(per_100g), finite_non_negative(serving_size_g)) {
        (Some(v), Some(size)) => Some(v * size / 100.0),
        _ => None,
    }
}

/// per_package = per_serving * servings, or per_100g * net_weight_g / 100
/// when the serving count is unknown
pub fn per_package_value(
    per_serving: Option<f64>,
    servings_per_package: Option<f64>,
    per_100g: Option<f64>,
    net_weight_g: Option<f64>,
) -> Option<f64> {
    let servings = finite_non_negative(servings_per_package).filter(|s| *s > 0.0);
    if let (Some(v), Some(n)) = (finite_non_negative(per_serving), servings) {
        return Some(v * n);
    }
    match (finite_non_negative(per_100g), finite_non_negative(net_weight_g)) {
        (Some(v), Some(net)) => Some(v * net / 100.0),
        _ => None,
    }
}

/// The three bases of a product, each field derived independently
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionProfile {
    pub per_100g: NutrientSet,
    pub per_serving: NutrientSet,
    pub per_package: NutrientSet,
}

/// Fill per-serving and per-package values from whatever bases are known.
///
/// Direct readings always win over derived ones. `net_amount` is grams, or
/// millilitres standing in for grams when only a volume is printed.
pub fn derive_profile(
    per_100g: &NutrientSet,
    per_serving: &NutrientSet,
    per_package: &NutrientSet,
    serving_size: Option<f64>,
    servings_per_package: Option<f64>,
    net_amount: Option<f64>,
) -> NutritionProfile {
    let per_100g = per_100g.sanitized();

    let mut serving = per_serving.sanitized();
    let derived_serving = per_100g.combine(&NutrientSet::default(), |v, _| {
        per_serving_from_per_100g(v, serving_size)
    });
    serving.merge_missing(&derived_serving);

    let mut package = per_package.sanitized();
    let derived_package = serving.combine(&per_100g, |s, h| {
        per_package_value(s, servings_per_package, h, net_amount)
    });
    package.merge_missing(&derived_package);

    NutritionProfile {
        per_100g,
        per_serving: serving,
        per_package: package,
    }
}

// ============================================================================
// Quantity parsing
// ============================================================================

fn resolve_unit(unit: &str) -> Option<(f64, QuantityKind)> {
    match categorize_unit(unit) {
        UnitCategory::Weight => grams_per_unit(unit).map(|f| (f, QuantityKind::Mass)),
        UnitCategory::Volume => ml_per_unit(unit).map(|f| (f, QuantityKind::Volume)),
        UnitCategory::Count | UnitCategory::Custom => None,
    }
}

/// Read a number starting at `start`; accepts `1.5` and `1,5`
fn read_number(chars: &[char], start: usize) -> Option<(f64, usize)> {
    let mut end = start;
    let mut text = String::new();
    while end < chars.len() {
        let c = chars[end];
        if c.is_ascii_digit() {
            text.push(c);
        } else if (c == '.' || c == ',')
            && !text.is_empty()
            && chars.get(end + 1).is_some_and(|n| n.is_ascii_digit())
        {
            text.push('.');
        } else {
            break;
        }
        end += 1;
    }
    text.parse::<f64>().ok().map(|v| (v, end))
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Read the unit words following a number; tries "fl oz" before "fl"
fn read_unit(chars: &[char], start: usize) -> Option<(f64, QuantityKind)> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphabetic() || chars[end] == '.' || chars[end] == ' ') {
        end += 1;
    }
    let tail: String = chars[start..end].iter().collect();
    let words: Vec<&str> = tail.split_whitespace().collect();
    for take in (1..=words.len().min(2)).rev() {
        let candidate = words[..take].join(" ");
        let candidate = candidate.trim_end_matches('.');
        if let Some(found) = resolve_unit(candidate) {
            return Some(found);
        }
    }
    None
}

/// Parse the first convertible quantity in free text.
///
/// Handles `330 ml`, `12 fl oz`, `1,5 L`, `0.5kg`, and multipacks like
/// `6 x 330 ml`. Count units are skipped in favour of a later metric amount.
pub fn parse_quantity(text: &str) -> Option<Quantity> {
    let lower = text.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let Some((mut value, mut end)) = read_number(&chars, i) else {
            i += 1;
            continue;
        };

        let after = skip_spaces(&chars, end);
        if matches!(chars.get(after), Some('x') | Some('×') | Some('*')) {
            let next = skip_spaces(&chars, after + 1);
            if let Some((inner, inner_end)) = read_number(&chars, next) {
                value *= inner;
                end = inner_end;
            }
        }

        let unit_start = skip_spaces(&chars, end);
        if let Some((factor, kind)) = read_unit(&chars, unit_start) {
            let amount = value * factor;
            if amount.is_finite() {
                return Some(Quantity { value: amount, kind });
            }
        }
        i = end.max(i + 1);
    }

    None
}

/// Parse a serving-size string, preferring a parenthetical metric amount
///
/// `1 cup (240 ml)` -> 240 ml, `2 biscuits (25 g)` -> 25 g, `30g` -> 30 g
pub fn parse_serving_size(text: &str) -> Option<Quantity> {
    if let (Some(open), Some(close)) = (text.find('('), text.rfind(')')) {
        if open < close {
            if let Some(q) = parse_quantity(&text[open + 1..close]) {
                return Some(q);
            }
        }
    }
    parse_quantity(text)
}
