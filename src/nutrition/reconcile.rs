//! Ingredient calorie reconciliation
//!
//! Distributes a known total energy across named ingredients so the rounded
//! per-row values sum to exactly `round(target)`. Rows keep their order; salt
//! never carries energy; seasonings are capped and their excess moves onto
//! starches.

use serde::{Deserialize, Serialize};

use super::keywords::KeywordTables;
use crate::models::{IngredientCategory, IngredientRow};

/// Default seasoning cap in kcal
pub const DEFAULT_SEASONING_CAP_KCAL: f64 = 120.0;

/// Largest energy total or row contribution the reconciler works with
pub const MAX_TOTAL_KCAL: f64 = 1.0e9;

/// Bases at or below this are treated as zero
const BASE_EPSILON: f64 = 1e-6;

/// Tunables for reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileRules {
    pub seasoning_cap_kcal: f64,
    pub starch_weight: f64,
    pub fat_weight: f64,
    pub sugar_weight: f64,
    pub seasoning_weight: f64,
    pub veg_weight: f64,
}

impl Default for ReconcileRules {
    fn default() -> Self {
        Self {
            seasoning_cap_kcal: DEFAULT_SEASONING_CAP_KCAL,
            starch_weight: 0.6,
            fat_weight: 0.2,
            sugar_weight: 0.15,
            seasoning_weight: 0.04,
            veg_weight: 0.01,
        }
    }
}

impl ReconcileRules {
    /// Share weight used when no row carries any energy evidence
    pub fn category_weight(&self, category: IngredientCategory) -> f64 {
        match category {
            IngredientCategory::Starch => self.starch_weight,
            IngredientCategory::Fat => self.fat_weight,
            IngredientCategory::Sugar => self.sugar_weight,
            IngredientCategory::Seasoning => self.seasoning_weight,
            IngredientCategory::Veg => self.veg_weight,
            IngredientCategory::Salt | IngredientCategory::Other => 0.0,
        }
    }
}

fn clean(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Round an energy total into the range the reconciler accepts
pub fn clamp_energy_total(kcal: f64) -> f64 {
    if kcal > MAX_TOTAL_KCAL {
        MAX_TOTAL_KCAL
    } else {
        kcal.round()
    }
}

/// Energy a row contributes before scaling; `None` when the row has no evidence
fn base_contribution(row: &IngredientRow) -> Option<f64> {
    if row.category == IngredientCategory::Salt {
        return Some(0.0);
    }
    if let Some(kcal) = row.estimated_kcal.filter(|k| *k >= 0) {
        return Some((kcal as f64).min(MAX_TOTAL_KCAL));
    }
    match (clean(row.estimated_grams), clean(row.kcal_per_100g)) {
        (Some(grams), Some(per_100g)) => Some((grams * per_100g / 100.0).min(MAX_TOTAL_KCAL)),
        _ => None,
    }
}

/// Reconcile an ingredient breakdown against a target total.
///
/// With `target == None` each row gets its independently rounded base
/// contribution, unscaled. With a target, rows are non-negative whole kcal
/// values summing to exactly `round(target)`; a non-finite or negative target
/// is treated as zero.
pub fn reconcile(
    rows: &[IngredientRow],
    target: Option<f64>,
    rules: &ReconcileRules,
    keywords: &KeywordTables,
) -> Vec<IngredientRow> {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut out: Vec<IngredientRow> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut row = row.clone();
            row.index = index;
            row.category = keywords.classify_ingredient(&row.name);
            row
        })
        .collect();

    let evidence: Vec<Option<f64>> = out.iter().map(base_contribution).collect();
    let bases: Vec<f64> = evidence.iter().map(|b| b.unwrap_or(0.0)).collect();

    let Some(target) = target else {
        for (row, (base, ev)) in out.iter_mut().zip(bases.iter().zip(&evidence)) {
            row.estimated_kcal = Some(base.round() as i64);
            row.assumed = ev.is_none();
        }
        return out;
    };

    let total = if target.is_finite() && target > 0.0 { clamp_energy_total(target) as i64 } else { 0 };
    let base_sum: f64 = bases.iter().sum();

    let mut shares: Vec<f64> = if base_sum <= BASE_EPSILON {
        for row in out.iter_mut() {
            row.assumed = row.category != IngredientCategory::Salt;
        }
        heuristic_shares(&out, total as f64, rules)
    } else {
        for (row, ev) in out.iter_mut().zip(&evidence) {
            row.assumed = ev.is_none();
        }
        let factor = total as f64 / base_sum;
        bases.iter().map(|b| b * factor).collect()
    };

    cap_seasonings(&out, &mut shares, rules.seasoning_cap_kcal);

    let rounded = round_to_total(&out, &shares, total);
    for (row, kcal) in out.iter_mut().zip(rounded) {
        row.estimated_kcal = Some(kcal);
    }
    out
}

/// Category-weighted split of the total; even split when nothing matches
fn heuristic_shares(rows: &[IngredientRow], total: f64, rules: &ReconcileRules) -> Vec<f64> {
    let weights: Vec<f64> = rows.iter().map(|r| rules.category_weight(r.category)).collect();
    let weight_sum: f64 = weights.iter().sum();

    if weight_sum > BASE_EPSILON {
        return weights.iter().map(|w| total * w / weight_sum).collect();
    }

    let eligible: Vec<bool> = rows
        .iter()
        .map(|r| r.category != IngredientCategory::Salt)
        .collect();
    let count = eligible.iter().filter(|e| **e).count();
    if count == 0 {
        // salt only: the total still has to land somewhere
        let mut shares = vec![0.0; rows.len()];
        if let Some(last) = shares.last_mut() {
            *last = total;
        }
        return shares;
    }
    eligible
        .iter()
        .map(|e| if *e { total / count as f64 } else { 0.0 })
        .collect()
}

/// Indices that absorb excess and rounding drift.
///
/// Starch rows first; otherwise the last row that is neither salt nor
/// seasoning, then the last non-salt row. A salt-only list falls back to its
/// last row.
fn sink_indices(rows: &[IngredientRow]) -> Vec<usize> {
    let starch: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.category == IngredientCategory::Starch)
        .map(|(i, _)| i)
        .collect();
    if !starch.is_empty() {
        return starch;
    }

    let last_where = |keep: fn(IngredientCategory) -> bool| rows.iter().rposition(|r| keep(r.category));
    let sink = last_where(|c| !matches!(c, IngredientCategory::Salt | IngredientCategory::Seasoning))
        .or_else(|| last_where(|c| c != IngredientCategory::Salt))
        .unwrap_or(rows.len().saturating_sub(1));
    vec![sink]
}

fn cap_seasonings(rows: &[IngredientRow], shares: &mut [f64], cap: f64) {
    let cap = if cap.is_finite() && cap >= 0.0 { cap } else { DEFAULT_SEASONING_CAP_KCAL };

    let mut excess = 0.0;
    for (row, share) in rows.iter().zip(shares.iter_mut()) {
        if row.category == IngredientCategory::Seasoning && *share > cap {
            excess += *share - cap;
            *share = cap;
        }
    }
    if excess <= 0.0 {
        return;
    }

    let sinks = sink_indices(rows);
    let sink_sum: f64 = sinks.iter().map(|&i| shares[i]).sum();
    for &i in &sinks {
        let portion = if sink_sum > BASE_EPSILON {
            excess * shares[i] / sink_sum
        } else {
            excess / sinks.len() as f64
        };
        shares[i] += portion;
    }
}

/// Round each share and repair the drift with +/-1 steps on sink rows
fn round_to_total(rows: &[IngredientRow], shares: &[f64], total: i64) -> Vec<i64> {
    let mut rounded: Vec<i64> = shares
        .iter()
        .map(|s| if s.is_finite() { s.round().max(0.0) as i64 } else { 0 })
        .collect();

    let sinks = sink_indices(rows);
    let sum = rounded.iter().fold(0i64, |acc, v| acc.saturating_add(*v));
    let mut drift = total.saturating_sub(sum);
    let mut cursor = 0;

    while drift > 0 {
        rounded[sinks[cursor % sinks.len()]] += 1;
        drift -= 1;
        cursor += 1;
    }

    while drift < 0 {
        // prefer sink rows that can still go down, then the largest row
        let target = sinks
            .iter()
            .copied()
            .filter(|&i| rounded[i] > 0)
            .nth(cursor % sinks.len().max(1))
            .or_else(|| sinks.iter().copied().find(|&i| rounded[i] > 0))
            .or_else(|| {
                rounded
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v > 0)
                    .max_by_key(|(_, v)| **v)
                    .map(|(i, _)| i)
            });
        match target {
            Some(i) => {
                rounded[i] -= 1;
                drift += 1;
                cursor += 1;
            }
            None => break,
        }
    }

    rounded
}
