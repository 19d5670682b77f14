//! Alternative product ranking
//!
//! Candidates from the product catalog (and, when that comes up short, a
//! generated list) are deduplicated, bucketed against the scanned product's
//! energy, ordered with same-brand suggestions first, and capped per bucket.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{AlternativeCandidate, Bucket};

/// Relative energy difference separating "similar" from lower/higher
pub const DEFAULT_BUCKET_THRESHOLD: f64 = 0.07;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingRules {
    pub bucket_threshold: f64,
    pub max_lower: usize,
    pub max_similar: usize,
    pub max_higher: usize,
    /// Below this many unique catalog candidates the generated list is merged in
    pub min_primary: usize,
}

impl Default for RankingRules {
    fn default() -> Self {
        Self {
            bucket_threshold: DEFAULT_BUCKET_THRESHOLD,
            max_lower: 5,
            max_similar: 2,
            max_higher: 5,
            min_primary: 3,
        }
    }
}

impl RankingRules {
    fn cap(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Lower => self.max_lower,
            Bucket::Similar => self.max_similar,
            Bucket::Higher => self.max_higher,
        }
    }
}

/// The scanned product alternatives are compared against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseProduct {
    pub brand: Option<String>,
    pub name: String,
    pub calories_per_package_kcal: Option<f64>,
}

fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Bucket from (candidate - base) / base; `None` when either side is unknown
pub fn derive_bucket(base_kcal: Option<f64>, candidate_kcal: Option<f64>, threshold: f64) -> Option<Bucket> {
    let base = known(base_kcal).filter(|b| *b > 0.0)?;
    let candidate = known(candidate_kcal)?;
    let delta = (candidate - base) / base;
    Some(if delta < -threshold {
        Bucket::Lower
    } else if delta > threshold {
        Bucket::Higher
    } else {
        Bucket::Similar
    })
}

/// Computed bucket when both energies are known, else the source label, else similar
pub fn assign_bucket(candidate: &AlternativeCandidate, base_kcal: Option<f64>, threshold: f64) -> Bucket {
    derive_bucket(base_kcal, candidate.calories_per_package_kcal, threshold)
        .or_else(|| candidate.source_label.as_deref().and_then(Bucket::from_label))
        .unwrap_or(Bucket::Similar)
}

/// Lowercase alphanumeric words joined by single spaces
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn same_brand(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = normalize_name(a);
            !a.is_empty() && a == normalize_name(b)
        }
        _ => false,
    }
}

/// Drop empty names, the base product itself and repeated names (first wins)
pub fn dedupe(base: &BaseProduct, candidates: Vec<AlternativeCandidate>) -> Vec<AlternativeCandidate> {
    let base_key = normalize_name(&base.name);
    let mut seen: HashSet<String> = HashSet::new();

    candidates
        .into_iter()
        .filter_map(|mut c| {
            c.name = c.name.trim().to_string();
            let key = normalize_name(&c.name);
            if key.is_empty() {
                return None;
            }
            let is_base = key == base_key
                && (base.brand.is_none() || c.brand.is_none() || same_brand(base.brand.as_deref(), c.brand.as_deref()));
            if is_base || !seen.insert(key) {
                return None;
            }
            c.calories_per_package_kcal = known(c.calories_per_package_kcal);
            Some(c)
        })
        .collect()
}

/// Merge the generated list only when the catalog yields too few unique candidates.
///
/// Returns the merged list and whether the fallback was used.
pub fn merge_sources(
    base: &BaseProduct,
    primary: Vec<AlternativeCandidate>,
    fallback: impl FnOnce() -> Vec<AlternativeCandidate>,
    rules: &RankingRules,
) -> (Vec<AlternativeCandidate>, bool) {
    let primary = dedupe(base, primary);
    if primary.len() >= rules.min_primary {
        return (primary, false);
    }
    let mut merged = primary;
    merged.extend(fallback());
    (dedupe(base, merged), true)
}

/// Whether the catalog list is short enough that a generated list is needed
pub fn needs_fallback(base: &BaseProduct, primary: &[AlternativeCandidate], rules: &RankingRules) -> bool {
    dedupe(base, primary.to_vec()).len() < rules.min_primary
}

/// Dedupe, bucket, order and cap the candidates.
///
/// Output order: lower, similar, higher; inside each bucket same-brand first,
/// then ascending energy with unknown energy last; source order breaks ties.
pub fn rank_alternatives(
    base: &BaseProduct,
    candidates: Vec<AlternativeCandidate>,
    rules: &RankingRules,
) -> Vec<AlternativeCandidate> {
    let mut ranked: Vec<AlternativeCandidate> = dedupe(base, candidates)
        .into_iter()
        .map(|mut c| {
            c.bucket = assign_bucket(&c, base.calories_per_package_kcal, rules.bucket_threshold);
            c
        })
        .collect();

    let bucket_order = |b: Bucket| match b {
        Bucket::Lower => 0,
        Bucket::Similar => 1,
        Bucket::Higher => 2,
    };
    ranked.sort_by(|a, b| {
        let a_same = same_brand(a.brand.as_deref(), base.brand.as_deref());
        let b_same = same_brand(b.brand.as_deref(), base.brand.as_deref());
        bucket_order(a.bucket)
            .cmp(&bucket_order(b.bucket))
            .then(b_same.cmp(&a_same))
            .then_with(|| match (a.calories_per_package_kcal, b.calories_per_package_kcal) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });

    let mut taken = [0usize; 3];
    ranked
        .into_iter()
        .filter(|c| {
            let slot = &mut taken[bucket_order(c.bucket)];
            if *slot < rules.cap(c.bucket) {
                *slot += 1;
                true
            } else {
                false
            }
        })
        .collect()
}
