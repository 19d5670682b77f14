//! Packaged product module
//!
//! Barcode validation, catalog records, the Open Food Facts client and
//! alternative ranking.

pub mod alternatives;
pub mod barcode;
pub mod open_food_facts;

use serde::{Deserialize, Serialize};

use crate::models::{AlternativeCandidate, NutrientSet};
use crate::nutrition::converter::{derive_profile, NutritionProfile, Quantity};

pub use alternatives::{rank_alternatives, BaseProduct, RankingRules, DEFAULT_BUCKET_THRESHOLD};
pub use barcode::{select_barcode, DigitCandidate, ValidatedBarcode};
pub use open_food_facts::OpenFoodFactsClient;

/// A product as known to a product database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub per_100g: NutrientSet,
    pub per_serving: NutrientSet,
    pub serving_size: Option<Quantity>,
    pub serving_label: Option<String>,
    pub servings_per_package: Option<f64>,
    pub net_quantity: Option<Quantity>,
    pub ingredients_text: Option<String>,
}

impl ProductRecord {
    /// Per-100g, per-serving and per-package values derived from what is known
    pub fn profile(&self) -> NutritionProfile {
        derive_profile(
            &self.per_100g,
            &self.per_serving,
            &NutrientSet::default(),
            self.serving_size.map(|q| q.value),
            self.servings_per_package,
            self.net_quantity.map(|q| q.value),
        )
    }

    pub fn calories_per_package(&self) -> Option<f64> {
        self.profile().per_package.energy_kcal
    }

    /// As an alternative suggestion; `None` without a name
    pub fn to_alternative(&self) -> Option<AlternativeCandidate> {
        let name = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        Some(AlternativeCandidate {
            brand: self.brand.clone(),
            name: name.to_string(),
            variant: self.net_quantity.map(|q| {
                format!("{} {}", q.value.round(), q.kind.canonical_unit())
            }),
            calories_per_package_kcal: self.calories_per_package(),
            bucket: Default::default(),
            source_label: None,
        })
    }
}

/// Free-text catalog query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub brand: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
}

impl ProductQuery {
    /// Brand and title joined, falling back to the category alone
    pub fn search_terms(&self) -> Option<String> {
        let clean = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let terms: Vec<String> = [clean(&self.brand), clean(&self.title)]
            .into_iter()
            .flatten()
            .collect();
        if terms.is_empty() {
            clean(&self.category)
        } else {
            Some(terms.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_energy_from_net_weight() {
        let product = ProductRecord {
            name: Some("Hazelnut Spread".into()),
            per_100g: NutrientSet {
                energy_kcal: Some(539.0),
                ..Default::default()
            },
            net_quantity: Some(Quantity::grams(400.0)),
            ..Default::default()
        };
        let kcal = product.calories_per_package().unwrap();
        assert!((kcal - 2156.0).abs() < 1e-9);

        let alt = product.to_alternative().unwrap();
        assert_eq!(alt.name, "Hazelnut Spread");
        assert_eq!(alt.variant.as_deref(), Some("400 g"));
    }

    #[test]
    fn test_nameless_product_is_not_an_alternative() {
        let product = ProductRecord {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert!(product.to_alternative().is_none());
    }

    #[test]
    fn test_search_terms() {
        let q = ProductQuery {
            brand: Some("Acme".into()),
            title: Some("Choco Crunch".into()),
            category: Some("cereal".into()),
        };
        assert_eq!(q.search_terms().as_deref(), Some("Acme Choco Crunch"));

        let q = ProductQuery {
            category: Some("cereal".into()),
            ..Default::default()
        };
        assert_eq!(q.search_terms().as_deref(), Some("cereal"));
        assert_eq!(ProductQuery::default().search_terms(), None);
    }
}
