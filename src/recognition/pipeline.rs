//! Record assembly
//!
//! The synchronous half of a scan: merged evidence is normalized into a
//! [`Draft`], then reconciled into a [`NutritionRecord`]. Recalculation with
//! user overrides goes through the same rules.

use serde::{Deserialize, Serialize};

use super::evidence::{split_ingredient_text, BeverageEvidence, EvidenceItem, RecognitionEvidence};
use crate::config::ScanConfig;
use crate::models::{IngredientRow, NutrientSet, NutritionRecord, ScanMode, UNKNOWN_PRODUCT_TITLE};
use crate::nutrition::converter::{derive_profile, normalize_nutrients, parse_quantity, parse_serving_size, Quantity};
use crate::nutrition::{
    clamp_energy_total, estimate_volume, health_score, reconcile, BeverageCues, BeverageKind, KeywordTables, VolumeEstimate,
};
use crate::products::{rank_alternatives, BaseProduct, ProductRecord};

/// Health score given to plain water
pub const WATER_HEALTH_SCORE: f64 = 10.0;

/// Normalized evidence, before reconciliation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub per_100g: NutrientSet,
    pub per_serving: NutrientSet,
    pub per_package: NutrientSet,
    pub serving_size: Option<Quantity>,
    pub serving_label: Option<String>,
    pub servings_per_package: Option<f64>,
    pub net_quantity: Option<Quantity>,
    pub items: Vec<EvidenceItem>,
    pub beverage: Option<BeverageEvidence>,
}

impl Draft {
    pub fn from_evidence(evidence: &RecognitionEvidence) -> Self {
        Self {
            title: evidence.title.clone(),
            brand: evidence.brand.clone(),
            category: evidence.category.clone(),
            icon: evidence.icon.clone(),
            per_100g: normalize_nutrients(&evidence.per_100g),
            per_serving: normalize_nutrients(&evidence.per_serving),
            per_package: normalize_nutrients(&evidence.per_package),
            serving_size: evidence.serving_size.as_deref().and_then(parse_serving_size),
            serving_label: evidence.serving_size.clone(),
            servings_per_package: evidence.servings_per_package.filter(|s| s.is_finite() && *s > 0.0),
            net_quantity: evidence.net_quantity.as_deref().and_then(parse_quantity),
            items: evidence.items.clone(),
            beverage: evidence.beverage.clone(),
        }
    }

    pub fn from_product(product: &ProductRecord) -> Self {
        let items = product
            .ingredients_text
            .as_deref()
            .map(split_ingredient_text)
            .unwrap_or_default()
            .into_iter()
            .map(|name| EvidenceItem {
                name,
                ..Default::default()
            })
            .collect();

        Self {
            title: product.name.clone(),
            brand: product.brand.clone(),
            category: product.category.clone(),
            icon: None,
            per_100g: product.per_100g.clone(),
            per_serving: product.per_serving.clone(),
            per_package: NutrientSet::default(),
            serving_size: product.serving_size,
            serving_label: product.serving_label.clone(),
            servings_per_package: product.servings_per_package,
            net_quantity: product.net_quantity,
            items,
            beverage: None,
        }
    }

    /// True when some macro is unknown in every basis
    pub fn has_missing_macros(&self) -> bool {
        let mut known = self.per_100g.clone();
        known.merge_missing(&self.per_serving);
        known.merge_missing(&self.per_package);
        known.has_missing_macros()
    }

    /// Fill null nutrient fields from a catalog product. Returns whether
    /// anything was filled.
    pub fn fill_from_catalog(&mut self, product: &ProductRecord) -> bool {
        let before = (self.per_100g.clone(), self.per_serving.clone());
        self.per_100g.merge_missing(&product.per_100g);
        self.per_serving.merge_missing(&product.per_serving);
        if self.serving_size.is_none() {
            self.serving_size = product.serving_size;
        }
        (&self.per_100g, &self.per_serving) != (&before.0, &before.1)
    }
}

fn clean_number(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn clean_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn rows_from_items(items: &[EvidenceItem]) -> Vec<IngredientRow> {
    items
        .iter()
        .filter(|item| !item.name.trim().is_empty())
        .enumerate()
        .map(|(index, item)| {
            let mut row = IngredientRow::new(index, item.name.trim());
            row.estimated_grams = clean_number(item.grams);
            row.kcal_per_100g = clean_number(item.kcal_per_100g);
            row.estimated_kcal = clean_number(item.kcal).map(|k| k.round() as i64);
            row
        })
        .collect()
}

/// Total item weight, only when every item has one
fn item_grams(items: &[EvidenceItem]) -> Option<f64> {
    items
        .iter()
        .map(|i| clean_number(i.grams))
        .sum::<Option<f64>>()
        .filter(|g| *g > 0.0)
}

fn identity_text(record: &NutritionRecord) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !record.provenance.unknown_product {
        parts.push(&record.title);
    }
    parts.extend(record.category.as_deref());
    parts.join(" ")
}

fn beverage_kind(identity: &str, stated: Option<&str>, keywords: &KeywordTables) -> Option<BeverageKind> {
    let stated = stated.map(str::to_lowercase);
    match stated.as_deref() {
        // a stated "water" still has to survive the flavoured-water exclusions
        Some("water") if keywords.is_plain_water(&format!("water {identity}")) => Some(BeverageKind::Water),
        Some("coffee") => Some(BeverageKind::Coffee),
        _ if keywords.is_plain_water(identity) => Some(BeverageKind::Water),
        _ if keywords.is_coffee(identity) => Some(BeverageKind::Coffee),
        Some(_) => Some(BeverageKind::Other),
        None => None,
    }
}

fn beverage_estimate(
    identity: &str,
    evidence: Option<&BeverageEvidence>,
    keywords: &KeywordTables,
) -> Option<VolumeEstimate> {
    let stated = evidence.and_then(|b| b.kind.as_deref());
    let kind = match beverage_kind(identity, stated, keywords) {
        Some(kind) => kind,
        None if evidence.is_some() => BeverageKind::Other,
        None => return None,
    };
    let cues = BeverageCues {
        kind,
        description: evidence.and_then(|b| b.description.clone()),
        container: evidence.and_then(|b| b.container.clone()),
        capacity_ml: evidence.and_then(|b| b.capacity_ml),
        fill_percent: evidence.and_then(|b| b.fill_percent),
        explicit_volume_ml: evidence.and_then(|b| b.volume_ml),
        explicit_cups: evidence.and_then(|b| b.cups),
    };
    Some(estimate_volume(&cues))
}

/// Zero every nutrient regardless of upstream numbers
pub fn apply_water_override(record: &mut NutritionRecord, rows: &[IngredientRow], config: &ScanConfig) {
    record.per_100g = NutrientSet::zero();
    record.per_serving = NutrientSet::zero();
    record.per_package = NutrientSet::zero();
    record.energy_kcal_total = Some(0.0);
    record.ingredients = reconcile(rows, Some(0.0), &config.reconcile, &config.keywords);
    record.health_score = Some(WATER_HEALTH_SCORE);
    record.provenance.water_override = true;
}

/// Reconcile a normalized draft into a finished record (alternatives excluded)
pub fn finish_record(scan_id: &str, mode: ScanMode, draft: Draft, config: &ScanConfig) -> NutritionRecord {
    let keywords = &config.keywords;
    let title = draft
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !keywords.is_placeholder_title(t))
        .map(str::to_string);

    let mut record = NutritionRecord::new(
        scan_id,
        mode,
        title.clone().unwrap_or_else(|| UNKNOWN_PRODUCT_TITLE.to_string()),
    );
    record.provenance.unknown_product = title.is_none();
    record.brand = draft.brand;
    record.category = draft.category;
    record.icon = draft.icon;
    record.serving_size = draft.serving_size;
    record.serving_label = draft.serving_label;
    record.servings_per_package = draft.servings_per_package;

    let identity = identity_text(&record);
    record.beverage = beverage_estimate(&identity, draft.beverage.as_ref(), keywords);

    // a measured drink volume stands in for an unknown net quantity
    record.net_quantity = draft.net_quantity.or_else(|| {
        record
            .beverage
            .as_ref()
            .and_then(|b| b.present_ml)
            .filter(|ml| *ml > 0.0)
            .map(Quantity::millilitres)
    });

    let portion = record.net_quantity.map(|q| q.value).or_else(|| item_grams(&draft.items));
    let profile = derive_profile(
        &draft.per_100g,
        &draft.per_serving,
        &draft.per_package,
        record.serving_size.map(|q| q.value),
        record.servings_per_package,
        portion,
    );
    record.per_100g = profile.per_100g;
    record.per_serving = profile.per_serving;
    record.per_package = profile.per_package;

    // a dish known only as a whole portion still gets per-100g density
    if record.per_100g.energy_kcal.is_none() {
        if let Some(grams) = portion.filter(|g| *g > 0.0) {
            let density = record.per_package.scale(100.0 / grams);
            record.per_100g.merge_missing(&density);
        }
    }

    let rows = rows_from_items(&draft.items);
    let is_water = record
        .beverage
        .as_ref()
        .is_some_and(|b| b.kind == BeverageKind::Water);
    if is_water {
        apply_water_override(&mut record, &rows, config);
    } else {
        record.energy_kcal_total = record.display_energy_kcal().map(clamp_energy_total);
        record.ingredients = reconcile(&rows, record.energy_kcal_total, &config.reconcile, keywords);
        record.health_score = health_score(&record.per_100g);
    }

    if record.icon.is_none() {
        record.icon = keywords.icon_for(&identity).map(str::to_string);
    }
    record
}

/// What alternatives are compared against
pub fn base_product(record: &NutritionRecord) -> BaseProduct {
    BaseProduct {
        brand: record.brand.clone(),
        name: record.title.clone(),
        calories_per_package_kcal: record.per_package.energy_kcal.or(record.energy_kcal_total),
    }
}

/// User corrections, treated as authoritative evidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanOverrides {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub items: Option<Vec<EvidenceItem>>,
    pub energy_kcal_total: Option<f64>,
    /// Amount in grams the totals should describe
    pub quantity_g: Option<f64>,
    pub servings: Option<f64>,
}

/// Rebuild a record with user overrides applied.
///
/// Target energy: explicit total, else per-100g x quantity, else per-serving x
/// servings, else the overriding items' kcal when every one has a value, else
/// the record's existing total.
pub fn recalculate_record(
    record: &NutritionRecord,
    overrides: &ScanOverrides,
    config: &ScanConfig,
) -> NutritionRecord {
    let mut next = record.clone();
    next.provenance.user_overrides = true;

    if let Some(title) = clean_text(&overrides.title) {
        next.title = title;
        next.provenance.unknown_product = false;
    }
    if let Some(brand) = clean_text(&overrides.brand) {
        next.brand = Some(brand);
    }

    let quantity = clean_number(overrides.quantity_g).filter(|q| *q > 0.0);
    let servings = clean_number(overrides.servings).filter(|s| *s > 0.0);
    if let Some(q) = quantity {
        next.net_quantity = Some(Quantity::grams(q));
        if !next.per_100g.is_empty() {
            next.per_package = next.per_100g.scale(q / 100.0);
        }
    } else if let Some(s) = servings {
        next.servings_per_package = Some(s);
        if !next.per_serving.is_empty() {
            next.per_package = next.per_serving.scale(s);
        }
    }

    let (rows, item_total) = match &overrides.items {
        Some(items) => {
            let rows = rows_from_items(items);
            let total = (!rows.is_empty())
                .then(|| rows.iter().map(|r| r.estimated_kcal.map(|k| k as f64)).sum::<Option<f64>>())
                .flatten();
            (rows, total)
        }
        None => (next.ingredients.clone(), None),
    };

    let explicit = clean_number(overrides.energy_kcal_total).or(item_total);
    let target = clean_number(overrides.energy_kcal_total)
        .or_else(|| quantity.and_then(|q| next.per_100g.energy_kcal.map(|e| e * q / 100.0)))
        .or_else(|| servings.and_then(|s| next.per_serving.energy_kcal.map(|e| e * s)))
        .or(item_total)
        .or(record.energy_kcal_total)
        .map(clamp_energy_total);

    if explicit.is_some() {
        next.per_package.energy_kcal = target;
    }
    next.energy_kcal_total = target;

    let mut ingredients = reconcile(&rows, target, &config.reconcile, &config.keywords);
    if overrides.items.is_none() {
        for (row, previous) in ingredients.iter_mut().zip(&record.ingredients) {
            row.assumed = previous.assumed;
        }
    }
    next.ingredients = ingredients;

    if !next.provenance.water_override {
        next.health_score = health_score(&next.per_100g);
    }
    next.alternatives = rank_alternatives(&base_product(&next), record.alternatives.clone(), &config.ranking);
    next
}

/// Redistribute heuristic ingredient shares against the stored total with the
/// current keyword tables. Rows backed by evidence keep their calories.
pub fn rereconcile_record(record: &NutritionRecord, config: &ScanConfig) -> NutritionRecord {
    let mut next = record.clone();
    let rows: Vec<IngredientRow> = record
        .ingredients
        .iter()
        .map(|row| {
            let mut row = row.clone();
            if row.assumed {
                row.estimated_kcal = None;
            }
            row
        })
        .collect();
    next.ingredients = reconcile(&rows, record.energy_kcal_total, &config.reconcile, &config.keywords);
    if !next.provenance.water_override {
        next.health_score = health_score(&next.per_100g);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{total_kcal, AlternativeCandidate, Bucket, IngredientCategory};
    use crate::nutrition::MAX_TOTAL_KCAL;
    use crate::recognition::services::RecognitionTask;

    fn items(names: &[&str]) -> Vec<EvidenceItem> {
        names
            .iter()
            .map(|n| EvidenceItem {
                name: n.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_label_record_sums_to_package_energy() {
        let evidence = RecognitionEvidence::parse(
            r#"{"title": "Crunchy Granola", "net_quantity": "500 g",
                "per_100g": {"energy_kj": 1850, "protein_g": 9, "salt_g": 0.5},
                "items": ["oats", "sugar", "salt"]}"#,
            RecognitionTask::LabelParse,
        );
        let config = ScanConfig::default();
        let record = finish_record("s1", ScanMode::Label, Draft::from_evidence(&evidence), &config);

        assert_eq!(record.energy_kcal_total, Some(2211.0));
        assert_eq!(total_kcal(&record.ingredients), 2211);
        assert_eq!(record.per_100g.sodium_mg, Some(197.0));
        let salt = record.ingredients.iter().find(|r| r.name == "salt").unwrap();
        assert_eq!(salt.category, IngredientCategory::Salt);
        assert_eq!(salt.estimated_kcal, Some(0));
        assert!(record.health_score.is_some());
    }

    #[test]
    fn test_water_override_zeroes_everything() {
        let evidence = RecognitionEvidence::parse(
            r#"{"title": "Still water", "calories": 45, "protein_g": 2, "sugar_g": 3,
                "items": ["water"], "beverage": {"kind": "water", "volume_ml": 500}}"#,
            RecognitionTask::CombinedFoodAnalysis,
        );
        let config = ScanConfig::default();
        let record = finish_record("s1", ScanMode::GenericFood, Draft::from_evidence(&evidence), &config);

        assert!(record.provenance.water_override);
        assert_eq!(record.energy_kcal_total, Some(0.0));
        assert_eq!(record.per_package, NutrientSet::zero());
        assert_eq!(record.per_serving, NutrientSet::zero());
        assert_eq!(record.per_100g, NutrientSet::zero());
        assert_eq!(total_kcal(&record.ingredients), 0);
        assert_eq!(record.health_score, Some(WATER_HEALTH_SCORE));
        assert_eq!(record.net_quantity, Some(Quantity::millilitres(500.0)));
    }

    #[test]
    fn test_flavoured_water_is_not_overridden() {
        let evidence = RecognitionEvidence::parse(
            r#"{"title": "Lemon flavoured water", "calories": 40, "beverage": {"kind": "water"}}"#,
            RecognitionTask::CombinedFoodAnalysis,
        );
        let record = finish_record(
            "s1",
            ScanMode::GenericFood,
            Draft::from_evidence(&evidence),
            &ScanConfig::default(),
        );
        assert!(!record.provenance.water_override);
        assert_eq!(record.energy_kcal_total, Some(40.0));
    }

    #[test]
    fn test_coffee_cups_from_container() {
        let evidence = RecognitionEvidence::parse(
            r#"{"title": "Latte", "beverage": {"kind": "coffee", "container": "large mug", "fill_percent": 50}}"#,
            RecognitionTask::CombinedFoodAnalysis,
        );
        let record = finish_record(
            "s1",
            ScanMode::GenericFood,
            Draft::from_evidence(&evidence),
            &ScanConfig::default(),
        );
        let beverage = record.beverage.unwrap();
        assert_eq!(beverage.kind, BeverageKind::Coffee);
        assert_eq!(beverage.present_ml, Some(175.0));
        assert_eq!(beverage.cups, Some(0.7));
    }

    #[test]
    fn test_placeholder_title_becomes_unknown() {
        let draft = Draft {
            title: Some("Scanned meal".into()),
            ..Default::default()
        };
        let record = finish_record("s1", ScanMode::GenericFood, draft, &ScanConfig::default());
        assert_eq!(record.title, UNKNOWN_PRODUCT_TITLE);
        assert!(record.provenance.unknown_product);
        assert_eq!(record.energy_kcal_total, None);
        assert!(record.ingredients.is_empty());
    }

    #[test]
    fn test_portion_density_from_item_weights() {
        let mut draft = Draft {
            title: Some("Pasta bake".into()),
            items: vec![
                EvidenceItem {
                    name: "pasta".into(),
                    grams: Some(200.0),
                    ..Default::default()
                },
                EvidenceItem {
                    name: "cheese".into(),
                    grams: Some(100.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        draft.per_package.energy_kcal = Some(600.0);
        let record = finish_record("s1", ScanMode::GenericFood, draft, &ScanConfig::default());
        assert!((record.per_100g.energy_kcal.unwrap() - 200.0).abs() < 1e-9);
        assert_eq!(total_kcal(&record.ingredients), 600);
    }

    #[test]
    fn test_catalog_fill_only_touches_nulls() {
        let mut draft = Draft::default();
        draft.per_100g.energy_kcal = Some(100.0);
        let product = ProductRecord {
            per_100g: NutrientSet {
                energy_kcal: Some(999.0),
                protein_g: Some(3.0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(draft.has_missing_macros());
        assert!(draft.fill_from_catalog(&product));
        assert_eq!(draft.per_100g.energy_kcal, Some(100.0));
        assert_eq!(draft.per_100g.protein_g, Some(3.0));
        assert!(!draft.fill_from_catalog(&product));
    }

    fn pasta_record() -> NutritionRecord {
        let mut draft = Draft {
            title: Some("Pasta".into()),
            net_quantity: Some(Quantity::grams(200.0)),
            items: items(&["pasta", "olive oil"]),
            ..Default::default()
        };
        draft.per_100g.energy_kcal = Some(400.0);
        let mut record = finish_record("s1", ScanMode::Label, draft, &ScanConfig::default());
        record.alternatives = vec![AlternativeCandidate::new("Other Pasta").with_kcal(1000.0)];
        record
    }

    #[test]
    fn test_recalculate_quantity_rescales() {
        let config = ScanConfig::default();
        let record = pasta_record();
        assert_eq!(record.energy_kcal_total, Some(800.0));

        let next = recalculate_record(
            &record,
            &ScanOverrides {
                quantity_g: Some(300.0),
                ..Default::default()
            },
            &config,
        );
        assert_eq!(next.energy_kcal_total, Some(1200.0));
        assert_eq!(total_kcal(&next.ingredients), 1200);
        assert!(next.provenance.user_overrides);
        // 1000 vs 1200 is now a lower-energy alternative
        assert_eq!(next.alternatives[0].bucket, Bucket::Lower);
    }

    #[test]
    fn test_recalculate_explicit_total_wins() {
        let config = ScanConfig::default();
        let next = recalculate_record(
            &pasta_record(),
            &ScanOverrides {
                energy_kcal_total: Some(500.4),
                quantity_g: Some(300.0),
                title: Some("  Penne  ".into()),
                ..Default::default()
            },
            &config,
        );
        assert_eq!(next.title, "Penne");
        assert_eq!(next.energy_kcal_total, Some(500.0));
        assert_eq!(next.per_package.energy_kcal, Some(500.0));
        assert_eq!(total_kcal(&next.ingredients), 500);
    }

    #[test]
    fn test_recalculate_with_item_kcal() {
        let config = ScanConfig::default();
        let overrides = ScanOverrides {
            items: Some(vec![
                EvidenceItem {
                    name: "rice".into(),
                    kcal: Some(300.0),
                    ..Default::default()
                },
                EvidenceItem {
                    name: "beans".into(),
                    kcal: Some(200.0),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        let next = recalculate_record(&pasta_record(), &overrides, &config);
        assert_eq!(next.energy_kcal_total, Some(500.0));
        let kcal: Vec<Option<i64>> = next.ingredients.iter().map(|r| r.estimated_kcal).collect();
        assert_eq!(kcal, vec![Some(300), Some(200)]);
    }

    #[test]
    fn test_recalculate_clamps_absurd_item_kcal() {
        let config = ScanConfig::default();
        let item = |name: &str| EvidenceItem {
            name: name.into(),
            kcal: Some(1e19),
            ..Default::default()
        };
        let overrides = ScanOverrides {
            items: Some(vec![item("rice"), item("beans")]),
            ..Default::default()
        };
        let next = recalculate_record(&pasta_record(), &overrides, &config);
        assert_eq!(next.energy_kcal_total, Some(MAX_TOTAL_KCAL));
        assert_eq!(total_kcal(&next.ingredients), MAX_TOTAL_KCAL as i64);
    }

    #[test]
    fn test_recalculate_without_overrides_keeps_total() {
        let config = ScanConfig::default();
        let record = pasta_record();
        let next = recalculate_record(&record, &ScanOverrides::default(), &config);
        assert_eq!(next.energy_kcal_total, record.energy_kcal_total);
        assert_eq!(total_kcal(&next.ingredients), 800);
    }

    #[test]
    fn test_rereconcile_redistributes_assumed_rows_only() {
        let config = ScanConfig::default();
        let mut record = NutritionRecord::new("s9", ScanMode::GenericFood, "Rice bowl");
        record.energy_kcal_total = Some(600.0);
        let mut rice = IngredientRow::new(0, "rice");
        rice.estimated_kcal = Some(400);
        let mut salt = IngredientRow::new(1, "salt");
        salt.estimated_kcal = Some(200);
        salt.assumed = true;
        record.ingredients = vec![rice, salt];

        let next = rereconcile_record(&record, &config);
        assert_eq!(total_kcal(&next.ingredients), 600);
        assert_eq!(next.ingredients[1].category, IngredientCategory::Salt);
        assert_eq!(next.ingredients[1].estimated_kcal, Some(0));
        assert_eq!(next.ingredients[0].estimated_kcal, Some(600));
    }
}
