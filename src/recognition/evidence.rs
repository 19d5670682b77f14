//! Recognition evidence
//!
//! The untrusted output of one recognition call, read leniently from JSON.
//! Unknown keys are ignored, numbers may arrive as strings with units, and a
//! body that is not JSON at all is simply empty evidence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::services::RecognitionTask;
use crate::models::{AlternativeCandidate, RawNutrients};
use crate::nutrition::converter::normalize_energy;
use crate::nutrition::KeywordTables;
use crate::products::DigitCandidate;

/// One ingredient as reported by a recognition call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub name: String,
    pub grams: Option<f64>,
    pub kcal_per_100g: Option<f64>,
    pub kcal: Option<f64>,
}

/// Drink cues as reported by a recognition call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeverageEvidence {
    pub kind: Option<String>,
    pub container: Option<String>,
    pub capacity_ml: Option<f64>,
    pub fill_percent: Option<f64>,
    pub volume_ml: Option<f64>,
    pub cups: Option<f64>,
    pub description: Option<String>,
}

impl BeverageEvidence {
    fn merge_missing(&mut self, other: BeverageEvidence) {
        self.kind = self.kind.take().or(other.kind);
        self.container = self.container.take().or(other.container);
        self.capacity_ml = self.capacity_ml.or(other.capacity_ml);
        self.fill_percent = self.fill_percent.or(other.fill_percent);
        self.volume_ml = self.volume_ml.or(other.volume_ml);
        self.cups = self.cups.or(other.cups);
        self.description = self.description.take().or(other.description);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionEvidence {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub per_100g: RawNutrients,
    pub per_serving: RawNutrients,
    pub per_package: RawNutrients,
    /// As printed, e.g. "1 cup (240 ml)"
    pub serving_size: Option<String>,
    pub servings_per_package: Option<f64>,
    /// As printed, e.g. "6 x 330 ml"
    pub net_quantity: Option<String>,
    pub items: Vec<EvidenceItem>,
    pub digits: Vec<DigitCandidate>,
    pub beverage: Option<BeverageEvidence>,
    pub text: Option<String>,
    pub alternatives: Vec<AlternativeCandidate>,
}

// ============================================================================
// Lenient value readers
// ============================================================================

/// Numbers, or strings like "250 kcal", "12,5 g", "<0.5"
pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '~' | '≈'));
    let chars: Vec<char> = trimmed.chars().collect();
    let mut number = String::new();
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_digit() {
            number.push(*c);
        } else if (*c == '.' || *c == ',')
            && !number.is_empty()
            && !number.contains('.')
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
        {
            number.push('.');
        } else {
            break;
        }
    }
    number.parse().ok()
}

fn parse_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(parse_number)
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(parse_text)
}

const ENERGY_KCAL_KEYS: &[&str] = &["energy_kcal", "calories", "kcal", "calories_kcal", "energy"];

/// Read a nutrient object using the common key spellings
pub fn parse_nutrients(obj: &Map<String, Value>) -> RawNutrients {
    RawNutrients {
        energy_kcal: number_field(obj, ENERGY_KCAL_KEYS),
        energy_kj: number_field(obj, &["energy_kj", "kj", "kilojoules"]),
        protein_g: number_field(obj, &["protein_g", "protein", "proteins"]),
        fat_g: number_field(obj, &["fat_g", "fat", "total_fat"]),
        carbs_g: number_field(obj, &["carbs_g", "carbs", "carbohydrates", "carbohydrate", "total_carbohydrate"]),
        sugar_g: number_field(obj, &["sugar_g", "sugar", "sugars"]),
        fiber_g: number_field(obj, &["fiber_g", "fiber", "fibre", "dietary_fiber"]),
        sodium_mg: number_field(obj, &["sodium_mg", "sodium"]),
        salt_g: number_field(obj, &["salt_g", "salt"]),
        calcium_mg: number_field(obj, &["calcium_mg", "calcium"]),
    }
}

/// Split printed ingredient text on top-level commas
pub(crate) fn split_ingredient_text(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth = (depth - 1).max(0);
                current.push(c);
            }
            ',' | ';' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().trim_end_matches('.').trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_items(value: &Value) -> Vec<EvidenceItem> {
    match value {
        Value::String(text) => split_ingredient_text(text)
            .into_iter()
            .map(|name| EvidenceItem {
                name,
                ..Default::default()
            })
            .collect(),
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(_) => parse_text(entry).map(|name| EvidenceItem {
                    name,
                    ..Default::default()
                }),
                Value::Object(obj) => text_field(obj, &["name", "ingredient", "item"]).map(|name| EvidenceItem {
                    name,
                    grams: number_field(obj, &["grams", "estimated_grams", "weight_g", "amount_g"]),
                    kcal_per_100g: number_field(obj, &["kcal_per_100g", "calories_per_100g"]),
                    kcal: number_field(obj, &["kcal", "estimated_kcal", "calories"]),
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_digits(obj: &Map<String, Value>) -> Vec<DigitCandidate> {
    let mut digits = Vec::new();
    if let Some(Value::Array(entries)) = field(obj, &["candidates", "digit_candidates"]) {
        for (i, entry) in entries.iter().enumerate() {
            // unscored readings rank in the order given
            let fallback_confidence = 1.0 - i as f64 * 0.1;
            match entry {
                Value::Object(c) => {
                    if let Some(d) = text_field(c, &["digits", "code", "barcode"]) {
                        let confidence = number_field(c, &["confidence", "score"]).unwrap_or(fallback_confidence);
                        digits.push(DigitCandidate::new(d, confidence));
                    }
                }
                other => {
                    if let Some(d) = parse_text(other) {
                        digits.push(DigitCandidate::new(d, fallback_confidence));
                    }
                }
            }
        }
    }
    if digits.is_empty() {
        if let Some(d) = text_field(obj, &["digits", "barcode", "code"]) {
            let confidence = number_field(obj, &["confidence"]).unwrap_or(1.0);
            digits.push(DigitCandidate::new(d, confidence));
        }
    }
    digits
}

fn parse_beverage(obj: &Map<String, Value>) -> Option<BeverageEvidence> {
    let Some(Value::Object(b)) = field(obj, &["beverage", "drink"]) else {
        return None;
    };
    Some(BeverageEvidence {
        kind: text_field(b, &["kind", "type"]),
        container: text_field(b, &["container", "vessel"]),
        capacity_ml: number_field(b, &["capacity_ml", "container_ml"]),
        fill_percent: number_field(b, &["fill_percent", "fill"]),
        volume_ml: number_field(b, &["volume_ml", "ml"]),
        cups: number_field(b, &["cups", "cup_count"]),
        description: text_field(b, &["description", "notes"]),
    })
}

fn parse_alternatives(obj: &Map<String, Value>) -> Vec<AlternativeCandidate> {
    let Some(Value::Array(entries)) = field(obj, &["alternatives", "suggestions"]) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|a| {
            let name = text_field(a, &["name", "product_name", "title"])?;
            Some(AlternativeCandidate {
                brand: text_field(a, &["brand"]),
                name,
                variant: text_field(a, &["variant", "size"]),
                calories_per_package_kcal: number_field(
                    a,
                    &["calories_per_package_kcal", "calories_per_package", "calories", "kcal"],
                ),
                bucket: Default::default(),
                source_label: text_field(a, &["bucket", "category", "label"]),
            })
        })
        .collect()
}

/// Drop a surrounding markdown code fence, or any prose around the JSON object
fn json_slice(body: &str) -> &str {
    let trimmed = body.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .map(|rest| {
            let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        })
        .unwrap_or(trimmed);
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

impl RecognitionEvidence {
    /// Parse a raw response body; anything unreadable is empty evidence
    pub fn parse(body: &str, task: RecognitionTask) -> Self {
        match serde_json::from_str::<Value>(json_slice(body)) {
            Ok(Value::Object(obj)) => Self::from_object(&obj, task),
            Ok(_) | Err(_) => {
                tracing::debug!(task = task.as_str(), "recognition response was not a JSON object");
                Self::default()
            }
        }
    }

    pub fn from_object(obj: &Map<String, Value>, task: RecognitionTask) -> Self {
        let nested = |keys: &[&str]| match field(obj, keys) {
            Some(Value::Object(o)) => parse_nutrients(o),
            _ => RawNutrients::default(),
        };

        let mut per_100g = nested(&["per_100g", "per100g", "per_100ml"]);
        let mut per_serving = nested(&["per_serving", "serving_nutrition"]);
        let mut per_package = nested(&["per_package", "total", "per_portion"]);

        // bare top-level values: whole portion for dish analyses, one serving on labels
        let top = parse_nutrients(obj);
        match task {
            RecognitionTask::CombinedFoodAnalysis | RecognitionTask::VisualFoodAnalysis => {
                per_package.merge_missing(&top)
            }
            _ => per_serving.merge_missing(&top),
        }
        if let Some(kj) = number_field(obj, &["energy_kj_100g"]) {
            per_100g.energy_kj = per_100g.energy_kj.or(Some(kj));
        }

        let items = field(obj, &["items", "ingredients", "ingredient_list"])
            .map(parse_items)
            .unwrap_or_default();

        Self {
            title: text_field(obj, &["title", "name", "product_name", "food_name"]),
            brand: text_field(obj, &["brand", "brand_name"]),
            category: text_field(obj, &["category", "food_category"]),
            icon: text_field(obj, &["icon", "emoji"]),
            per_100g,
            per_serving,
            per_package,
            serving_size: text_field(obj, &["serving_size", "serving"]),
            servings_per_package: number_field(obj, &["servings_per_package", "servings", "servings_per_container"]),
            net_quantity: text_field(obj, &["net_quantity", "net_weight", "quantity", "package_size"]),
            items,
            digits: parse_digits(obj),
            beverage: parse_beverage(obj),
            text: text_field(obj, &["text", "raw_text", "ocr_text"]),
            alternatives: parse_alternatives(obj),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Best known energy: package, then serving, in kcal
    pub fn energy_kcal(&self) -> Option<f64> {
        normalize_energy(self.per_package.energy_kcal, self.per_package.energy_kj)
            .or_else(|| normalize_energy(self.per_serving.energy_kcal, self.per_serving.energy_kj))
    }

    /// Fill still-empty fields from a later source. Populated fields never change.
    pub fn merge_missing(&mut self, other: RecognitionEvidence) {
        self.title = self.title.take().or(other.title);
        self.brand = self.brand.take().or(other.brand);
        self.category = self.category.take().or(other.category);
        self.icon = self.icon.take().or(other.icon);
        self.per_100g.merge_missing(&other.per_100g);
        self.per_serving.merge_missing(&other.per_serving);
        self.per_package.merge_missing(&other.per_package);
        self.serving_size = self.serving_size.take().or(other.serving_size);
        self.servings_per_package = self.servings_per_package.or(other.servings_per_package);
        self.net_quantity = self.net_quantity.take().or(other.net_quantity);
        self.text = self.text.take().or(other.text);

        if self.items.is_empty() {
            self.items = other.items;
        } else {
            for item in other.items {
                let key = item.name.to_lowercase();
                if !self.items.iter().any(|i| i.name.to_lowercase() == key) {
                    self.items.push(item);
                }
            }
        }

        self.digits.extend(other.digits);
        self.alternatives.extend(other.alternatives);

        if let Some(theirs) = other.beverage {
            if let Some(mine) = self.beverage.as_mut() {
                mine.merge_missing(theirs);
            } else {
                self.beverage = Some(theirs);
            }
        }
    }

    /// Replace text fields with translated ones. Numbers are never taken from
    /// the translation.
    pub fn apply_translation(&mut self, translated: &RecognitionEvidence) {
        if let Some(title) = &translated.title {
            self.title = Some(title.clone());
        }
        if let Some(category) = &translated.category {
            self.category = Some(category.clone());
        }
        if translated.items.len() == self.items.len() {
            for (item, t) in self.items.iter_mut().zip(&translated.items) {
                item.name = t.name.clone();
            }
        }
    }

    /// Clear a placeholder title, and a zero whole-portion energy from a dish
    /// analysis, which means the pass did not estimate it
    pub fn discard_placeholders(&mut self, keywords: &KeywordTables) {
        if self.title.as_deref().is_some_and(|t| keywords.is_placeholder_title(t)) {
            self.title = None;
        }
        if self.per_package.energy_kcal.is_some_and(|k| k <= 0.0) {
            self.per_package.energy_kcal = None;
        }
        if self.per_package.energy_kj.is_some_and(|kj| kj <= 0.0) {
            self.per_package.energy_kj = None;
        }
    }

    /// Title, category, items and raw text joined for keyword heuristics
    pub fn text_blob(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.title.as_deref());
        parts.extend(self.category.as_deref());
        parts.extend(self.items.iter().map(|i| i.name.as_str()));
        parts.extend(self.text.as_deref());
        parts.join(" ")
    }
}

/// Run order of a stage's contribution is preserved; merging is order-stable
pub fn merge_in_order(sources: impl IntoIterator<Item = RecognitionEvidence>) -> RecognitionEvidence {
    sources.into_iter().fold(RecognitionEvidence::default(), |mut acc, e| {
        acc.merge_missing(e);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(parse_number(&Value::from(12.5)), Some(12.5));
        assert_eq!(parse_number(&Value::from("250 kcal")), Some(250.0));
        assert_eq!(parse_number(&Value::from("12,5 g")), Some(12.5));
        assert_eq!(parse_number(&Value::from("<0.5g")), Some(0.5));
        assert_eq!(parse_number(&Value::from("n/a")), None);
        assert_eq!(parse_number(&Value::Null), None);
    }

    #[test]
    fn test_malformed_body_is_empty() {
        let e = RecognitionEvidence::parse("sorry, I cannot help", RecognitionTask::LabelParse);
        assert!(e.is_empty());
        let e = RecognitionEvidence::parse("[1, 2, 3]", RecognitionTask::LabelParse);
        assert!(e.is_empty());
        let e = RecognitionEvidence::parse("{\"title\": ", RecognitionTask::LabelParse);
        assert!(e.is_empty());
    }

    #[test]
    fn test_code_fence_and_aliases() {
        let body = "```json\n{\"product_name\": \"Granola\", \"per_100g\": {\"kj\": \"1850 kJ\", \"salt\": 0.3}, \"calories\": 210}\n```";
        let e = RecognitionEvidence::parse(body, RecognitionTask::LabelParse);
        assert_eq!(e.title.as_deref(), Some("Granola"));
        assert_eq!(e.per_100g.energy_kj, Some(1850.0));
        assert_eq!(e.per_100g.salt_g, Some(0.3));
        assert_eq!(e.per_serving.energy_kcal, Some(210.0));
        assert_eq!(e.per_package.energy_kcal, None);
    }

    #[test]
    fn test_dish_calories_are_whole_portion() {
        let body = r#"{"title": "Pasta", "calories": 640, "items": ["spaghetti", {"name": "olive oil", "grams": 10}]}"#;
        let e = RecognitionEvidence::parse(body, RecognitionTask::CombinedFoodAnalysis);
        assert_eq!(e.per_package.energy_kcal, Some(640.0));
        assert_eq!(e.energy_kcal(), Some(640.0));
        assert_eq!(e.items.len(), 2);
        assert_eq!(e.items[1].grams, Some(10.0));
    }

    #[test]
    fn test_ingredient_text_split() {
        let body = r#"{"ingredients": "Wheat flour, sugar, palm oil, emulsifiers (soy lecithin, E476), salt."}"#;
        let e = RecognitionEvidence::parse(body, RecognitionTask::LabelParse);
        let names: Vec<&str> = e.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Wheat flour", "sugar", "palm oil", "emulsifiers (soy lecithin, E476)", "salt"]
        );
    }

    #[test]
    fn test_digit_candidates() {
        let body = r#"{"candidates": [{"digits": "4006381333931", "confidence": 0.8}, "036000291452"]}"#;
        let e = RecognitionEvidence::parse(body, RecognitionTask::DigitOcr);
        assert_eq!(e.digits.len(), 2);
        assert_eq!(e.digits[0].confidence, 0.8);
        assert!((e.digits[1].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_merge_first_non_null_wins() {
        let mut first = RecognitionEvidence {
            title: Some("Lasagne".into()),
            items: vec![EvidenceItem {
                name: "Pasta".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        first.per_package.energy_kcal = Some(700.0);

        let mut second = RecognitionEvidence {
            title: Some("Casserole".into()),
            category: Some("pasta dish".into()),
            items: vec![
                EvidenceItem {
                    name: "pasta".into(),
                    grams: Some(200.0),
                    ..Default::default()
                },
                EvidenceItem {
                    name: "Beef".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        second.per_package.energy_kcal = Some(900.0);
        second.per_package.fat_g = Some(30.0);

        first.merge_missing(second);
        assert_eq!(first.title.as_deref(), Some("Lasagne"));
        assert_eq!(first.category.as_deref(), Some("pasta dish"));
        assert_eq!(first.per_package.energy_kcal, Some(700.0));
        assert_eq!(first.per_package.fat_g, Some(30.0));
        let names: Vec<&str> = first.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Pasta", "Beef"]);
        assert_eq!(first.items[0].grams, None);
    }

    #[test]
    fn test_discard_placeholders() {
        let mut e = RecognitionEvidence::parse(
            r#"{"title": "Scanned meal", "calories": 0, "protein_g": 0}"#,
            RecognitionTask::CombinedFoodAnalysis,
        );
        e.discard_placeholders(&KeywordTables::default());
        assert_eq!(e.title, None);
        assert_eq!(e.per_package.energy_kcal, None);
        assert_eq!(e.per_package.protein_g, Some(0.0));

        let mut e = RecognitionEvidence::parse(
            r#"{"title": "Lentil soup", "kj": 0}"#,
            RecognitionTask::CombinedFoodAnalysis,
        );
        assert_eq!(e.per_package.energy_kj, Some(0.0));
        e.discard_placeholders(&KeywordTables::default());
        assert_eq!(e.per_package.energy_kj, None);
        assert_eq!(e.energy_kcal(), None);
    }

    #[test]
    fn test_translation_keeps_numbers() {
        let mut e = RecognitionEvidence::parse(
            r#"{"title": "Käse", "calories": 350, "items": ["Milch", "Salz"]}"#,
            RecognitionTask::LabelParse,
        );
        let t = RecognitionEvidence::parse(
            r#"{"title": "Cheese", "calories": 1, "items": ["Milk", "Salt"]}"#,
            RecognitionTask::LanguageNormalization,
        );
        e.apply_translation(&t);
        assert_eq!(e.title.as_deref(), Some("Cheese"));
        assert_eq!(e.items[1].name, "Salt");
        assert_eq!(e.per_serving.energy_kcal, Some(350.0));
    }
}
