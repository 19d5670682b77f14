//! Keyword tables
//!
//! Hand-tuned word lists used by lexical heuristics: ingredient categories,
//! icons, plain-water and coffee detection, language markers and placeholder
//! titles. Built-in defaults can be replaced section by section from a JSON
//! file (see `AppConfig`).

use serde::{Deserialize, Serialize};

use crate::models::IngredientCategory;

/// Keywords per ingredient category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryKeywords {
    pub salt: Vec<String>,
    pub sugar: Vec<String>,
    pub fat: Vec<String>,
    pub starch: Vec<String>,
    pub seasoning: Vec<String>,
    pub veg: Vec<String>,
}

/// One icon and the words that select it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconRule {
    pub icon: String,
    pub keywords: Vec<String>,
}

/// All keyword data driving the lexical heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    pub categories: CategoryKeywords,
    pub icons: Vec<IconRule>,
    pub default_icon: String,
    pub water: Vec<String>,
    pub water_exclusions: Vec<String>,
    pub coffee: Vec<String>,
    pub english_markers: Vec<String>,
    pub foreign_markers: Vec<String>,
    pub placeholder_titles: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for CategoryKeywords {
    fn default() -> Self {
        Self {
            salt: words(&["salt", "sea salt", "table salt", "sodium chloride", "sel", "salz", "sal"]),
            sugar: words(&[
                "sugar", "cane sugar", "brown sugar", "syrup", "glucose", "fructose", "dextrose",
                "sucrose", "honey", "molasses", "caramel", "chocolate", "sweetener", "jam",
                "zucker", "sucre", "azucar",
            ]),
            fat: words(&[
                "oil", "olive oil", "sunflower oil", "palm oil", "butter", "peanut butter",
                "cream", "cheese", "mayonnaise", "mayo", "lard", "margarine", "ghee", "bacon",
                "avocado", "nut", "almond", "walnut", "tahini", "pesto",
            ]),
            starch: words(&[
                "rice", "pasta", "noodle", "spaghetti", "bread", "bun", "roll", "flour",
                "wheat flour", "potato", "fries", "wheat", "oat", "corn", "tortilla", "dough",
                "quinoa", "couscous", "cereal", "cracker", "bagel", "pizza base", "crust",
                "breadcrumb", "starch", "semolina", "barley", "lentil", "bean", "chickpea",
            ]),
            seasoning: words(&[
                "pepper", "black pepper", "spice", "spices", "herb", "herbs", "seasoning",
                "garlic powder", "onion powder", "paprika", "cumin", "oregano", "basil",
                "thyme", "rosemary", "parsley", "cinnamon", "chili flakes", "curry powder",
                "ginger", "turmeric", "vinegar", "soy sauce", "mustard", "ketchup",
                "yeast extract", "flavouring", "flavoring", "flavour", "flavor", "stock",
                "bouillon",
            ]),
            veg: words(&[
                "onion", "garlic", "tomato", "lettuce", "salad", "carrot", "spinach",
                "cucumber", "bell pepper", "zucchini", "courgette", "broccoli", "cabbage",
                "mushroom", "celery", "leek", "kale", "pea", "snap peas", "green beans",
                "eggplant", "aubergine", "radish", "rocket", "arugula",
            ]),
        }
    }
}

impl Default for KeywordTables {
    fn default() -> Self {
        let icon = |icon: &str, kws: &[&str]| IconRule {
            icon: icon.to_string(),
            keywords: words(kws),
        };
        Self {
            categories: CategoryKeywords::default(),
            icons: vec![
                icon("☕", &["coffee", "espresso", "latte", "cappuccino", "americano", "flat white"]),
                icon("🍵", &["tea", "matcha"]),
                icon("💧", &["water", "mineral water"]),
                icon("🧃", &["juice", "smoothie"]),
                icon("🥛", &["milk", "yogurt", "yoghurt", "kefir"]),
                icon("🍺", &["beer", "lager", "ale"]),
                icon("🍷", &["wine"]),
                icon("🥤", &["cola", "soda", "lemonade", "soft drink", "energy drink"]),
                icon("🍕", &["pizza"]),
                icon("🍔", &["burger", "cheeseburger"]),
                icon("🍝", &["pasta", "spaghetti", "lasagna", "noodle"]),
                icon("🍚", &["rice", "risotto"]),
                icon("🍣", &["sushi"]),
                icon("🥗", &["salad"]),
                icon("🍲", &["soup", "stew", "curry"]),
                icon("🥣", &["cereal", "granola", "muesli", "porridge"]),
                icon("🍞", &["bread", "toast", "bagel", "sandwich"]),
                icon("🧀", &["cheese"]),
                icon("🍫", &["chocolate"]),
                icon("🍪", &["cookie", "biscuit"]),
                icon("🍰", &["cake", "pastry", "muffin"]),
                icon("🍦", &["ice cream", "gelato"]),
                icon("🥚", &["egg", "omelette"]),
                icon("🍗", &["chicken", "poultry"]),
                icon("🥩", &["steak", "beef", "pork", "meat"]),
                icon("🐟", &["fish", "salmon", "tuna"]),
                icon("🍎", &["apple"]),
                icon("🍌", &["banana"]),
                icon("🍓", &["strawberry", "berries", "berry"]),
                icon("🥜", &["peanut", "nuts", "almond"]),
                icon("🍟", &["fries", "chips", "crisps"]),
            ],
            default_icon: "🍽️".to_string(),
            water: words(&[
                "water", "mineral water", "spring water", "sparkling water", "still water",
                "tap water", "agua", "eau", "wasser", "acqua",
            ]),
            water_exclusions: words(&[
                "coconut", "tonic", "flavored", "flavoured", "vitamin", "juice", "infused",
                "lemon", "lime", "sweetened", "rose", "melon", "cucumber", "protein", "sugar",
                "enhanced",
            ]),
            coffee: words(&[
                "coffee", "espresso", "latte", "cappuccino", "americano", "flat white",
                "macchiato", "mocha", "cortado", "ristretto", "lungo", "kaffee", "cafe",
            ]),
            english_markers: words(&[
                "and", "with", "ingredients", "contains", "sugar", "salt", "water", "flour",
                "milk", "of", "may", "per", "serving",
            ]),
            foreign_markers: words(&[
                "und", "mit", "zutaten", "zucker", "salz", "wasser", "mehl", "enthalt", "avec",
                "et", "sucre", "sel", "eau", "farine", "ingrédients", "contient", "con", "y",
                "azucar", "agua", "harina", "ingredientes", "zucchero", "acqua", "farina",
                "ingredienti", "suiker", "zout", "bloem", "ingredienten", "voedingswaarde",
                "nährwerte", "valeurs", "nutritionnelles",
            ]),
            placeholder_titles: words(&[
                "", "scanned meal", "scanned item", "scanned product", "unknown",
                "unknown product", "unknown food", "food", "meal", "product", "untitled",
                "n/a",
            ]),
        }
    }
}

/// Lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether the phrase occurs as a token sequence; the last word may be plural
pub(crate) fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    let last = needle.len() - 1;
    tokens.windows(needle.len()).any(|window| {
        window.iter().zip(&needle).enumerate().all(|(j, (tok, kw))| {
            tok == kw
                || (j == last
                    && (tok.strip_suffix('s') == Some(kw.as_str())
                        || tok.strip_suffix("es") == Some(kw.as_str())))
        })
    })
}

fn longest_match(tokens: &[String], keywords: &[String]) -> Option<usize> {
    keywords
        .iter()
        .filter(|kw| contains_phrase(tokens, kw))
        .map(|kw| kw.chars().count())
        .max()
}

impl KeywordTables {
    /// Lexical ingredient category; the longest matching keyword wins and
    /// ties go to the earlier category in salt, sugar, fat, starch, seasoning, veg
    pub fn classify_ingredient(&self, name: &str) -> IngredientCategory {
        let tokens = tokenize(name);
        let c = &self.categories;
        let ordered: [(IngredientCategory, &Vec<String>); 6] = [
            (IngredientCategory::Salt, &c.salt),
            (IngredientCategory::Sugar, &c.sugar),
            (IngredientCategory::Fat, &c.fat),
            (IngredientCategory::Starch, &c.starch),
            (IngredientCategory::Seasoning, &c.seasoning),
            (IngredientCategory::Veg, &c.veg),
        ];

        let mut best: Option<(IngredientCategory, usize)> = None;
        for (category, keywords) in ordered {
            if let Some(len) = longest_match(&tokens, keywords) {
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((category, len));
                }
            }
        }
        best.map(|(category, _)| category).unwrap_or(IngredientCategory::Other)
    }

    /// Plain, unflavoured water
    pub fn is_plain_water(&self, text: &str) -> bool {
        let tokens = tokenize(text);
        longest_match(&tokens, &self.water).is_some()
            && longest_match(&tokens, &self.water_exclusions).is_none()
    }

    pub fn is_coffee(&self, text: &str) -> bool {
        longest_match(&tokenize(text), &self.coffee).is_some()
    }

    /// First icon rule matching the text
    pub fn icon_for(&self, text: &str) -> Option<&str> {
        let tokens = tokenize(text);
        self.icons
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| contains_phrase(&tokens, kw)))
            .map(|rule| rule.icon.as_str())
    }

    pub fn is_placeholder_title(&self, title: &str) -> bool {
        let normalized = title.trim().to_lowercase();
        self.placeholder_titles.iter().any(|p| p.trim().to_lowercase() == normalized)
    }

    /// Heuristic: many non-ASCII letters, or foreign marker words outnumber
    /// English ones
    pub fn looks_non_english(&self, text: &str) -> bool {
        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() < 3 {
            return false;
        }
        let non_ascii = letters.iter().filter(|c| !c.is_ascii()).count();
        if non_ascii as f64 / letters.len() as f64 > 0.15 {
            return true;
        }

        let tokens = tokenize(text);
        let count = |markers: &[String]| {
            tokens
                .iter()
                .filter(|t| markers.iter().any(|m| m == *t))
                .count()
        };
        let english = count(&self.english_markers);
        let foreign = count(&self.foreign_markers);
        foreign >= 2 && foreign > english
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> KeywordTables {
        KeywordTables::default()
    }

    #[test]
    fn test_classify_basic_categories() {
        let t = tables();
        assert_eq!(t.classify_ingredient("Sea Salt"), IngredientCategory::Salt);
        assert_eq!(t.classify_ingredient("white rice"), IngredientCategory::Starch);
        assert_eq!(t.classify_ingredient("olive oil"), IngredientCategory::Fat);
        assert_eq!(t.classify_ingredient("cane sugar"), IngredientCategory::Sugar);
        assert_eq!(t.classify_ingredient("dried oregano"), IngredientCategory::Seasoning);
        assert_eq!(t.classify_ingredient("onions"), IngredientCategory::Veg);
        assert_eq!(t.classify_ingredient("chicken breast"), IngredientCategory::Other);
    }

    #[test]
    fn test_classify_longest_keyword_wins() {
        let t = tables();
        assert_eq!(t.classify_ingredient("red bell pepper"), IngredientCategory::Veg);
        assert_eq!(t.classify_ingredient("black pepper"), IngredientCategory::Seasoning);
        assert_eq!(t.classify_ingredient("garlic powder"), IngredientCategory::Seasoning);
        assert_eq!(t.classify_ingredient("garlic"), IngredientCategory::Veg);
        // "salted" is not "salt"
        assert_eq!(t.classify_ingredient("salted butter"), IngredientCategory::Fat);
        assert_eq!(t.classify_ingredient("potatoes"), IngredientCategory::Starch);
    }

    #[test]
    fn test_plain_water_detection() {
        let t = tables();
        assert!(t.is_plain_water("Still Mineral Water 500ml"));
        assert!(t.is_plain_water("glass of water"));
        assert!(!t.is_plain_water("Coconut Water"));
        assert!(!t.is_plain_water("Tonic water"));
        assert!(!t.is_plain_water("Orange juice"));
    }

    #[test]
    fn test_icons_and_placeholders() {
        let t = tables();
        assert_eq!(t.icon_for("Iced Latte"), Some("☕"));
        assert_eq!(t.icon_for("Margherita pizza slice"), Some("🍕"));
        assert_eq!(t.icon_for("zzz"), None);
        assert!(t.is_placeholder_title("  Scanned meal "));
        assert!(t.is_placeholder_title(""));
        assert!(!t.is_placeholder_title("Chicken curry"));
    }

    #[test]
    fn test_language_heuristic() {
        let t = tables();
        assert!(t.looks_non_english("Zutaten: Weizenmehl, Zucker, Salz und Wasser"));
        assert!(t.looks_non_english("Ingrédients : farine de blé, sucre, sel"));
        assert!(t.looks_non_english("ライス、鶏肉、醤油"));
        assert!(!t.looks_non_english("Ingredients: wheat flour, sugar, salt and water"));
        assert!(!t.looks_non_english("ok"));
    }

    #[test]
    fn test_partial_json_override_keeps_defaults() {
        let json = r#"{ "default_icon": "*", "coffee": ["kopi"] }"#;
        let t: KeywordTables = serde_json::from_str(json).unwrap();
        assert_eq!(t.default_icon, "*");
        assert!(t.is_coffee("kopi susu"));
        assert!(!t.is_coffee("espresso"));
        assert_eq!(t.categories, CategoryKeywords::default());
    }
}
