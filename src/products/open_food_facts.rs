//! Open Food Facts product database client
//!
//! Barcode lookup through `/api/v2/product/{code}.json` and free-text search
//! through `/cgi/search.pl`. Nutriments arrive per 100 g with sodium and
//! calcium in grams; they are converted to the crate's units on the way in.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{ProductQuery, ProductRecord};
use crate::models::RawNutrients;
use crate::nutrition::converter::{normalize_nutrients, parse_quantity, parse_serving_size, Quantity};
use crate::nutrition::units::MG_PER_G;
use crate::recognition::evidence::parse_number;
use crate::recognition::services::{ProductDatabase, ServiceError};

const SERVICE_NAME: &str = "open_food_facts";
const REQUEST_TIMEOUT_SECS: u64 = 15;
const SEARCH_PAGE_SIZE: u32 = 20;

pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("nutriscan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ProductDatabase for OpenFoodFactsClient {
    async fn lookup_by_barcode(&self, code: &str) -> Result<Option<ProductRecord>, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("api/v2/product/{code}.json")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(code, "barcode not in product database");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: SERVICE_NAME,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        Ok(product_from_lookup(code, &body))
    }

    async fn search_by_text(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, ServiceError> {
        let Some(terms) = query.search_terms() else {
            return Ok(Vec::new());
        };

        let page_size = SEARCH_PAGE_SIZE.to_string();
        let response = self
            .client
            .get(self.url("cgi/search.pl"))
            .query(&[
                ("search_terms", terms.as_str()),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: SERVICE_NAME,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        let products = products_from_search(&body);
        info!(terms = %terms, results = products.len(), "product search complete");
        Ok(products)
    }
}

/// `status == 1` means found
pub fn product_from_lookup(code: &str, body: &Value) -> Option<ProductRecord> {
    let found = body.get("status").and_then(parse_number) == Some(1.0);
    let product = body.get("product").and_then(Value::as_object)?;
    found.then(|| product_from_object(Some(code), product))
}

pub fn products_from_search(body: &Value) -> Vec<ProductRecord> {
    body.get("products")
        .and_then(Value::as_array)
        .map(|products| {
            products
                .iter()
                .filter_map(Value::as_object)
                .map(|p| product_from_object(None, p))
                .filter(|p| p.name.is_some())
                .collect()
        })
        .unwrap_or_default()
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Nutriments for one basis suffix ("100g" or "serving")
fn nutriments(n: &Map<String, Value>, basis: &str) -> RawNutrients {
    let get = |name: &str| n.get(&format!("{name}_{basis}")).and_then(parse_number);
    RawNutrients {
        energy_kcal: get("energy-kcal"),
        energy_kj: get("energy-kj").or_else(|| get("energy")),
        protein_g: get("proteins"),
        fat_g: get("fat"),
        carbs_g: get("carbohydrates"),
        sugar_g: get("sugars"),
        fiber_g: get("fiber"),
        sodium_mg: get("sodium").map(|g| g * MG_PER_G),
        salt_g: get("salt"),
        calcium_mg: get("calcium").map(|g| g * MG_PER_G),
    }
}

fn product_from_object(code: Option<&str>, p: &Map<String, Value>) -> ProductRecord {
    let empty = Map::new();
    let n = p.get("nutriments").and_then(Value::as_object).unwrap_or(&empty);

    let serving_label = text(p, "serving_size");
    let serving_size = p
        .get("serving_quantity")
        .and_then(parse_number)
        .filter(|g| *g > 0.0)
        .map(Quantity::grams)
        .or_else(|| serving_label.as_deref().and_then(parse_serving_size));

    let net_quantity = text(p, "quantity").as_deref().and_then(parse_quantity).or_else(|| {
        p.get("product_quantity")
            .and_then(parse_number)
            .filter(|v| *v > 0.0)
            .map(Quantity::grams)
    });

    // "Brand A, Brand B" lists the owner first; categories run general -> specific
    let brand = text(p, "brands").and_then(|b| b.split(',').next().map(|s| s.trim().to_string()));
    let category = text(p, "categories").and_then(|c| c.rsplit(',').next().map(|s| s.trim().to_string()));

    ProductRecord {
        barcode: code.map(str::to_string).or_else(|| text(p, "code")),
        name: text(p, "product_name")
            .or_else(|| text(p, "product_name_en"))
            .or_else(|| text(p, "generic_name")),
        brand: brand.filter(|b| !b.is_empty()),
        category: category.filter(|c| !c.is_empty()),
        per_100g: normalize_nutrients(&nutriments(n, "100g")),
        per_serving: normalize_nutrients(&nutriments(n, "serving")),
        serving_size,
        serving_label,
        servings_per_package: None,
        net_quantity,
        ingredients_text: text(p, "ingredients_text_en").or_else(|| text(p, "ingredients_text")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_found() {
        let body = json!({
            "status": 1,
            "product": {
                "product_name": "Nutella",
                "brands": "Ferrero, Nutella",
                "categories": "Spreads, Sweet spreads, Hazelnut spreads",
                "quantity": "400 g",
                "serving_size": "15 g",
                "serving_quantity": "15",
                "ingredients_text": "Sugar, palm oil, hazelnuts 13%",
                "nutriments": {
                    "energy-kcal_100g": 539,
                    "energy-kj_100g": 2252,
                    "fat_100g": 30.9,
                    "sugars_100g": 56.3,
                    "salt_100g": 0.107,
                    "sodium_100g": 0.0428,
                    "calcium_100g": 0.108
                }
            }
        });
        let product = product_from_lookup("3017620422003", &body).unwrap();
        assert_eq!(product.barcode.as_deref(), Some("3017620422003"));
        assert_eq!(product.name.as_deref(), Some("Nutella"));
        assert_eq!(product.brand.as_deref(), Some("Ferrero"));
        assert_eq!(product.category.as_deref(), Some("Hazelnut spreads"));
        assert_eq!(product.per_100g.energy_kcal, Some(539.0));
        assert!((product.per_100g.sodium_mg.unwrap() - 42.8).abs() < 1e-9);
        assert!((product.per_100g.calcium_mg.unwrap() - 108.0).abs() < 1e-9);
        assert_eq!(product.per_100g.protein_g, None);
        assert_eq!(product.net_quantity, Some(Quantity::grams(400.0)));
        assert_eq!(product.serving_size, Some(Quantity::grams(15.0)));
        assert!((product.calories_per_package().unwrap() - 2156.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_not_found() {
        let body = json!({"status": 0, "status_verbose": "product not found"});
        assert!(product_from_lookup("0000000000000", &body).is_none());
    }

    #[test]
    fn test_kj_only_product() {
        let body = json!({
            "status": 1,
            "product": {"product_name": "Crispbread", "nutriments": {"energy_100g": 1548}}
        });
        let product = product_from_lookup("1", &body).unwrap();
        let kcal = product.per_100g.energy_kcal.unwrap();
        assert!((kcal - 1548.0 / 4.184).abs() < 1e-9);
    }

    #[test]
    fn test_search_skips_nameless() {
        let body = json!({
            "count": 2,
            "products": [
                {"product_name": "Oat Drink", "code": "123", "quantity": "1 l"},
                {"brands": "Mystery"}
            ]
        });
        let products = products_from_search(&body);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].barcode.as_deref(), Some("123"));
        assert_eq!(products[0].net_quantity, Some(Quantity::millilitres(1000.0)));
    }
}
