//! External service contracts
//!
//! Everything the scanner talks to sits behind one of these traits so the
//! pipeline can run against HTTP clients in production and in-memory fakes
//! in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::capture::CapturedImage;
use crate::db::DbError;
use crate::models::NutritionRecord;
use crate::products::{ProductQuery, ProductRecord};

/// Failure of a single external call
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// What a recognition call is asked to do.
///
/// Each task carries its own instruction text describing the JSON shape the
/// scanner knows how to read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionTask {
    DigitOcr,
    LabelParse,
    NutritionTableParse,
    CombinedFoodAnalysis,
    VisualFoodAnalysis,
    IngredientsOnly,
    AlternativesGeneration,
    IconSelection,
    LanguageNormalization,
}

impl RecognitionTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionTask::DigitOcr => "digit_ocr",
            RecognitionTask::LabelParse => "label_parse",
            RecognitionTask::NutritionTableParse => "nutrition_table_parse",
            RecognitionTask::CombinedFoodAnalysis => "combined_food_analysis",
            RecognitionTask::VisualFoodAnalysis => "visual_food_analysis",
            RecognitionTask::IngredientsOnly => "ingredients_only",
            RecognitionTask::AlternativesGeneration => "alternatives_generation",
            RecognitionTask::IconSelection => "icon_selection",
            RecognitionTask::LanguageNormalization => "language_normalization",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            RecognitionTask::DigitOcr => {
                "Read the digits printed under the barcode. Return JSON \
                 {\"candidates\": [{\"digits\": \"...\", \"confidence\": 0.0-1.0}]} with at most \
                 three readings, most likely first. Digits only, no guessing of hidden digits."
            }
            RecognitionTask::LabelParse => {
                "Extract the product identity from the package. Return JSON with title, brand, \
                 category, net_quantity (text as printed), serving_size (text as printed), \
                 servings_per_package and items (ingredient names in printed order). \
                 Use null for anything not visible."
            }
            RecognitionTask::NutritionTableParse => {
                "Read the nutrition facts table. Return JSON with per_100g and per_serving objects, \
                 each holding energy_kcal, energy_kj, protein_g, fat_g, carbs_g, sugar_g, fiber_g, \
                 sodium_mg, salt_g, calcium_mg exactly as printed, plus serving_size text. \
                 Use null for values that are not printed; never estimate."
            }
            RecognitionTask::CombinedFoodAnalysis => {
                "Identify the food or drink in the photo, reading any visible text or nutrition \
                 table. Return JSON with title, brand, category, icon, calories (for the whole \
                 portion shown), protein_g, fat_g, carbs_g, sugar_g, fiber_g, sodium_mg, \
                 items [{name, grams, kcal_per_100g}] and, for drinks, beverage \
                 {kind: water|coffee|other, container, fill_percent, volume_ml, cups, description}."
            }
            RecognitionTask::VisualFoodAnalysis => {
                "Estimate from appearance alone what the food is and how much is shown. Return JSON \
                 with title, category, calories for the whole portion, macros in grams, items \
                 [{name, grams}] and beverage cues if it is a drink."
            }
            RecognitionTask::IngredientsOnly => {
                "List the ingredients that make up the dish, most significant first. Return JSON \
                 {\"items\": [{\"name\": \"...\", \"grams\": number|null}]}."
            }
            RecognitionTask::AlternativesGeneration => {
                "Suggest real packaged products a shopper could buy instead. Return JSON \
                 {\"alternatives\": [{brand, name, variant, calories_per_package_kcal, \
                 bucket: lower|similar|higher}]}."
            }
            RecognitionTask::IconSelection => {
                "Pick one emoji that best represents this food. Return JSON {\"icon\": \"...\"}."
            }
            RecognitionTask::LanguageNormalization => {
                "Translate the product text fields into English. Return JSON with title, brand, \
                 category and items (names only, same order). Do not return any numbers."
            }
        }
    }
}

/// Input to a recognition call: an uploaded image, or text for text-only tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecognitionInput {
    ImageUrl(String),
    Text(String),
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Store the image and return a URL the recognition service can fetch
    async fn upload(&self, image: &CapturedImage) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Returns the raw response body; the caller treats it as untrusted
    async fn recognize(
        &self,
        input: RecognitionInput,
        task: RecognitionTask,
    ) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait ProductDatabase: Send + Sync {
    async fn lookup_by_barcode(&self, code: &str) -> Result<Option<ProductRecord>, ServiceError>;

    async fn search_by_text(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, ServiceError>;
}

/// Receives finished records. Runs on a blocking thread.
pub trait RecordSink: Send + Sync {
    fn save(&self, record: &NutritionRecord) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_names_match_serde() {
        for task in [
            RecognitionTask::DigitOcr,
            RecognitionTask::NutritionTableParse,
            RecognitionTask::LanguageNormalization,
        ] {
            let json = serde_json::to_string(&task).unwrap();
            assert_eq!(json, format!("\"{}\"", task.as_str()));
            assert!(!task.instructions().is_empty());
        }
    }
}
