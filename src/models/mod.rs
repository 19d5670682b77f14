//! Data models
//!
//! Scan output records and their persisted form.

mod alternative;
mod ingredient;
mod nutrition;
mod record;
mod scan_entry;

pub use alternative::{AlternativeCandidate, Bucket};
pub use ingredient::{total_kcal, IngredientCategory, IngredientRow};
pub use nutrition::{NutrientSet, RawNutrients};
pub use record::{NutritionRecord, Provenance, ScanMode, UNKNOWN_PRODUCT_TITLE};
pub use scan_entry::ScanEntry;
