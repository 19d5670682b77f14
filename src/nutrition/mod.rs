//! Nutrition calculation module
//!
//! Pure, synchronous building blocks: unit normalization, keyword heuristics,
//! ingredient reconciliation, beverage volume estimation and health scoring.

pub mod converter;
pub mod health_score;
pub mod keywords;
pub mod reconcile;
pub mod units;
pub mod volume;

pub use converter::{
    derive_profile, fl_oz_to_ml, kcal_to_kj, kj_to_kcal, normalize_nutrients, oz_to_g,
    parse_quantity, parse_serving_size, per_package_value, per_serving_from_per_100g,
    salt_to_sodium_mg, NutritionProfile, Quantity,
};
pub use health_score::health_score;
pub use keywords::KeywordTables;
pub use reconcile::{clamp_energy_total, reconcile, ReconcileRules, DEFAULT_SEASONING_CAP_KCAL, MAX_TOTAL_KCAL};
pub use units::{QuantityKind, UnitCategory};
pub use volume::{
    estimate_volume, BeverageCues, BeverageKind, ContainerKind, FillBand, FillLevel,
    VolumeEstimate, VolumeSource,
};
