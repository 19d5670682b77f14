//! NutriScan Library
//!
//! Photo-to-nutrition recognition: unit normalization, barcode validation,
//! ingredient calorie reconciliation, drink volume estimation, alternative
//! ranking and the scan orchestrator tying them together.

pub mod build_info;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod nutrition;
pub mod products;
pub mod recognition;
pub mod tools;
