//! NutriScan Tools module
//!
//! MCP tool implementations for the scanner service.

pub mod scans;
pub mod status;
