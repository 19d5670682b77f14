//! NutriScan MCP Server Implementation
//!
//! Implements the MCP server with all scanner tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::db::ScanStore;
use crate::models::ScanMode;
use crate::products::DigitCandidate;
use crate::recognition::{EvidenceItem, ScanContext, ScanOverrides, Scanner};
use crate::tools::scans;
use crate::tools::status::StatusTracker;

/// NutriScan MCP Service
#[derive(Clone)]
pub struct ScanService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    store: ScanStore,
    scanner: Arc<Scanner>,
    tool_router: ToolRouter<ScanService>,
}

impl ScanService {
    pub fn new(status_tracker: StatusTracker, store: ScanStore, scanner: Arc<Scanner>) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(status_tracker)),
            store,
            scanner,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StartScanParams {
    /// Absolute path to the captured image
    pub image_path: String,
    /// barcode, label or generic_food
    pub mode: String,
    /// What the user says the food is; used only when recognition finds no title
    pub hint: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ItemParam {
    pub name: String,
    pub grams: Option<f64>,
    pub kcal_per_100g: Option<f64>,
    pub kcal: Option<f64>,
}

impl From<ItemParam> for EvidenceItem {
    fn from(p: ItemParam) -> Self {
        Self {
            name: p.name,
            grams: p.grams,
            kcal_per_100g: p.kcal_per_100g,
            kcal: p.kcal,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecalculateScanParams {
    pub scan_id: String,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub energy_kcal_total: Option<f64>,
    pub quantity_g: Option<f64>,
    pub servings: Option<f64>,
    pub items: Option<Vec<ItemParam>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetScanParams {
    pub scan_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListScansParams {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_list_limit() -> i64 { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReconcileIngredientsParams {
    pub items: Vec<ItemParam>,
    pub target_kcal: Option<f64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CandidateParam {
    pub digits: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 { 1.0 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ValidateBarcodeParams {
    pub candidates: Vec<CandidateParam>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl ScanService {
    // --- Status ---

    #[tool(description = "Get the current status of the NutriScan service including build info, database status, recognition configuration, and process information")]
    async fn scanner_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(&self.store);
        to_json(&status)
    }

    #[tool(description = "Get instructions for scanning food, reading the resulting records, and correcting them. Call this before the first scan of a session.")]
    fn scan_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::SCAN_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(SCAN_INSTRUCTIONS)]))
    }

    // --- Scanning ---

    #[tool(description = "Scan an image into a nutrition record. mode is barcode, label or generic_food. Returns the full record with reconciled ingredients and alternatives.")]
    async fn start_scan(&self, Parameters(p): Parameters<StartScanParams>) -> Result<CallToolResult, McpError> {
        let mode = ScanMode::from_str(p.mode.trim()).ok_or_else(|| {
            McpError::invalid_params(
                format!("Unknown mode '{}'; expected barcode, label or generic_food", p.mode),
                None,
            )
        })?;
        let context = ScanContext {
            active_tab: Some(mode),
            locale: p.locale,
            hint: p.hint.filter(|h| !h.trim().is_empty()),
            ..Default::default()
        };
        let record = self
            .scanner
            .start_scan_from_path(PathBuf::from(p.image_path), mode, context)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        to_json(&record)
    }

    #[tool(description = "Apply user corrections to a stored scan (title, brand, energy_kcal_total, quantity_g, servings, items) and re-run reconciliation and alternative ranking. Corrections are authoritative.")]
    async fn recalculate_scan(&self, Parameters(p): Parameters<RecalculateScanParams>) -> Result<CallToolResult, McpError> {
        let record = scans::load_record(&self.store, &p.scan_id).map_err(|e| McpError::internal_error(e, None))?;
        let overrides = ScanOverrides {
            title: p.title,
            brand: p.brand,
            items: p.items.map(|items| items.into_iter().map(EvidenceItem::from).collect()),
            energy_kcal_total: p.energy_kcal_total,
            quantity_g: p.quantity_g,
            servings: p.servings,
        };
        let next = self.scanner.recalculate(&record, &overrides).await;
        to_json(&next)
    }

    // --- Stored Scans ---

    #[tool(description = "Get a stored scan record by scan_id")]
    fn get_scan(&self, Parameters(p): Parameters<GetScanParams>) -> Result<CallToolResult, McpError> {
        let result = scans::get_scan(&self.store, &p.scan_id).map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(record) => to_json(&record),
            None => to_json(&serde_json::json!({"error": "Scan not found", "scan_id": p.scan_id})),
        }
    }

    #[tool(description = "List stored scans, newest first, with pagination")]
    fn list_scans(&self, Parameters(p): Parameters<ListScansParams>) -> Result<CallToolResult, McpError> {
        let result = scans::list_scans(&self.store, p.limit, p.offset).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // --- Core Utilities ---

    #[tool(description = "Distribute a calorie total across ingredients so the whole-kcal values sum exactly to the target. Items may carry grams, kcal_per_100g or kcal.")]
    fn reconcile_ingredients(&self, Parameters(p): Parameters<ReconcileIngredientsParams>) -> Result<CallToolResult, McpError> {
        let items: Vec<EvidenceItem> = p.items.into_iter().map(EvidenceItem::from).collect();
        let result = scans::reconcile_ingredients(&items, p.target_kcal, self.scanner.config())
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Checksum-validate barcode digit candidates (EAN-13, UPC-A, EAN-8) and pick the highest-confidence valid one")]
    fn validate_barcode(&self, Parameters(p): Parameters<ValidateBarcodeParams>) -> Result<CallToolResult, McpError> {
        let candidates = p
            .candidates
            .into_iter()
            .map(|c| DigitCandidate::new(c.digits, c.confidence))
            .collect();
        let result = scans::validate_barcode(candidates).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }
}

#[tool_handler]
impl ServerHandler for ScanService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutriscan".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("NutriScan".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "NutriScan - photo-to-nutrition recognition. \
                 IMPORTANT: Call scan_instructions before the first scan. \
                 Scanning: start_scan (barcode/label/generic_food), recalculate_scan for user corrections. \
                 Stored scans: get_scan, list_scans. \
                 Utilities: reconcile_ingredients, validate_barcode. \
                 Status: scanner_status."
                    .into(),
            ),
        }
    }
}
