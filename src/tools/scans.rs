//! Scan MCP Tools
//!
//! Tool-level functions over stored scans and the pure reconciliation core.

use serde::Serialize;

use crate::config::ScanConfig;
use crate::db::ScanStore;
use crate::models::{total_kcal, IngredientRow, NutritionRecord, ScanEntry};
use crate::nutrition::{clamp_energy_total, reconcile};
use crate::products::barcode::{is_valid_code, normalize_code, select_barcode, DigitCandidate, ValidatedBarcode};
use crate::recognition::pipeline::rows_from_items;
use crate::recognition::EvidenceItem;

/// Summary of a scan for list results
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub mode: String,
    pub title: String,
    pub energy_kcal_total: Option<f64>,
    pub icon: Option<String>,
    pub unknown_product: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ScanEntry> for ScanSummary {
    fn from(entry: &ScanEntry) -> Self {
        Self {
            scan_id: entry.scan_id.clone(),
            mode: entry.mode.clone(),
            title: entry.title.clone(),
            energy_kcal_total: entry.energy_kcal_total,
            icon: entry.record.icon.clone(),
            unknown_product: entry.record.provenance.unknown_product,
            created_at: entry.created_at.clone(),
            updated_at: entry.updated_at.clone(),
        }
    }
}

/// Response for list_scans
#[derive(Debug, Serialize)]
pub struct ListScansResponse {
    pub scans: Vec<ScanSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for reconcile_ingredients
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub target_kcal: Option<f64>,
    pub total_kcal: i64,
    pub ingredients: Vec<IngredientRow>,
}

/// One digit candidate as checked
#[derive(Debug, Serialize)]
pub struct BarcodeCheck {
    pub digits: String,
    pub normalized: Option<String>,
    pub valid: bool,
}

/// Response for validate_barcode
#[derive(Debug, Serialize)]
pub struct ValidateBarcodeResponse {
    pub selected: Option<ValidatedBarcode>,
    pub candidates: Vec<BarcodeCheck>,
}

/// Get a stored scan record by scan id
pub fn get_scan(store: &ScanStore, scan_id: &str) -> Result<Option<NutritionRecord>, String> {
    let entry = store
        .get(scan_id.trim())
        .map_err(|e| format!("Failed to get scan: {}", e))?;
    Ok(entry.map(|e| e.record))
}

/// Like `get_scan`, but a missing scan is an error
pub fn load_record(store: &ScanStore, scan_id: &str) -> Result<NutritionRecord, String> {
    get_scan(store, scan_id)?.ok_or_else(|| format!("Scan not found: {}", scan_id))
}

/// List stored scans, newest first
pub fn list_scans(store: &ScanStore, limit: i64, offset: i64) -> Result<ListScansResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let entries = store
        .list_recent(limit, offset)
        .map_err(|e| format!("Failed to list scans: {}", e))?;
    let total = store
        .count()
        .map_err(|e| format!("Failed to count scans: {}", e))?;

    Ok(ListScansResponse {
        scans: entries.iter().map(ScanSummary::from).collect(),
        total,
        limit,
        offset,
    })
}

/// Run the ingredient reconciler on caller-supplied items
pub fn reconcile_ingredients(
    items: &[EvidenceItem],
    target_kcal: Option<f64>,
    config: &ScanConfig,
) -> Result<ReconcileResponse, String> {
    if let Some(target) = target_kcal {
        if !target.is_finite() {
            return Err("target_kcal must be a finite number".to_string());
        }
        if target < 0.0 {
            return Err("target_kcal cannot be negative".to_string());
        }
    }
    let rows = rows_from_items(items);
    if rows.is_empty() {
        return Err("At least one named item is required".to_string());
    }

    let ingredients = reconcile(&rows, target_kcal, &config.reconcile, &config.keywords);
    Ok(ReconcileResponse {
        target_kcal: target_kcal.map(clamp_energy_total),
        total_kcal: total_kcal(&ingredients),
        ingredients,
    })
}

/// Check digit candidates and pick the best valid one
pub fn validate_barcode(candidates: Vec<DigitCandidate>) -> Result<ValidateBarcodeResponse, String> {
    if candidates.is_empty() {
        return Err("At least one digit candidate is required".to_string());
    }

    let checks = candidates
        .iter()
        .map(|c| {
            let normalized = normalize_code(&c.digits);
            let valid = normalized.as_deref().is_some_and(is_valid_code);
            BarcodeCheck {
                digits: c.digits.clone(),
                normalized,
                valid,
            }
        })
        .collect();

    Ok(ValidateBarcodeResponse {
        selected: select_barcode(&candidates),
        candidates: checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ScanMode;
    use crate::recognition::RecordSink;

    fn store() -> (ScanStore, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("nutriscan-tools-{}.db", uuid::Uuid::new_v4()));
        let database = Database::open_migrated(&path).unwrap();
        (ScanStore::new(database), path)
    }

    fn item(name: &str, kcal: Option<f64>) -> EvidenceItem {
        EvidenceItem {
            name: name.to_string(),
            kcal,
            ..Default::default()
        }
    }

    #[test]
    fn test_get_and_list_scans() {
        let (store, path) = store();
        for (id, title) in [("a", "Porridge"), ("b", "Espresso")] {
            let mut record = NutritionRecord::new(id, ScanMode::GenericFood, title);
            record.energy_kcal_total = Some(100.0);
            store.save(&record).unwrap();
        }

        let listed = list_scans(&store, 0, -5).unwrap();
        assert_eq!(listed.total, 2);
        assert_eq!(listed.limit, 1);
        assert_eq!(listed.offset, 0);
        assert_eq!(listed.scans.len(), 1);

        assert_eq!(get_scan(&store, " a ").unwrap().unwrap().title, "Porridge");
        assert!(get_scan(&store, "zzz").unwrap().is_none());
        assert!(load_record(&store, "zzz").unwrap_err().contains("zzz"));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_reconcile_ingredients_hits_target() {
        let config = ScanConfig::default();
        let items = vec![item("rice", Some(250.0)), item("chicken", Some(150.0)), item("salt", None)];
        let response = reconcile_ingredients(&items, Some(520.4), &config).unwrap();

        assert_eq!(response.target_kcal, Some(520.0));
        assert_eq!(response.total_kcal, 520);
        assert_eq!(response.ingredients[2].estimated_kcal, Some(0));
    }

    #[test]
    fn test_reconcile_ingredients_rejects_bad_input() {
        let config = ScanConfig::default();
        assert!(reconcile_ingredients(&[item("rice", None)], Some(-1.0), &config).is_err());
        assert!(reconcile_ingredients(&[item("rice", None)], Some(f64::NAN), &config).is_err());
        assert!(reconcile_ingredients(&[item("  ", None)], Some(100.0), &config).is_err());
    }

    #[test]
    fn test_validate_barcode_reports_each_candidate() {
        let response = validate_barcode(vec![
            DigitCandidate::new("4006381333932", 0.9),
            DigitCandidate::new("4006 3813 3393 1", 0.5),
            DigitCandidate::new("96385074", 0.4),
        ])
        .unwrap();

        let valid: Vec<bool> = response.candidates.iter().map(|c| c.valid).collect();
        assert_eq!(valid, vec![false, true, true]);
        assert_eq!(response.selected.unwrap().code, "4006381333931");
        assert!(validate_barcode(Vec::new()).is_err());
    }
}
