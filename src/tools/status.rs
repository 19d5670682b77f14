//! NutriScan Status Tool
//!
//! Provides runtime status information about the scanner service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::db::ScanStore;

/// Scanning instructions for AI assistants
pub const SCAN_INSTRUCTIONS: &str = r#"
# NutriScan Instructions

NutriScan turns a photo of food or packaging into a nutrition record: a title,
per-100g / per-serving / per-package nutrients, an ingredient breakdown whose
calories add up exactly to the total, and lower/similar/higher calorie
alternatives.

## Choosing a Mode

| Mode | Use for | What happens |
|------|---------|--------------|
| `barcode` | A photo of the barcode digits | Digits are read, checksum-validated (EAN-13, UPC-A, EAN-8) and looked up in the product database |
| `label` | The front label and/or nutrition table of a package | Label and table are read in parallel, merged, translated to English if needed, and topped up from the product catalog |
| `generic_food` | A plate, dish, snack or drink | A combined analysis runs first; a visual analysis and an ingredients pass run only if it comes back unusable |

If a barcode cannot be validated or is not in the database, the scan returns an
explicit **Unknown product** record. It never guesses a product.

## Starting a Scan

**Tool:** `start_scan`
- `image_path`: absolute path to a JPEG/PNG/WebP image on this machine
- `mode`: `barcode`, `label` or `generic_food`
- `hint` (optional): what the user says it is, used only if recognition finds no title
- `locale` (optional): the user's locale, e.g. `de-DE`

The response is the full record. `scan_id` identifies it for later calls.

## Reading a Record

- `energy_kcal_total` is the number to show. It equals the package energy when
  known, otherwise the serving energy.
- `ingredients[].estimated_kcal` always sums to `energy_kcal_total` (rounded integers).
  Rows with `assumed: true` had no calories of their own and received a share.
- `provenance` says which recognition stages ran or failed and whether the
  catalog, translation, water override or alternative fallback were used.
- `beverage` is present for drinks: container, fill and estimated volume.
  Plain water is always zero calories.

## Correcting a Scan

**Tool:** `recalculate_scan`
- `scan_id`
- Any of: `title`, `brand`, `energy_kcal_total`, `quantity_g`, `servings`, `items`

Corrections are authoritative. The new total is taken from, in order:
1. `energy_kcal_total`
2. per-100g energy × `quantity_g`
3. per-serving energy × `servings`
4. the sum of `items[].kcal` when every item carries kcal
5. the existing total

Ingredients are redistributed and alternatives re-bucketed against the new
total. The corrected record replaces the stored one.

## Other Tools

- `get_scan` / `list_scans`: stored records, newest first
- `reconcile_ingredients`: run the ingredient calorie reconciler directly on a
  list of items and a target
- `validate_barcode`: check digit candidates without a lookup
- `scanner_status`: build, database and configuration details
"#;

/// Status information for the scanner service
#[derive(Debug, Serialize)]
pub struct ScannerStatus {
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub scans_stored: Option<i64>,
    pub recognition_configured: bool,
    pub product_db_url: String,
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Tracks service start time and configuration for status reports
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    recognition_configured: bool,
    product_db_url: String,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf, recognition_configured: bool, product_db_url: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
            recognition_configured,
            product_db_url: product_db_url.into(),
        }
    }

    /// Get the current status
    pub fn get_status(&self, store: &ScanStore) -> ScannerStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        ScannerStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            scans_stored: store.count().ok(),
            recognition_configured: self.recognition_configured,
            product_db_url: self.product_db_url.clone(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_status_reports_store_and_config() {
        let path = std::env::temp_dir().join(format!("nutriscan-status-{}.db", uuid::Uuid::new_v4()));
        let database = Database::open_migrated(&path).unwrap();
        let store = ScanStore::new(database);

        let tracker = StatusTracker::new(path.clone(), false, "https://world.openfoodfacts.org");
        let status = tracker.get_status(&store);

        assert_eq!(status.scans_stored, Some(0));
        assert!(!status.recognition_configured);
        assert_eq!(status.process_id, std::process::id());
        assert!(status.database_size_bytes.is_some());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_instructions_name_every_mode() {
        for mode in ["barcode", "label", "generic_food"] {
            assert!(SCAN_INSTRUCTIONS.contains(mode));
        }
    }
}
