//! Scan store
//!
//! Persists finished nutrition records through the connection pool.

use tracing::debug;

use super::connection::{Database, DbResult};
use crate::models::{NutritionRecord, ScanEntry};
use crate::recognition::{RecordSink, ServiceError};

#[derive(Clone)]
pub struct ScanStore {
    database: Database,
}

impl ScanStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn get(&self, scan_id: &str) -> DbResult<Option<ScanEntry>> {
        self.database.with_conn(|conn| ScanEntry::get_by_scan_id(conn, scan_id))
    }

    pub fn list_recent(&self, limit: i64, offset: i64) -> DbResult<Vec<ScanEntry>> {
        self.database.with_conn(|conn| ScanEntry::list_recent(conn, limit, offset))
    }

    pub fn count(&self) -> DbResult<i64> {
        self.database.with_conn(ScanEntry::count)
    }
}

impl RecordSink for ScanStore {
    fn save(&self, record: &NutritionRecord) -> Result<(), ServiceError> {
        let entry = self.database.with_conn(|conn| ScanEntry::upsert(conn, record))?;
        debug!(scan_id = %entry.scan_id, id = entry.id, "scan stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanMode;

    fn store() -> (ScanStore, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("nutriscan-store-{}.db", uuid::Uuid::new_v4()));
        let database = Database::open_migrated(&path).unwrap();
        (ScanStore::new(database), path)
    }

    #[test]
    fn test_save_replaces_by_scan_id() {
        let (store, path) = store();
        let mut record = NutritionRecord::new("scan-a", ScanMode::GenericFood, "Lentil soup");
        record.energy_kcal_total = Some(320.0);

        store.save(&record).unwrap();
        record.energy_kcal_total = Some(350.0);
        store.save(&record).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let entry = store.get("scan-a").unwrap().unwrap();
        assert_eq!(entry.energy_kcal_total, Some(350.0));
        assert_eq!(entry.record.title, "Lentil soup");
        assert!(store.get("scan-b").unwrap().is_none());

        let _ = std::fs::remove_file(path);
    }
}
