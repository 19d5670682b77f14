//! Scan Entry model
//!
//! Persisted nutrition records, one row per scan session.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::NutritionRecord;
use crate::db::{DbError, DbResult};

/// A stored scan with its full record
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub id: i64,
    pub scan_id: String,
    pub mode: String,
    pub title: String,
    pub energy_kcal_total: Option<f64>,
    pub record: NutritionRecord,
    pub created_at: String,
    pub updated_at: String,
}

impl ScanEntry {
    /// Create a ScanEntry from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let json: String = row.get("record_json")?;
        let record: NutritionRecord = serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            scan_id: row.get("scan_id")?,
            mode: row.get("mode")?,
            title: row.get("title")?,
            energy_kcal_total: row.get("energy_kcal_total")?,
            record,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a record, or replace the stored one for the same scan id
    pub fn upsert(conn: &Connection, record: &NutritionRecord) -> DbResult<Self> {
        let json = serde_json::to_string(record)?;
        conn.execute(
            r#"
            INSERT INTO scans (scan_id, mode, title, energy_kcal_total, record_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(scan_id) DO UPDATE SET
                mode = excluded.mode,
                title = excluded.title,
                energy_kcal_total = excluded.energy_kcal_total,
                record_json = excluded.record_json,
                updated_at = datetime('now')
            "#,
            params![
                record.scan_id,
                record.mode.as_str(),
                record.title,
                record.energy_kcal_total,
                json,
            ],
        )?;

        Self::get_by_scan_id(conn, &record.scan_id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a scan by its scan id
    pub fn get_by_scan_id(conn: &Connection, scan_id: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM scans WHERE scan_id = ?1")?;

        match stmt.query_row([scan_id], Self::from_row) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent scans first
    pub fn list_recent(conn: &Connection, limit: i64, offset: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM scans ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;

        let entries = stmt
            .query_map(params![limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Every stored scan in insertion order
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM scans ORDER BY id ASC")?;
        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))?;
        Ok(count)
    }
}
