//! Runtime configuration
//!
//! Everything is read from `NUTRISCAN_*` environment variables once at
//! startup and passed down explicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::nutrition::{KeywordTables, ReconcileRules};
use crate::products::RankingRules;

pub const DEFAULT_PRODUCT_DB_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_FIRST_ATTEMPT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Failed to read keyword tables from {path}: {source}")]
    KeywordsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse keyword tables in {path}: {source}")]
    KeywordsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Knobs of the pure reconciliation and ranking core
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub reconcile: ReconcileRules,
    pub ranking: RankingRules,
    /// Bound on the first recognition call of each chain
    pub first_attempt_timeout: Duration,
    pub keywords: Arc<KeywordTables>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            reconcile: ReconcileRules::default(),
            ranking: RankingRules::default(),
            first_attempt_timeout: Duration::from_secs(DEFAULT_FIRST_ATTEMPT_TIMEOUT_SECS),
            keywords: Arc::new(KeywordTables::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Where captured images are kept for the recognition service
    pub storage_dir: PathBuf,
    pub vision_url: Option<String>,
    pub vision_api_key: Option<String>,
    pub vision_model: Option<String>,
    pub product_db_url: String,
    pub scan: ScanConfig,
}

/// Project-root `data/nutriscan.db`, found relative to the executable
pub fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(grandparent) = path.parent().and_then(Path::parent) {
            path = grandparent.to_path_buf();
        }
    }

    path.push("data");
    path.push("nutriscan.db");
    path
}

/// Read a keyword-table override; sections missing from the file keep their defaults
pub fn load_keywords(path: &Path) -> Result<KeywordTables, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::KeywordsIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::KeywordsParse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(None),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_path = text("NUTRISCAN_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);
        let storage_dir = text("NUTRISCAN_STORAGE_DIR").map(PathBuf::from).unwrap_or_else(|| {
            database_path
                .parent()
                .map(|p| p.join("captures"))
                .unwrap_or_else(|| PathBuf::from("captures"))
        });

        let mut scan = ScanConfig::default();
        if let Some(secs) = parse_var::<u64>(&lookup, "NUTRISCAN_FIRST_ATTEMPT_TIMEOUT_SECS")? {
            scan.first_attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse_var::<f64>(&lookup, "NUTRISCAN_BUCKET_THRESHOLD")? {
            if !(threshold.is_finite() && threshold >= 0.0) {
                return Err(ConfigError::Invalid {
                    var: "NUTRISCAN_BUCKET_THRESHOLD",
                    value: threshold.to_string(),
                });
            }
            scan.ranking.bucket_threshold = threshold;
        }
        if let Some(cap) = parse_var::<f64>(&lookup, "NUTRISCAN_SEASONING_CAP_KCAL")? {
            if !(cap.is_finite() && cap >= 0.0) {
                return Err(ConfigError::Invalid {
                    var: "NUTRISCAN_SEASONING_CAP_KCAL",
                    value: cap.to_string(),
                });
            }
            scan.reconcile.seasoning_cap_kcal = cap;
        }
        if let Some(min) = parse_var::<usize>(&lookup, "NUTRISCAN_MIN_PRIMARY_ALTERNATIVES")? {
            scan.ranking.min_primary = min;
        }
        if let Some(path) = text("NUTRISCAN_KEYWORDS_PATH") {
            scan.keywords = Arc::new(load_keywords(Path::new(&path))?);
            tracing::info!(path = %path, "loaded keyword table override");
        }

        Ok(Self {
            database_path,
            storage_dir,
            vision_url: text("NUTRISCAN_VISION_URL"),
            vision_api_key: text("NUTRISCAN_VISION_API_KEY"),
            vision_model: text("NUTRISCAN_VISION_MODEL"),
            product_db_url: text("NUTRISCAN_PRODUCT_DB_URL").unwrap_or_else(|| DEFAULT_PRODUCT_DB_URL.to_string()),
            scan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("NUTRISCAN_DATABASE_PATH", "/tmp/ns/scans.db")])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/ns/scans.db"));
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/ns/captures"));
        assert_eq!(config.product_db_url, DEFAULT_PRODUCT_DB_URL);
        assert_eq!(config.vision_url, None);
        assert_eq!(config.scan.ranking.bucket_threshold, 0.07);
        assert_eq!(config.scan.reconcile.seasoning_cap_kcal, 120.0);
        assert_eq!(config.scan.first_attempt_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NUTRISCAN_BUCKET_THRESHOLD", "0.1"),
            ("NUTRISCAN_SEASONING_CAP_KCAL", "80"),
            ("NUTRISCAN_MIN_PRIMARY_ALTERNATIVES", "5"),
            ("NUTRISCAN_FIRST_ATTEMPT_TIMEOUT_SECS", "3"),
            ("NUTRISCAN_VISION_URL", " http://localhost:8080/recognize "),
        ]))
        .unwrap();
        assert_eq!(config.scan.ranking.bucket_threshold, 0.1);
        assert_eq!(config.scan.reconcile.seasoning_cap_kcal, 80.0);
        assert_eq!(config.scan.ranking.min_primary, 5);
        assert_eq!(config.scan.first_attempt_timeout, Duration::from_secs(3));
        assert_eq!(config.vision_url.as_deref(), Some("http://localhost:8080/recognize"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("NUTRISCAN_BUCKET_THRESHOLD", "seven")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "NUTRISCAN_BUCKET_THRESHOLD", .. }));

        let err = AppConfig::from_lookup(lookup(&[("NUTRISCAN_SEASONING_CAP_KCAL", "-5")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_keyword_override_keeps_other_sections() {
        let path = std::env::temp_dir().join(format!("nutriscan-keywords-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"default_icon": "🥫"}"#).unwrap();
        let tables = load_keywords(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(tables.default_icon, "🥫");
        assert!(!tables.water.is_empty());

        let missing = load_keywords(Path::new("/definitely/not/here.json"));
        assert!(matches!(missing, Err(ConfigError::KeywordsIo { .. })));
    }
}
