//! NutriScan
//!
//! An MCP server that turns food photos into reconciled nutrition records.

use std::sync::Arc;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use nutriscan::build_info;
use nutriscan::config::AppConfig;
use nutriscan::db::{self, ScanStore};
use nutriscan::mcp::ScanService;
use nutriscan::products::OpenFoodFactsClient;
use nutriscan::recognition::{
    HttpRecognitionService, LocalImageStore, RecognitionService, Scanner, UnconfiguredRecognition,
};
use nutriscan::tools::status::StatusTracker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nutriscan=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = AppConfig::from_env()?;
    eprintln!("Database path: {}", config.database_path.display());
    eprintln!("Capture storage: {}", config.storage_dir.display());

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = db::Database::new(&config.database_path)?;

    database.with_conn(|conn| {
        if db::migrations::needs_migration(conn)? {
            eprintln!("Applying database migrations...");
        }
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let recognizer: Arc<dyn RecognitionService> = match &config.vision_url {
        Some(url) => {
            eprintln!("Recognition endpoint: {}", url);
            Arc::new(HttpRecognitionService::new(
                url.clone(),
                config.vision_api_key.clone(),
                config.vision_model.clone(),
            )?)
        }
        None => {
            tracing::warn!("NUTRISCAN_VISION_URL not set, recognition calls will fail and scans return unknown products");
            Arc::new(UnconfiguredRecognition)
        }
    };
    let products = Arc::new(OpenFoodFactsClient::new(config.product_db_url.clone())?);
    let uploader = Arc::new(LocalImageStore::new(config.storage_dir.clone()));

    let store = ScanStore::new(database);
    let scanner = Scanner::new(uploader, recognizer, products, config.scan.clone())
        .with_sink(Arc::new(store.clone()));

    let tracker = StatusTracker::new(
        config.database_path.clone(),
        config.vision_url.is_some(),
        config.product_db_url.clone(),
    );
    let service = ScanService::new(tracker, store, Arc::new(scanner));

    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
