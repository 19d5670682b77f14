//! Re-run ingredient reconciliation over every stored scan
//! Usage: cargo run --bin rereconcile_scans -- [--dry-run]

use nutriscan::config::AppConfig;
use nutriscan::models::{total_kcal, ScanEntry};
use nutriscan::recognition::pipeline::rereconcile_record;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dry_run = std::env::args().skip(1).any(|a| a == "--dry-run");

    let config = AppConfig::from_env()?;
    println!("Database: {}", config.database_path.display());

    let database = nutriscan::db::Database::open_migrated(&config.database_path)?;

    database.with_conn(|conn| {
        let entries = ScanEntry::list_all(conn)?;
        println!("Found {} stored scans", entries.len());

        let mut changed = 0;
        for entry in &entries {
            let next = rereconcile_record(&entry.record, &config.scan);
            if next == entry.record {
                continue;
            }
            changed += 1;

            println!("\nScan {}: {}", entry.scan_id, entry.title);
            println!("  Total: {:?} kcal", entry.energy_kcal_total);
            for (old, new) in entry.record.ingredients.iter().zip(&next.ingredients) {
                if old.estimated_kcal != new.estimated_kcal || old.category != new.category {
                    println!("  {}: {:?} -> {:?} kcal ({:?})",
                        new.name,
                        old.estimated_kcal,
                        new.estimated_kcal,
                        new.category
                    );
                }
            }
            println!("  Ingredient sum: {} kcal", total_kcal(&next.ingredients));

            if !dry_run {
                ScanEntry::upsert(conn, &next)?;
            }
        }

        println!("\n{} of {} scans changed{}", changed, entries.len(), if dry_run { " (dry run)" } else { "" });
        Ok(())
    })?;

    Ok(())
}
