//! Database module
//!
//! Handles SQLite connection, migrations and scan storage.

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::{Database, DbError, DbResult};
pub use store::ScanStore;
