//! Carga do lote: star schema em SQLite, reconciliação e snapshots CSV

pub mod csv;
pub mod database;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod star;

pub use self::csv::CsvLoader;
pub use reconcile::{LoadReconciler, ReconciliationReport};
pub use star::{LoadStats, StarSchemaLoader};
