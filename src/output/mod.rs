//! Output module for inspecting and exporting saved crawls
//!
//! This module handles:
//! - Summarising a progress store (`--stats`)
//! - Exporting stored records to CSV (`--export-csv`)

mod csv_export;
pub mod stats;

pub use csv_export::export_csv;
pub use stats::{load_statistics, print_statistics, StoreStatistics};
