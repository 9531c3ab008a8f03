//! Storage module for persisting crawl progress
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Loading previously collected records and the last progress snapshot
//! - Flushing the full record set and snapshot as one transaction

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{DistinctColumn, SqliteStore};
pub use traits::{LoadedState, ProgressStore, StorageError, StorageResult};

use crate::CrawlError;
use std::path::Path;

/// Opens (or creates) the progress store at `path`
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Store ready for `load` and `flush`
/// * `Err(CrawlError)` - The database could not be opened
pub fn open_store(path: &Path) -> Result<SqliteStore, CrawlError> {
    Ok(SqliteStore::open(path)?)
}
