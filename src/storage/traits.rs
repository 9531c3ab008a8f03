//! Storage traits and error types
//!
//! This module defines the trait interface for progress stores and
//! associated error types.

use crate::state::{JobRecord, ProgressSnapshot};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Everything a previous session left behind
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    /// Records in the order they were collected
    pub records: Vec<JobRecord>,

    /// Last snapshot, absent on a fresh start
    pub snapshot: Option<ProgressSnapshot>,
}

impl LoadedState {
    /// Returns true if there is nothing to resume from
    pub fn is_fresh(&self) -> bool {
        self.records.is_empty() && self.snapshot.is_none()
    }
}

/// Trait for progress store implementations
///
/// A store holds two logical tables: the collected jobs and a single
/// progress row. Both are always replaced together.
pub trait ProgressStore {
    /// Loads the collected records and the last snapshot
    fn load(&self) -> StorageResult<LoadedState>;

    /// Replaces the stored records and snapshot as one unit
    ///
    /// On failure the previously stored state must remain intact.
    fn flush(&mut self, records: &[JobRecord], snapshot: &ProgressSnapshot) -> StorageResult<()>;

    /// Human readable location, used in status messages
    fn location(&self) -> String;
}
