//! Careers-Crawl: a resumable job-listing harvester
//!
//! This crate drives a browser session over a paginated job-listing site,
//! extracts one record per listing, and persists progress after every page so
//! an interrupted crawl can be resumed without losing or duplicating records.

pub mod config;
pub mod crawler;
pub mod driver;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The listing filter could not be applied or verified. Never retried.
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Browser error: {0}")]
    Driver(#[from] driver::DriverError),

    #[error("Failed to extract listing {index}: {reason}")]
    Extraction { index: usize, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Pagination failed after {attempts} attempts")]
    PaginationExhausted { attempts: u32 },

    #[error("Crawl interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CrawlError {
    /// Returns true if this error came from an external interrupt
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            Self::Interrupted | Self::Driver(driver::DriverError::Interrupted)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, StopReason};
pub use state::{JobRecord, PaginationStrategy, ProgressSnapshot, StrategyState};
pub use storage::{ProgressStore, SqliteStore};
