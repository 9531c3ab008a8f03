//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `JobRecord`: one extracted listing, keyed by its job id
//! - `ProgressSnapshot`: where the crawl stood at the last processed page
//! - `StrategyState`: the pagination selector's memory between advances

mod job;
mod strategy;

// Re-export main types
pub use job::{JobRecord, ProgressSnapshot, TIMESTAMP_FORMAT};
pub use strategy::{PaginationStrategy, StrategyState};
