//! Statistics generation from a saved store
//!
//! This module provides functionality for summarising a progress store
//! without starting a browser.

use crate::state::ProgressSnapshot;
use crate::storage::{DistinctColumn, ProgressStore, SqliteStore};
use crate::CrawlError;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Where the statistics were read from
    pub location: String,

    /// Number of stored job records
    pub total_jobs: u64,

    /// Number of distinct departments
    pub departments: u64,

    /// Number of distinct locations
    pub locations: u64,

    /// Number of distinct capture dates
    pub scrape_dates: u64,

    /// Last saved progress, if any page was completed
    pub snapshot: Option<ProgressSnapshot>,
}

/// Loads statistics from a store
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query the store
pub fn load_statistics(store: &SqliteStore) -> Result<StoreStatistics, CrawlError> {
    let snapshot = store.load()?.snapshot;

    Ok(StoreStatistics {
        location: store.location(),
        total_jobs: store.count_jobs()?,
        departments: store.count_distinct(DistinctColumn::Department)?,
        locations: store.count_distinct(DistinctColumn::Location)?,
        scrape_dates: store.count_distinct(DistinctColumn::ScrapedDate)?,
        snapshot,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");
    println!("Store: {}\n", stats.location);

    println!("Overview:");
    println!("  Jobs stored: {}", stats.total_jobs);
    println!("  Departments: {}", stats.departments);
    println!("  Locations: {}", stats.locations);
    println!("  Capture dates: {}", stats.scrape_dates);
    println!();

    match &stats.snapshot {
        Some(snapshot) => {
            let percentage = if snapshot.total_pages > 0 {
                (snapshot.current_page as f64 / snapshot.total_pages as f64) * 100.0
            } else {
                0.0
            };
            println!("Progress:");
            println!(
                "  Page {} of {} ({:.1}%)",
                snapshot.current_page, snapshot.total_pages, percentage
            );
            println!("  Jobs at last save: {}", snapshot.jobs_collected);
            println!("  Last saved: {}", snapshot.timestamp);
            if snapshot.is_last_page() {
                println!("  Status: complete");
            } else {
                println!("  Status: resumable");
            }
        }
        None => println!("Progress: no pages completed yet"),
    }
}
