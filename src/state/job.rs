//! Listing records and progress snapshots

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Date format for `JobRecord::scraped_date`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format for `JobRecord::scraped_time`
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Timestamp format for `ProgressSnapshot::timestamp`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One job listing as captured from the results page
///
/// Records are never modified after extraction; the crawl session only
/// appends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub scraped_date: String,
    pub scraped_time: String,
    pub title: String,
    pub department: String,
    pub location: String,
    /// Deduplication key
    pub job_id: String,
    pub url: String,
}

impl JobRecord {
    /// Builds a record stamped with the given capture time
    pub fn new(
        captured_at: DateTime<Local>,
        title: &str,
        department: &str,
        location: &str,
        job_id: &str,
        url: &str,
    ) -> Self {
        Self {
            scraped_date: captured_at.format(DATE_FORMAT).to_string(),
            scraped_time: captured_at.format(TIME_FORMAT).to_string(),
            title: title.trim().to_string(),
            department: department.trim().to_string(),
            location: location.trim().to_string(),
            job_id: job_id.trim().to_string(),
            url: url.trim().to_string(),
        }
    }
}

/// Crawl position at the moment the last page was fully processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current_page: u32,
    pub total_pages: u32,
    pub jobs_collected: usize,
    pub timestamp: String,
}

impl ProgressSnapshot {
    pub fn new(current_page: u32, total_pages: u32, jobs_collected: usize) -> Self {
        Self {
            current_page,
            total_pages,
            jobs_collected,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Returns true if the snapshot was taken on the last result page
    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_formats_capture_time() {
        let captured = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        let record = JobRecord::new(
            captured,
            "  Registered Nurse ",
            "Nursing",
            "Sacramento, CA",
            "12345",
            "https://jobs.example.com/12345",
        );

        assert_eq!(record.scraped_date, "2024-03-09");
        assert_eq!(record.scraped_time, "07:05:02");
        assert_eq!(record.title, "Registered Nurse");
    }

    #[test]
    fn test_snapshot_last_page() {
        assert!(ProgressSnapshot::new(5, 5, 100).is_last_page());
        assert!(!ProgressSnapshot::new(4, 5, 80).is_last_page());
    }
}
