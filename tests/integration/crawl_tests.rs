//! Integration tests for the crawler
//!
//! These tests drive the full crawl cycle end-to-end against the in-memory
//! listing site, with real SQLite stores on disk where resumption matters.

use careers_crawl::config::{parse_config, Config};
use careers_crawl::crawler::{Coordinator, PaginationSelector, StopReason};
use careers_crawl::driver::mock::{numbered_jobs, MockJob};
use careers_crawl::driver::{shutdown_channel, BrowserDriver, MockListingSite, Shutdown};
use careers_crawl::state::{JobRecord, PaginationStrategy, ProgressSnapshot, StrategyState};
use careers_crawl::storage::{LoadedState, ProgressStore, SqliteStore, StorageError, StorageResult};
use careers_crawl::CrawlError;
use chrono::NaiveDate;
use std::collections::HashSet;
use tempfile::TempDir;

/// Creates a test configuration with waits short enough for tests
fn create_test_config(directory: &str) -> Config {
    let toml = format!(
        r##"
[site]
url = "https://jobs.example.com/search"

[output]
directory = "{}"
file-prefix = "TestHospitals"

[timeouts]
results-ms = 50
filter-toggle-ms = 50
filter-option-ms = 50
filter-apply-ms = 30
listing-ms = 30
refresh-ms = 50
poll-interval-ms = 5
settle-ms = 1

[pagination]
retry-delay-ms = 5

[pagination.expand-in-place]
ready-timeout-ms = 20
advance-timeout-ms = 30

[pagination.next-link]
ready-timeout-ms = 20
advance-timeout-ms = 30

[crawler]
page-delay-ms = 1
"##,
        directory
    );

    parse_config(&toml).expect("Failed to parse test config")
}

fn store_path(config: &Config) -> std::path::PathBuf {
    let date = NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date");
    config.output.resolve_store_path(date)
}

/// Store whose first `failures` flushes fail
struct FlakyStore {
    inner: SqliteStore,
    failures: u32,
    attempts: u32,
}

impl ProgressStore for FlakyStore {
    fn load(&self) -> StorageResult<LoadedState> {
        self.inner.load()
    }

    fn flush(&mut self, records: &[JobRecord], snapshot: &ProgressSnapshot) -> StorageResult<()> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return Err(StorageError::Corrupt("disk full".to_string()));
        }
        self.inner.flush(records, snapshot)
    }

    fn location(&self) -> String {
        self.inner.location()
    }
}

#[tokio::test]
async fn test_filtered_first_page_is_persisted() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path().to_str().unwrap());
    let path = store_path(&config);

    // 120 filtered jobs over 5 pages, page 1 shows 20 valid and 2 broken listings
    let mut jobs = numbered_jobs("job", 20);
    jobs.insert(5, MockJob::broken("broken-1"));
    jobs.insert(12, MockJob::broken("broken-2"));
    jobs.extend(numbered_jobs("later", 98));
    let site = MockListingSite::new(&config, jobs, 22)
        .with_unfiltered_total(500)
        .with_total_pages(5)
        .without_strategy(PaginationStrategy::ExpandInPlace)
        .without_strategy(PaginationStrategy::NextLink);

    let store = SqliteStore::open(&path).unwrap();
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.stop_reason, StopReason::PaginationFailed);
    assert_eq!(report.jobs_total, 20);

    let reopened = SqliteStore::open(&path).unwrap();
    let loaded = reopened.load().unwrap();
    assert_eq!(loaded.records.len(), 20);

    let snapshot = loaded.snapshot.unwrap();
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.total_pages, 5);
    assert_eq!(snapshot.jobs_collected, 20);
}

#[tokio::test]
async fn test_complete_crawl_then_resume_adds_nothing() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path().to_str().unwrap());
    let path = store_path(&config);

    let site = MockListingSite::new(&config, numbered_jobs("job", 9), 4);
    let store = SqliteStore::open(&path).unwrap();
    let mut first = Coordinator::new(config.clone(), site, store, Shutdown::never()).unwrap();
    let report = first.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.jobs_total, 9);
    drop(first);

    let site = MockListingSite::new(&config, numbered_jobs("job", 9), 4);
    let store = SqliteStore::open(&path).unwrap();
    assert!(store.existed());
    let mut second = Coordinator::new(config, site, store, Shutdown::never()).unwrap();
    assert_eq!(second.session().len(), 9);

    let report = second.run().await.unwrap();
    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.jobs_added, 0);
    assert_eq!(report.jobs_total, 9);
}

#[tokio::test]
async fn test_interrupt_then_resume_collects_each_job_once() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path().to_str().unwrap());
    let path = store_path(&config);

    // First run is interrupted while waiting for page 3's listings
    let (trigger, shutdown) = shutdown_channel();
    let site = MockListingSite::new(&config, numbered_jobs("job", 10), 2)
        .without_strategy(PaginationStrategy::ExpandInPlace)
        .interrupt_on_page(3, trigger);
    let store = SqliteStore::open(&path).unwrap();
    let mut first = Coordinator::new(config.clone(), site, store, shutdown).unwrap();

    let report = first.run().await.unwrap();
    assert_eq!(report.stop_reason, StopReason::Interrupted);
    assert!(first.driver().is_closed());
    drop(first);

    let saved = SqliteStore::open(&path).unwrap().load().unwrap();
    assert_eq!(saved.records.len(), 4);
    assert_eq!(saved.snapshot.as_ref().unwrap().current_page, 2);

    // Second run resumes on page 2 and finishes the listing
    let site = MockListingSite::new(&config, numbered_jobs("job", 10), 2)
        .without_strategy(PaginationStrategy::ExpandInPlace);
    let store = SqliteStore::open(&path).unwrap();
    let mut second = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = second.run().await.unwrap();
    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.jobs_total, 10);
    assert_eq!(report.jobs_added, 6);

    let loaded = second.store().load().unwrap();
    let ids: HashSet<_> = loaded.records.iter().map(|r| r.job_id.clone()).collect();
    assert_eq!(ids.len(), loaded.records.len());
    assert_eq!(loaded.records.len(), 10);
    assert_eq!(loaded.snapshot.unwrap().current_page, 5);
}

#[tokio::test]
async fn test_persisted_count_matches_session() {
    let config = create_test_config(".");
    let site = MockListingSite::new(&config, numbered_jobs("job", 7), 3);
    let store = SqliteStore::open_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = coordinator.run().await.unwrap();

    let loaded = coordinator.store().load().unwrap();
    assert_eq!(loaded.records.len(), coordinator.session().len());
    assert_eq!(loaded.snapshot.unwrap().jobs_collected, report.jobs_total);
}

#[tokio::test]
async fn test_filter_failure_is_fatal() {
    let config = create_test_config(".");
    let site =
        MockListingSite::new(&config, numbered_jobs("job", 7), 3).with_ineffective_filter();
    let store = SqliteStore::open_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let err = coordinator.run().await.unwrap_err();

    assert!(matches!(err, CrawlError::Setup(_)));
    assert!(coordinator.session().is_empty());
    assert!(coordinator.driver().is_closed());
}

#[tokio::test]
async fn test_flush_failure_does_not_stop_crawl() {
    let config = create_test_config(".");
    let site = MockListingSite::new(&config, numbered_jobs("job", 6), 2);
    let store = FlakyStore {
        inner: SqliteStore::open_in_memory().unwrap(),
        failures: 1,
        attempts: 0,
    };
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert!(report.saved);
    assert_eq!(report.jobs_total, 6);
    assert_eq!(coordinator.store().load().unwrap().records.len(), 6);
}

#[tokio::test]
async fn test_failed_final_flush_is_reported() {
    let config = create_test_config(".");
    let site = MockListingSite::new(&config, numbered_jobs("job", 2), 2);
    let store = FlakyStore {
        inner: SqliteStore::open_in_memory().unwrap(),
        failures: u32::MAX,
        attempts: 0,
    };
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert!(!report.saved);
    assert_eq!(report.jobs_total, 2);
}

#[tokio::test]
async fn test_preference_switches_after_repeated_failures() {
    let config = create_test_config(".");
    let site = MockListingSite::new(&config, numbered_jobs("job", 6), 2)
        .ignore_clicks(PaginationStrategy::ExpandInPlace, 2)
        .ignore_clicks(PaginationStrategy::NextLink, 1);
    site.navigate(&config.site.url).await.unwrap();

    let state = StrategyState::with_preferred(PaginationStrategy::ExpandInPlace, 0);
    let mut selector = PaginationSelector::with_state(&config, state);
    selector.advance(&site, &Shutdown::never()).await.unwrap();

    assert_eq!(selector.state().preferred(), Some(PaginationStrategy::NextLink));
    assert_eq!(selector.state().consecutive_failures(), 0);

    // The next call starts with the new preference
    selector.advance(&site, &Shutdown::never()).await.unwrap();
    assert_eq!(site.clicks(PaginationStrategy::NextLink), 2);
    assert_eq!(site.clicks(PaginationStrategy::ExpandInPlace), 0);
}

#[tokio::test]
async fn test_last_page_invokes_no_strategy() {
    let config = create_test_config(".");
    let site = MockListingSite::new(&config, numbered_jobs("job", 3), 5);
    let store = SqliteStore::open_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.pages_processed, 1);
    assert_eq!(coordinator.driver().clicks(PaginationStrategy::ExpandInPlace), 0);
    assert_eq!(coordinator.driver().clicks(PaginationStrategy::NextLink), 0);
    assert_eq!(coordinator.strategy_state(), &StrategyState::new());
}

#[tokio::test]
async fn test_stale_pagination_recovers() {
    let config = create_test_config(".");
    let site = MockListingSite::new(&config, numbered_jobs("job", 6), 2).with_stale_clicks(2);
    let store = SqliteStore::open_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, site, store, Shutdown::never()).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.jobs_total, 6);
    assert!(coordinator.driver().refreshes() >= 2);
}
