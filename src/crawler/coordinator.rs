//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the components together:
//! - Restoring records and progress from the store
//! - Bootstrapping the filtered listing and seeking to the resumed page
//! - Extracting, deduplicating, and flushing one page at a time
//! - Handling interrupts, pagination failures, and unexpected aborts
//!
//! Whatever ends the loop, the same finalization runs: one last flush of
//! the in-memory state and the release of the browser.

use crate::config::Config;
use crate::crawler::bootstrap::SessionBootstrap;
use crate::crawler::extractor::RecordExtractor;
use crate::crawler::paginator::{read_position, Advance, PaginationSelector};
use crate::crawler::session::CrawlSession;
use crate::driver::{pause, BrowserDriver, Shutdown};
use crate::state::{ProgressSnapshot, StrategyState, TIMESTAMP_FORMAT};
use crate::storage::ProgressStore;
use crate::CrawlError;
use chrono::Local;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

/// Why the crawl loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The last result page was processed
    Completed,

    /// Every pagination strategy failed on every retry
    PaginationFailed,

    /// The shutdown signal fired
    Interrupted,

    /// An unexpected error or panic ended the loop
    Aborted(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::PaginationFailed => f.write_str("pagination failed"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Summary of a finished crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub stop_reason: StopReason,
    /// Records held by the session, including resumed ones
    pub jobs_total: usize,
    /// Records first seen during this run
    pub jobs_added: usize,
    pub pages_processed: u32,
    pub snapshot: Option<ProgressSnapshot>,
    /// False if the final flush failed
    pub saved: bool,
    pub store_location: String,
    pub elapsed: Duration,
}

impl CrawlReport {
    /// Logs the final results
    pub fn log(&self) {
        tracing::info!("Crawl finished ({}) in {:.1?}", self.stop_reason, self.elapsed);

        match &self.snapshot {
            Some(snapshot) if self.saved => {
                tracing::info!(
                    "FINAL RESULTS: {} jobs saved to {}",
                    self.jobs_total,
                    self.store_location
                );
                tracing::info!(
                    "Pages processed: {}/{} ({} new jobs this run)",
                    snapshot.current_page,
                    snapshot.total_pages,
                    self.jobs_added
                );
            }
            Some(_) => tracing::error!(
                "FINAL RESULTS: {} jobs collected but the last save to {} failed",
                self.jobs_total,
                self.store_location
            ),
            None => tracing::warn!("No jobs collected during this session"),
        }
    }
}

/// Main crawler coordinator structure
///
/// Owns the browser driver, the progress store, and the per-run session.
pub struct Coordinator<D: BrowserDriver, S: ProgressStore> {
    config: Config,
    driver: D,
    store: S,
    session: CrawlSession,
    bootstrap: SessionBootstrap,
    extractor: RecordExtractor,
    selector: PaginationSelector,
    shutdown: Shutdown,
}

impl<D: BrowserDriver, S: ProgressStore> Coordinator<D, S> {
    /// Creates a coordinator and restores any previous progress from `store`
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `driver` - Browser session the crawl runs in
    /// * `store` - Store to resume from and flush to
    /// * `shutdown` - Signal that stops the crawl gracefully
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - The store could not be read
    pub fn new(
        config: Config,
        driver: D,
        store: S,
        shutdown: Shutdown,
    ) -> Result<Self, CrawlError> {
        let loaded = store.load()?;

        if loaded.is_fresh() {
            tracing::info!("No existing data found in {}, starting fresh", store.location());
        } else {
            tracing::info!(
                "Loaded {} existing jobs from {}",
                loaded.records.len(),
                store.location()
            );
            match &loaded.snapshot {
                Some(snapshot) => tracing::info!(
                    "Resuming from page {}/{}",
                    snapshot.current_page,
                    snapshot.total_pages
                ),
                None => tracing::info!("No progress data found, starting from page 1"),
            }
        }

        Ok(Self {
            session: CrawlSession::from_loaded(loaded),
            bootstrap: SessionBootstrap::new(&config),
            extractor: RecordExtractor::new(&config),
            selector: PaginationSelector::new(&config),
            config,
            driver,
            store,
            shutdown,
        })
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn strategy_state(&self) -> &StrategyState {
        self.selector.state()
    }

    /// Runs the crawl to completion, interruption, or failure
    ///
    /// The final flush and the driver release happen on every path,
    /// including a panic inside the loop.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The loop ended; see `stop_reason`
    /// * `Err(CrawlError::Setup)` - The filtered listing could not be established
    pub async fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();

        let outcome = match AssertUnwindSafe(self.crawl()).catch_unwind().await {
            Ok(Ok(reason)) => Ok(reason),
            Ok(Err(e)) if e.is_interrupt() => {
                tracing::warn!("Crawl interrupted, saving progress");
                Ok(StopReason::Interrupted)
            }
            Ok(Err(e @ CrawlError::Setup(_))) => Err(e),
            Ok(Err(e)) => {
                tracing::error!("Crawl aborted: {}", e);
                Ok(StopReason::Aborted(e.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Crawl aborted by panic: {}", message);
                Ok(StopReason::Aborted(message))
            }
        };

        let saved = self.flush();
        self.release_driver().await;

        let stop_reason = outcome?;
        Ok(CrawlReport {
            stop_reason,
            jobs_total: self.session.len(),
            jobs_added: self.session.added_this_run(),
            pages_processed: self.session.pages_processed(),
            snapshot: self.session.snapshot().cloned(),
            saved,
            store_location: self.store.location(),
            elapsed: started.elapsed(),
        })
    }

    async fn crawl(&mut self) -> Result<StopReason, CrawlError> {
        let filtered = self.bootstrap.run(&self.driver, &self.shutdown).await?;
        tracing::debug!(
            "Listing narrowed from {} to {} results",
            filtered.unfiltered_total,
            filtered.filtered_total
        );

        self.seek_resumed_page().await?;

        loop {
            if self.shutdown.is_triggered() {
                return Err(CrawlError::Interrupted);
            }

            self.log_page_start().await;
            let page = self.extractor.extract(&self.driver, &self.shutdown).await?;
            if page.is_empty() {
                tracing::warn!("No jobs extracted from this page");
            }
            let added = self.session.absorb(page);

            let position = match read_position(&self.driver, &self.config.site).await {
                Ok(position) => position,
                Err(e) => {
                    tracing::warn!("Could not read page indicator: {}", e);
                    None
                }
            };
            let snapshot = self.session.record_page(position);
            tracing::info!(
                "Page {}/{}: {} new jobs, {} total",
                snapshot.current_page,
                snapshot.total_pages,
                added,
                snapshot.jobs_collected
            );

            // Flush failures are retried implicitly by the next page's flush
            self.flush();

            match self.selector.advance(&self.driver, &self.shutdown).await {
                Ok(Advance::NoMorePages { page, total }) => {
                    tracing::info!("Reached last page ({}/{})", page, total);
                    return Ok(StopReason::Completed);
                }
                Ok(Advance::Advanced { from, to, .. }) => {
                    tracing::debug!("Moved from page {} to {}", from, to);
                }
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    tracing::warn!("Pagination failed, stopping: {}", e);
                    return Ok(StopReason::PaginationFailed);
                }
            }

            pause(self.config.crawler.page_delay(), &self.shutdown).await?;
        }
    }

    /// Logs the page about to be extracted and the running job count
    async fn log_page_start(&self) {
        let position = read_position(&self.driver, &self.config.site)
            .await
            .ok()
            .flatten();
        let (page, total) = match (position, self.session.snapshot()) {
            (Some(now), _) => (now.current.to_string(), now.total.to_string()),
            (None, Some(last)) => (last.current_page.to_string(), last.total_pages.to_string()),
            (None, None) => ("?".to_string(), "?".to_string()),
        };

        tracing::info!(
            "Processing page {}/{} ({} jobs collected, {})",
            page,
            total,
            self.session.len(),
            Local::now().format(TIMESTAMP_FORMAT)
        );
    }

    /// Skips ahead to the page a previous run had reached
    async fn seek_resumed_page(&mut self) -> Result<(), CrawlError> {
        let Some(target) = self.session.resumed_from().filter(|page| *page > 1) else {
            return Ok(());
        };

        tracing::info!("Seeking to resumed page {}", target);
        match self.selector.seek(&self.driver, target, &self.shutdown).await {
            Ok(page) => tracing::info!("Resuming at page {}", page),
            Err(e) if e.is_interrupt() => return Err(e),
            Err(e) => tracing::warn!(
                "Could not reach page {}, continuing from the current page: {}",
                target,
                e
            ),
        }
        Ok(())
    }

    /// Writes the session to the store; returns false if the write failed
    fn flush(&mut self) -> bool {
        let Some(snapshot) = self.session.snapshot() else {
            tracing::debug!("Nothing to save yet");
            return true;
        };

        match self.store.flush(self.session.records(), snapshot) {
            Ok(()) => {
                tracing::info!(
                    "Saved {} jobs (page {}/{}) to {}",
                    snapshot.jobs_collected,
                    snapshot.current_page,
                    snapshot.total_pages,
                    self.store.location()
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to save progress: {}", e);
                false
            }
        }
    }

    async fn release_driver(&mut self) {
        if let Err(e) = self.driver.quit().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::fast_config;
    use crate::driver::mock::{numbered_jobs, MockJob};
    use crate::driver::{shutdown_channel, MockListingSite};
    use crate::state::{JobRecord, PaginationStrategy};
    use crate::storage::SqliteStore;

    fn coordinator(
        config: &Config,
        site: MockListingSite,
        store: SqliteStore,
    ) -> Coordinator<MockListingSite, SqliteStore> {
        Coordinator::new(config.clone(), site, store, Shutdown::never()).unwrap()
    }

    #[tokio::test]
    async fn test_full_crawl_completes() {
        let config = fast_config();
        let site = MockListingSite::new(&config, numbered_jobs("job", 7), 3);
        let mut coordinator = coordinator(&config, site, SqliteStore::open_in_memory().unwrap());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.jobs_total, 7);
        assert_eq!(report.jobs_added, 7);
        assert_eq!(report.pages_processed, 3);
        assert!(report.saved);

        let snapshot = report.snapshot.unwrap();
        assert_eq!((snapshot.current_page, snapshot.total_pages), (3, 3));
        assert_eq!(snapshot.jobs_collected, 7);

        let loaded = coordinator.store().load().unwrap();
        assert_eq!(loaded.records.len(), 7);
        assert!(coordinator.driver().is_closed());
    }

    #[tokio::test]
    async fn test_expand_in_place_pages_deduplicate() {
        let config = fast_config();
        let site = MockListingSite::new(&config, numbered_jobs("job", 6), 2)
            .without_strategy(PaginationStrategy::NextLink);
        let mut coordinator = coordinator(&config, site, SqliteStore::open_in_memory().unwrap());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.jobs_total, 6);
        assert_eq!(
            coordinator.strategy_state().preferred(),
            Some(PaginationStrategy::ExpandInPlace)
        );
    }

    #[tokio::test]
    async fn test_pagination_failure_stops_gracefully() {
        let config = fast_config();
        let site = MockListingSite::new(&config, numbered_jobs("job", 6), 2)
            .without_strategy(PaginationStrategy::ExpandInPlace)
            .without_strategy(PaginationStrategy::NextLink);
        let mut coordinator = coordinator(&config, site, SqliteStore::open_in_memory().unwrap());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::PaginationFailed);
        assert_eq!(report.jobs_total, 2);
        assert_eq!(coordinator.store().load().unwrap().records.len(), 2);
    }

    #[tokio::test]
    async fn test_setup_failure_is_returned() {
        let config = fast_config();
        let site =
            MockListingSite::new(&config, numbered_jobs("job", 4), 2).with_ineffective_filter();
        let mut coordinator = coordinator(&config, site, SqliteStore::open_in_memory().unwrap());

        let err = coordinator.run().await.unwrap_err();

        assert!(matches!(err, CrawlError::Setup(_)));
        assert!(coordinator.driver().is_closed());
        assert!(coordinator.store().load().unwrap().is_fresh());
    }

    #[tokio::test]
    async fn test_resume_skips_known_records() {
        let config = fast_config();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first_page = {
            let site = MockListingSite::new(&config, numbered_jobs("job", 2), 2);
            site.navigate(&config.site.url).await.unwrap();
            RecordExtractor::new(&config)
                .extract(&site, &Shutdown::never())
                .await
                .unwrap()
        };
        store
            .flush(&first_page, &ProgressSnapshot::new(1, 3, 2))
            .unwrap();

        let site = MockListingSite::new(&config, numbered_jobs("job", 6), 2);
        let mut coordinator = coordinator(&config, site, store);
        assert_eq!(coordinator.session().resumed_from(), Some(1));

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.jobs_total, 6);
        assert_eq!(report.jobs_added, 4);
    }

    #[tokio::test]
    async fn test_resume_seeks_to_saved_page() {
        let config = fast_config();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let known: Vec<_> = numbered_jobs("job", 4)
            .into_iter()
            .map(|job| {
                JobRecord::new(
                    Local::now(),
                    job.title.as_deref().unwrap_or_default(),
                    &job.department,
                    &job.location,
                    &job.id,
                    &job.url,
                )
            })
            .collect();
        store.flush(&known, &ProgressSnapshot::new(2, 4, 4)).unwrap();

        let site = MockListingSite::new(&config, numbered_jobs("job", 8), 2)
            .without_strategy(PaginationStrategy::ExpandInPlace);
        let mut coordinator = coordinator(&config, site, store);

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.jobs_total, 8);
        assert_eq!(report.jobs_added, 4);
        // Pages 2, 3 and 4; page 1 was skipped by the seek
        assert_eq!(report.pages_processed, 3);
    }

    #[tokio::test]
    async fn test_interrupt_keeps_last_completed_page() {
        let config = fast_config();
        let (trigger, shutdown) = shutdown_channel();
        let site = MockListingSite::new(&config, numbered_jobs("job", 10), 2)
            .without_strategy(PaginationStrategy::ExpandInPlace)
            .interrupt_on_page(3, trigger);
        let mut coordinator = Coordinator::new(
            config.clone(),
            site,
            SqliteStore::open_in_memory().unwrap(),
            shutdown,
        )
        .unwrap();

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Interrupted);
        let loaded = coordinator.store().load().unwrap();
        assert_eq!(loaded.records.len(), 4);
        assert_eq!(loaded.snapshot.unwrap().current_page, 2);
    }

    #[tokio::test]
    async fn test_broken_listings_do_not_fail_page() {
        let config = fast_config();
        let mut jobs = numbered_jobs("job", 3);
        jobs.push(MockJob::broken("bad"));
        let site = MockListingSite::new(&config, jobs, 10);
        let mut coordinator = coordinator(&config, site, SqliteStore::open_in_memory().unwrap());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.jobs_total, 3);
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_progress_saved() {
        let config = fast_config();
        let site = MockListingSite::new(&config, numbered_jobs("job", 10), 2)
            .without_strategy(PaginationStrategy::ExpandInPlace)
            .panic_on_page(3);
        let mut coordinator = coordinator(&config, site, SqliteStore::open_in_memory().unwrap());

        let report = coordinator.run().await.unwrap();

        assert_eq!(
            report.stop_reason,
            StopReason::Aborted("listing renderer crashed on page 3".to_string())
        );
        assert!(report.saved);
        assert!(coordinator.driver().is_closed());

        let loaded = coordinator.store().load().unwrap();
        assert_eq!(loaded.records.len(), 4);
        assert_eq!(loaded.snapshot.unwrap().current_page, 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
