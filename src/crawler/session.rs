//! Per-run crawl context
//!
//! Everything the crawl loop accumulates lives here rather than in globals:
//! the ordered record set, the ids already seen, and the latest snapshot.

use crate::crawler::paginator::PagePosition;
use crate::state::{JobRecord, ProgressSnapshot};
use crate::storage::LoadedState;
use std::collections::HashSet;

/// Records and progress owned by one crawl run
#[derive(Debug, Default)]
pub struct CrawlSession {
    records: Vec<JobRecord>,
    seen: HashSet<String>,
    snapshot: Option<ProgressSnapshot>,
    resumed_from: Option<u32>,
    added_this_run: usize,
    pages_processed: u32,
}

impl CrawlSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a session from a previously flushed store
    ///
    /// Records with an id already seen earlier in the store are dropped.
    pub fn from_loaded(loaded: LoadedState) -> Self {
        let mut session = Self::new();
        for record in loaded.records {
            if session.seen.insert(record.job_id.clone()) {
                session.records.push(record);
            }
        }
        session.resumed_from = loaded.snapshot.as_ref().map(|s| s.current_page);
        session.snapshot = loaded.snapshot;
        session
    }

    /// Appends the records whose ids are new; returns how many were added
    pub fn absorb(&mut self, page: Vec<JobRecord>) -> usize {
        let mut added = 0;
        for record in page {
            if self.seen.insert(record.job_id.clone()) {
                self.records.push(record);
                added += 1;
            }
        }
        self.added_this_run += added;
        added
    }

    /// Takes a new snapshot after a page has been fully processed
    ///
    /// `current_page` never moves backwards. If the position could not be
    /// read the previous page numbers are carried over.
    pub fn record_page(&mut self, position: Option<PagePosition>) -> &ProgressSnapshot {
        let previous = self
            .snapshot
            .as_ref()
            .map(|s| PagePosition {
                current: s.current_page,
                total: s.total_pages,
            });

        let (current_page, total_pages) = match (position, previous) {
            (Some(now), Some(before)) => (now.current.max(before.current), now.total),
            (Some(now), None) => (now.current, now.total),
            (None, Some(before)) => (before.current, before.total),
            (None, None) => (1, 1),
        };

        self.pages_processed += 1;
        self.snapshot
            .insert(ProgressSnapshot::new(current_page, total_pages, self.records.len()))
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.seen.contains(job_id)
    }

    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.snapshot.as_ref()
    }

    /// Page the previous run had reached, if this session resumed one
    pub fn resumed_from(&self) -> Option<u32> {
        self.resumed_from
    }

    pub fn added_this_run(&self) -> usize {
        self.added_this_run
    }

    pub fn pages_processed(&self) -> u32 {
        self.pages_processed
    }
}
