//! Crawler module for walking the paginated listing
//!
//! This module contains the core crawling logic, including:
//! - Session bootstrap (navigation and region filter)
//! - Record extraction from listing elements
//! - Pagination strategy selection with retries
//! - Overall crawl coordination and finalization

mod bootstrap;
mod coordinator;
mod extractor;
mod paginator;
mod session;

pub use bootstrap::{BootstrapReport, SessionBootstrap};
pub use coordinator::{Coordinator, CrawlReport, StopReason};
pub use extractor::RecordExtractor;
pub use paginator::{read_position, Advance, PagePosition, PaginationSelector};
pub use session::CrawlSession;
