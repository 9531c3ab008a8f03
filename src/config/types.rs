use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a listing crawl
///
/// Every section has defaults matching the CommonSpirit careers site, so a
/// configuration file only needs to name what differs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub site: SiteConfig,
    pub filter: FilterConfig,
    pub listing: ListingConfig,
    pub pagination: PaginationConfig,
    pub timeouts: TimeoutConfig,
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    pub browser: BrowserConfig,
}

/// Target listing page and the results container it renders
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SiteConfig {
    /// Listing page to open
    pub url: String,

    /// Element carrying the result counters as attributes
    pub results_selector: String,

    /// Attribute holding the total number of matching jobs
    pub total_results_attribute: String,

    /// Attribute holding the page currently shown
    pub current_page_attribute: String,

    /// Attribute holding the number of result pages
    pub total_pages_attribute: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "https://www.commonspirit.careers/search-jobs".to_string(),
            results_selector: "#search-results".to_string(),
            total_results_attribute: "data-total-job-results".to_string(),
            current_page_attribute: "data-current-page".to_string(),
            total_pages_attribute: "data-total-pages".to_string(),
        }
    }
}

/// The content filter that must narrow the result set before crawling
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterConfig {
    /// Control that expands the filter group
    pub toggle_selector: String,

    /// Class present on the toggle when the group is already open
    pub expanded_class: String,

    /// Checkbox of the filter value to apply
    pub option_selector: String,

    /// Human readable name of the filter value (logging only)
    pub label: String,

    /// Accept a filtered count equal to the unfiltered one
    pub allow_unchanged_count: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            toggle_selector: "#region-toggle".to_string(),
            expanded_class: "expandable-child-open".to_string(),
            option_selector: "#region-filter-2".to_string(),
            label: "California".to_string(),
            allow_unchanged_count: false,
        }
    }
}

/// Selectors used to turn one listing element into a record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ListingConfig {
    pub item_selector: String,
    pub title_selector: String,
    pub department_selector: String,
    pub location_selector: String,
    pub id_attribute: String,
    pub url_attribute: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            item_selector: "#search-results a[data-job-id]".to_string(),
            title_selector: "h2.headline__medium".to_string(),
            department_selector: "span.job-department".to_string(),
            location_selector: "span.job-location".to_string(),
            id_attribute: "data-job-id".to_string(),
            url_attribute: "href".to_string(),
        }
    }
}

/// Retry policy and per-strategy controls for moving to the next page
///
/// A strategy table only needs the keys it changes; the rest keep that
/// strategy's own defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "PaginationFile")]
pub struct PaginationConfig {
    /// Outer attempts per advance
    pub max_retries: u32,

    /// Backoff between outer attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Failures of the preferred strategy before the preference is dropped
    pub max_consecutive_failures: u32,

    pub expand_in_place: StrategyConfig,
    pub next_link: StrategyConfig,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            max_consecutive_failures: 2,
            expand_in_place: StrategyConfig {
                selector: "button.btn-learn-more.pagination-view-more".to_string(),
                ready_timeout_ms: 5000,
                advance_timeout_ms: 10000,
            },
            next_link: StrategyConfig {
                selector: "a.next:not([disabled])".to_string(),
                ready_timeout_ms: 5000,
                advance_timeout_ms: 15000,
            },
        }
    }
}

/// `[pagination]` as written in the file, before defaults are filled in
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct PaginationFile {
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_consecutive_failures: Option<u32>,
    expand_in_place: StrategyFile,
    next_link: StrategyFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct StrategyFile {
    selector: Option<String>,
    ready_timeout_ms: Option<u64>,
    advance_timeout_ms: Option<u64>,
}

impl StrategyFile {
    fn merge_into(self, base: StrategyConfig) -> StrategyConfig {
        StrategyConfig {
            selector: self.selector.unwrap_or(base.selector),
            ready_timeout_ms: self.ready_timeout_ms.unwrap_or(base.ready_timeout_ms),
            advance_timeout_ms: self.advance_timeout_ms.unwrap_or(base.advance_timeout_ms),
        }
    }
}

impl From<PaginationFile> for PaginationConfig {
    fn from(file: PaginationFile) -> Self {
        let defaults = PaginationConfig::default();
        Self {
            max_retries: file.max_retries.unwrap_or(defaults.max_retries),
            retry_delay_ms: file.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            max_consecutive_failures: file
                .max_consecutive_failures
                .unwrap_or(defaults.max_consecutive_failures),
            expand_in_place: file.expand_in_place.merge_into(defaults.expand_in_place),
            next_link: file.next_link.merge_into(defaults.next_link),
        }
    }
}

impl PaginationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// One pagination control and its waits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    /// Control to click
    pub selector: String,

    /// How long to wait for the control to become usable (milliseconds)
    pub ready_timeout_ms: u64,

    /// How long to wait for the page indicator to move (milliseconds)
    pub advance_timeout_ms: u64,
}

impl StrategyConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn advance_timeout(&self) -> Duration {
        Duration::from_millis(self.advance_timeout_ms)
    }
}

/// Bounded waits used outside pagination, all in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TimeoutConfig {
    /// Results container after navigation
    pub results_ms: u64,

    /// Filter toggle becoming clickable
    pub filter_toggle_ms: u64,

    /// Filter option becoming present
    pub filter_option_ms: u64,

    /// Result count dropping after the filter is applied
    pub filter_apply_ms: u64,

    /// First listing element on a page
    pub listing_ms: u64,

    /// Results container after a refresh
    pub refresh_ms: u64,

    /// Interval between condition polls
    pub poll_interval_ms: u64,

    /// Pause between scrolling a control into view and clicking it
    pub settle_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            results_ms: 5000,
            filter_toggle_ms: 15000,
            filter_option_ms: 5000,
            filter_apply_ms: 3000,
            listing_ms: 3000,
            refresh_ms: 10000,
            poll_interval_ms: 250,
            settle_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn results(&self) -> Duration {
        Duration::from_millis(self.results_ms)
    }

    pub fn filter_toggle(&self) -> Duration {
        Duration::from_millis(self.filter_toggle_ms)
    }

    pub fn filter_option(&self) -> Duration {
        Duration::from_millis(self.filter_option_ms)
    }

    pub fn filter_apply(&self) -> Duration {
        Duration::from_millis(self.filter_apply_ms)
    }

    pub fn listing(&self) -> Duration {
        Duration::from_millis(self.listing_ms)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Politeness delay between pages (milliseconds)
    pub page_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self { page_delay_ms: 1000 }
    }
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Where the progress store lives
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Directory holding date-stamped stores
    pub directory: String,

    /// Store file name prefix, followed by `_MMDDYYYY.db`
    pub file_prefix: String,

    /// Explicit store path, overriding directory and prefix
    pub store_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            file_prefix: "DignityHospitals".to_string(),
            store_path: None,
        }
    }
}

impl OutputConfig {
    /// Resolves the store path for a run started on `date`
    pub fn resolve_store_path(&self, date: chrono::NaiveDate) -> PathBuf {
        match &self.store_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.directory).join(format!(
                "{}_{}.db",
                self.file_prefix,
                date.format("%m%d%Y")
            )),
        }
    }
}

/// Browser launch options
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1920,
            window_height: 1080,
        }
    }
}
