//! Session bootstrap: open the listing and narrow it to one region
//!
//! Any failure here is fatal for the run. Crawling an unfiltered listing
//! would silently collect the wrong records, so nothing is retried.

use crate::config::{Config, FilterConfig, SiteConfig, TimeoutConfig};
use crate::driver::{
    read_int_attribute, wait_until, BrowserDriver, DriverError, Shutdown, CLICK_SCRIPT,
};
use crate::CrawlError;

/// Result counts observed while applying the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub unfiltered_total: u32,
    pub filtered_total: u32,
}

/// Navigates to the listing and applies the region filter
pub struct SessionBootstrap {
    site: SiteConfig,
    filter: FilterConfig,
    timeouts: TimeoutConfig,
}

impl SessionBootstrap {
    pub fn new(config: &Config) -> Self {
        Self {
            site: config.site.clone(),
            filter: config.filter.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    /// Loads the listing, applies the filter, and verifies it took effect
    ///
    /// # Returns
    ///
    /// * `Ok(BootstrapReport)` - The filter is applied and the count dropped
    /// * `Err(CrawlError::Setup)` - Any step failed or the count did not drop
    /// * `Err(CrawlError::Interrupted)` - Shutdown fired during a wait
    pub async fn run<D: BrowserDriver>(
        &self,
        driver: &D,
        shutdown: &Shutdown,
    ) -> Result<BootstrapReport, CrawlError> {
        let poll = self.timeouts.poll_interval();

        tracing::info!("Navigating to {}", self.site.url);
        driver.navigate(&self.site.url).await.map_err(setup_error)?;

        let unfiltered_total = wait_until(
            "initial result count",
            self.timeouts.results(),
            poll,
            shutdown,
            || self.read_total(driver),
        )
        .await
        .map_err(setup_error)?;
        tracing::info!("Initial jobs count: {}", unfiltered_total);

        let toggle = wait_until(
            "region filter toggle",
            self.timeouts.filter_toggle(),
            poll,
            shutdown,
            || driver.find_element(&self.filter.toggle_selector),
        )
        .await
        .map_err(setup_error)?;

        let class = driver
            .attribute(&toggle, "class")
            .await
            .map_err(setup_error)?
            .unwrap_or_default();
        if class
            .split_whitespace()
            .any(|c| c == self.filter.expanded_class)
        {
            tracing::debug!("Region filter already expanded");
        } else {
            tracing::debug!("Expanding region filter");
            driver
                .execute_script(CLICK_SCRIPT, &toggle)
                .await
                .map_err(setup_error)?;
        }

        let option = wait_until(
            &format!("{} filter option", self.filter.label),
            self.timeouts.filter_option(),
            poll,
            shutdown,
            || driver.find_element(&self.filter.option_selector),
        )
        .await
        .map_err(setup_error)?;

        tracing::info!("Applying {} filter", self.filter.label);
        driver
            .execute_script(CLICK_SCRIPT, &option)
            .await
            .map_err(setup_error)?;

        let filtered_total = self
            .wait_for_filtered_total(driver, unfiltered_total, shutdown)
            .await?;

        let unchanged_allowed =
            self.filter.allow_unchanged_count && filtered_total == unfiltered_total;
        if filtered_total >= unfiltered_total && !unchanged_allowed {
            return Err(CrawlError::Setup(format!(
                "{} filter likely failed: {} results after filtering, {} before",
                self.filter.label, filtered_total, unfiltered_total
            )));
        }

        tracing::info!(
            "Filtered jobs count: {} (was {})",
            filtered_total,
            unfiltered_total
        );

        Ok(BootstrapReport {
            unfiltered_total,
            filtered_total,
        })
    }

    /// Waits for the count to drop, falling back to whatever it reads at the deadline
    async fn wait_for_filtered_total<D: BrowserDriver>(
        &self,
        driver: &D,
        unfiltered_total: u32,
        shutdown: &Shutdown,
    ) -> Result<u32, CrawlError> {
        let waited = wait_until(
            "filtered result count",
            self.timeouts.filter_apply(),
            self.timeouts.poll_interval(),
            shutdown,
            || async move {
                Ok::<_, DriverError>(self
                    .read_total(driver)
                    .await?
                    .filter(|total| *total < unfiltered_total))
            },
        )
        .await;

        match waited {
            Ok(total) => Ok(total),
            Err(DriverError::Timeout { .. }) => self
                .read_total(driver)
                .await
                .map_err(setup_error)?
                .ok_or_else(|| {
                    CrawlError::Setup("result count unreadable after filtering".to_string())
                }),
            Err(e) => Err(setup_error(e)),
        }
    }

    async fn read_total<D: BrowserDriver>(&self, driver: &D) -> Result<Option<u32>, DriverError> {
        read_int_attribute(
            driver,
            &self.site.results_selector,
            &self.site.total_results_attribute,
        )
        .await
    }
}

fn setup_error(error: DriverError) -> CrawlError {
    match error {
        DriverError::Interrupted => CrawlError::Interrupted,
        other => CrawlError::Setup(other.to_string()),
    }
}
