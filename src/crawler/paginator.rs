//! Pagination strategy selection
//!
//! The listing site has exposed two different pagination controls over time,
//! sometimes both at once. `PaginationSelector` tries them in order of past
//! success, retrying whole rounds with a backoff, and decides whether the
//! crawl has reached the last page.

use crate::config::{Config, PaginationConfig, SiteConfig, StrategyConfig, TimeoutConfig};
use crate::driver::{
    pause, wait_until, BrowserDriver, DriverError, DriverResult, Shutdown, CLICK_SCRIPT,
    SCROLL_INTO_VIEW_SCRIPT,
};
use crate::state::{PaginationStrategy, StrategyState};
use crate::CrawlError;

/// Page indicator read from the results container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePosition {
    pub current: u32,
    pub total: u32,
}

impl PagePosition {
    pub fn is_last(&self) -> bool {
        self.current >= self.total
    }
}

/// Reads the current and total page numbers from the results container
///
/// Returns `Ok(None)` if the container or either attribute is missing or not
/// a number.
pub async fn read_position<D: BrowserDriver + ?Sized>(
    driver: &D,
    site: &SiteConfig,
) -> DriverResult<Option<PagePosition>> {
    let Some(results) = driver.find_element(&site.results_selector).await? else {
        return Ok(None);
    };

    let current = driver
        .attribute(&results, &site.current_page_attribute)
        .await?
        .and_then(|v| v.trim().parse::<u32>().ok());
    let total = driver
        .attribute(&results, &site.total_pages_attribute)
        .await?
        .and_then(|v| v.trim().parse::<u32>().ok());

    Ok(match (current, total) {
        (Some(current), Some(total)) => Some(PagePosition { current, total }),
        _ => None,
    })
}

/// Outcome of a successful `advance` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The browser moved past `from`. `strategy` is `None` when the move was
    /// only noticed while recovering from a stale page.
    Advanced {
        from: u32,
        to: u32,
        strategy: Option<PaginationStrategy>,
    },

    /// The crawl was already on the last page; no control was touched
    NoMorePages { page: u32, total: u32 },
}

/// Advances the listing to its next page
pub struct PaginationSelector {
    site: SiteConfig,
    pagination: PaginationConfig,
    timeouts: TimeoutConfig,
    state: StrategyState,
}

impl PaginationSelector {
    pub fn new(config: &Config) -> Self {
        Self::with_state(config, StrategyState::new())
    }

    /// Creates a selector that starts from an existing strategy memory
    pub fn with_state(config: &Config, state: StrategyState) -> Self {
        Self {
            site: config.site.clone(),
            pagination: config.pagination.clone(),
            timeouts: config.timeouts.clone(),
            state,
        }
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Moves the browser to the next result page
    ///
    /// # Returns
    ///
    /// * `Ok(Advance::Advanced)` - The page indicator moved forward
    /// * `Ok(Advance::NoMorePages)` - Already on the last page
    /// * `Err(CrawlError::Interrupted)` - Shutdown fired during a wait
    /// * `Err(CrawlError::PaginationExhausted)` - Every round of strategies failed
    /// * `Err(CrawlError::Driver)` - The page indicator could not be read, or
    ///   the browser session failed in a way no retry can fix
    pub async fn advance<D: BrowserDriver>(
        &mut self,
        driver: &D,
        shutdown: &Shutdown,
    ) -> Result<Advance, CrawlError> {
        let mut position = read_position(driver, &self.site)
            .await
            .map_err(interrupt_or_driver)?
            .ok_or_else(|| {
                CrawlError::Driver(DriverError::Command("page indicator unreadable".to_string()))
            })?;

        if position.is_last() {
            tracing::info!(
                "Already on last page ({}/{})",
                position.current,
                position.total
            );
            return Ok(Advance::NoMorePages {
                page: position.current,
                total: position.total,
            });
        }

        let baseline = position.current;
        let order = self.state.candidate_order();
        let max_retries = self.pagination.max_retries;
        let threshold = self.pagination.max_consecutive_failures;

        for attempt in 1..=max_retries {
            tracing::info!(
                "Pagination attempt {}/{} from page {}/{} (preferred: {})",
                attempt,
                max_retries,
                position.current,
                position.total,
                self.state
                    .preferred()
                    .map(|s| s.as_str())
                    .unwrap_or("none")
            );

            for &strategy in &order {
                let error = match self.try_strategy(driver, strategy, baseline, shutdown).await {
                    Ok(to) => {
                        if self.state.preferred() != Some(strategy) {
                            tracing::info!("Setting {} as preferred strategy", strategy);
                        }
                        self.state.record_success(strategy);
                        tracing::info!(
                            "Advanced from page {} to {} via {}",
                            baseline,
                            to,
                            strategy
                        );
                        return Ok(Advance::Advanced {
                            from: baseline,
                            to,
                            strategy: Some(strategy),
                        });
                    }
                    Err(DriverError::Interrupted) => return Err(CrawlError::Interrupted),
                    Err(error) => error,
                };

                tracing::warn!("Strategy {} failed: {}", strategy, error);
                if self.state.record_failure(strategy, threshold) {
                    tracing::info!(
                        "Preferred strategy {} failed {} times in a row, resetting preference",
                        strategy,
                        threshold
                    );
                }

                if !error.is_transient() {
                    return Err(CrawlError::Driver(error));
                }

                if error.is_stale() {
                    match self.recover_from_stale(driver, shutdown).await {
                        Ok(Some(now)) if now.current > baseline => {
                            tracing::info!(
                                "Page advanced to {} despite stale element",
                                now.current
                            );
                            return Ok(Advance::Advanced {
                                from: baseline,
                                to: now.current,
                                strategy: None,
                            });
                        }
                        Ok(Some(now)) if now.is_last() => {
                            return Ok(Advance::NoMorePages {
                                page: now.current,
                                total: now.total,
                            });
                        }
                        Ok(Some(now)) => position = now,
                        Ok(None) => tracing::warn!("Page indicator unreadable after refresh"),
                        Err(DriverError::Interrupted) => return Err(CrawlError::Interrupted),
                        Err(e) => tracing::warn!("Failed to recover from stale element: {}", e),
                    }
                }
            }

            tracing::warn!("All pagination strategies failed on attempt {}", attempt);
            if attempt < max_retries {
                tracing::info!("Waiting {:?} before retrying", self.pagination.retry_delay());
                pause(self.pagination.retry_delay(), shutdown)
                    .await
                    .map_err(|_| CrawlError::Interrupted)?;
            }
        }

        Err(CrawlError::PaginationExhausted {
            attempts: max_retries,
        })
    }

    /// Advances until the browser shows at least `target`
    ///
    /// Used after a resume: the site always opens on page 1, so pages the
    /// previous run already processed are skipped without extraction.
    /// Returns the page the browser ended up on.
    pub async fn seek<D: BrowserDriver>(
        &mut self,
        driver: &D,
        target: u32,
        shutdown: &Shutdown,
    ) -> Result<u32, CrawlError> {
        loop {
            let position = read_position(driver, &self.site)
                .await
                .map_err(interrupt_or_driver)?;
            if let Some(position) = position {
                if position.current >= target {
                    return Ok(position.current);
                }
            }

            match self.advance(driver, shutdown).await? {
                Advance::NoMorePages { page, .. } => return Ok(page),
                Advance::Advanced { to, .. } if to >= target => return Ok(to),
                Advance::Advanced { .. } => {}
            }
        }
    }

    fn strategy_config(&self, strategy: PaginationStrategy) -> &StrategyConfig {
        match strategy {
            PaginationStrategy::ExpandInPlace => &self.pagination.expand_in_place,
            PaginationStrategy::NextLink => &self.pagination.next_link,
        }
    }

    /// Clicks the control for `strategy` and waits for the page indicator to pass `baseline`
    async fn try_strategy<D: BrowserDriver>(
        &self,
        driver: &D,
        strategy: PaginationStrategy,
        baseline: u32,
        shutdown: &Shutdown,
    ) -> DriverResult<u32> {
        let strategy_config = self.strategy_config(strategy);
        let poll = self.timeouts.poll_interval();
        let site = &self.site;

        tracing::debug!("Trying {} pagination", strategy);

        let control = wait_until(
            &format!("{} control", strategy),
            strategy_config.ready_timeout(),
            poll,
            shutdown,
            || driver.find_element(&strategy_config.selector),
        )
        .await?;

        driver.execute_script(SCROLL_INTO_VIEW_SCRIPT, &control).await?;
        pause(self.timeouts.settle(), shutdown).await?;
        driver.execute_script(CLICK_SCRIPT, &control).await?;

        wait_until(
            "page indicator to advance",
            strategy_config.advance_timeout(),
            poll,
            shutdown,
            || async move {
                Ok::<_, DriverError>(read_position(driver, site)
                    .await?
                    .map(|p| p.current)
                    .filter(|current| *current > baseline))
            },
        )
        .await
    }

    /// Reloads the page and re-reads the indicator once the results are back
    async fn recover_from_stale<D: BrowserDriver>(
        &self,
        driver: &D,
        shutdown: &Shutdown,
    ) -> DriverResult<Option<PagePosition>> {
        tracing::info!("Refreshing page after stale element");
        driver.refresh().await?;

        wait_until(
            "results after refresh",
            self.timeouts.refresh(),
            self.timeouts.poll_interval(),
            shutdown,
            || driver.find_element(&self.site.results_selector),
        )
        .await?;

        read_position(driver, &self.site).await
    }
}

fn interrupt_or_driver(error: DriverError) -> CrawlError {
    match error {
        DriverError::Interrupted => CrawlError::Interrupted,
        other => CrawlError::Driver(other),
    }
}
