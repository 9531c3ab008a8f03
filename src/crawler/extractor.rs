//! Listing extraction
//!
//! Turns the listing elements on the current page into `JobRecord`s. A
//! listing that cannot be read is logged and skipped; it never fails the
//! page.

use crate::config::{Config, ListingConfig, TimeoutConfig};
use crate::driver::{wait_until, BrowserDriver, DriverError, Shutdown};
use crate::state::JobRecord;
use crate::CrawlError;
use chrono::Local;

/// Reads job records from the listing elements of a results page
pub struct RecordExtractor {
    listing: ListingConfig,
    timeouts: TimeoutConfig,
}

impl RecordExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            listing: config.listing.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    /// Extracts one record per readable listing on the current page
    ///
    /// Records come back in document order. Pages that show no listings
    /// before the timeout yield an empty list.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<JobRecord>)` - Records for every listing that could be read
    /// * `Err(CrawlError::Interrupted)` - Shutdown fired; the page is abandoned
    pub async fn extract<D: BrowserDriver>(
        &self,
        driver: &D,
        shutdown: &Shutdown,
    ) -> Result<Vec<JobRecord>, CrawlError> {
        let item_selector = &self.listing.item_selector;
        let found = wait_until(
            "job listings",
            self.timeouts.listing(),
            self.timeouts.poll_interval(),
            shutdown,
            || async move {
                let elements = driver.find_elements(item_selector).await?;
                Ok::<_, DriverError>((!elements.is_empty()).then_some(elements))
            },
        )
        .await;

        let elements = match found {
            Ok(elements) => elements,
            Err(DriverError::Interrupted) => return Err(CrawlError::Interrupted),
            Err(e) => {
                tracing::warn!("No job listings found: {}", e);
                return Ok(Vec::new());
            }
        };

        tracing::info!("Found {} job listings", elements.len());

        let mut records = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            if shutdown.is_triggered() {
                return Err(CrawlError::Interrupted);
            }

            match self.extract_one(driver, element).await {
                Ok(record) => records.push(record),
                Err(reason) => {
                    tracing::warn!("{}", CrawlError::Extraction { index, reason });
                }
            }
        }

        tracing::debug!(
            "Extracted {} of {} listings",
            records.len(),
            elements.len()
        );
        Ok(records)
    }

    async fn extract_one<D: BrowserDriver>(
        &self,
        driver: &D,
        element: &D::Element,
    ) -> Result<JobRecord, String> {
        let captured_at = Local::now();

        let title = child_text(driver, element, &self.listing.title_selector).await?;
        let department = child_text(driver, element, &self.listing.department_selector).await?;
        let location = child_text(driver, element, &self.listing.location_selector).await?;
        let job_id = required_attribute(driver, element, &self.listing.id_attribute).await?;
        let url = required_attribute(driver, element, &self.listing.url_attribute).await?;

        Ok(JobRecord::new(
            captured_at,
            &title,
            &department,
            &location,
            &job_id,
            &url,
        ))
    }
}

async fn child_text<D: BrowserDriver>(
    driver: &D,
    element: &D::Element,
    selector: &str,
) -> Result<String, String> {
    let child = driver
        .find_child(element, selector)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no element matches '{}'", selector))?;

    driver.text(&child).await.map_err(|e| e.to_string())
}

async fn required_attribute<D: BrowserDriver>(
    driver: &D,
    element: &D::Element,
    name: &str,
) -> Result<String, String> {
    driver
        .attribute(element, name)
        .await
        .map_err(|e| e.to_string())?
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("missing '{}' attribute", name))
}
