//! Browser automation layer
//!
//! The crawler never talks to a browser directly. It drives any
//! `BrowserDriver`, which keeps the coordinator independent of the
//! automation backend:
//! - `ChromiumDriver` controls a real Chromium over CDP
//! - `MockListingSite` simulates the listing site in memory (tests and the
//!   `mock` feature)
//!
//! Waiting is done with bounded polls (`wait_until`) that give up early when
//! the shutdown signal fires.

#[cfg(feature = "chromium")]
mod chromium;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod shutdown;
mod wait;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumDriver;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockListingSite;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use wait::{pause, wait_until};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Clicks the element the script is bound to
pub const CLICK_SCRIPT: &str = "function() { this.click(); }";

/// Scrolls the bound element to the middle of the viewport
pub const SCROLL_INTO_VIEW_SCRIPT: &str =
    "function() { this.scrollIntoView({behavior: 'smooth', block: 'center'}); }";

/// Errors raised by browser drivers and waits
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser command failed: {0}")]
    Command(String),

    /// The element handle no longer refers to a node in the current DOM
    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Wait interrupted by shutdown")]
    Interrupted,

    #[error("Browser session closed")]
    Closed,
}

impl DriverError {
    /// Returns true if the DOM changed under an element handle
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement(_))
    }

    /// Returns true for faults a later attempt on the same session may not hit
    ///
    /// A closed session, a failed launch or navigation, and an interrupt are
    /// not transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleElement(_)
                | Self::NotInteractable(_)
                | Self::Timeout { .. }
                | Self::Command(_)
        )
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Capability the crawler needs from a browser automation backend
///
/// A driver is owned by exactly one crawl loop. Methods take `&self` so that
/// condition probes can borrow the driver while a wait is in progress.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Handle to an element of the current document
    type Element: Send + Sync;

    /// Loads `url` in the session's tab
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// URL of the current document
    async fn current_url(&self) -> DriverResult<String>;

    /// Reloads the current document; all element handles become stale
    async fn refresh(&self) -> DriverResult<()>;

    /// First element matching `selector`, if any
    async fn find_element(&self, selector: &str) -> DriverResult<Option<Self::Element>>;

    /// All elements matching `selector`, in document order
    async fn find_elements(&self, selector: &str) -> DriverResult<Vec<Self::Element>>;

    /// First descendant of `parent` matching `selector`, if any
    async fn find_child(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> DriverResult<Option<Self::Element>>;

    /// Attribute value of `element`
    async fn attribute(&self, element: &Self::Element, name: &str) -> DriverResult<Option<String>>;

    /// Rendered text of `element`
    async fn text(&self, element: &Self::Element) -> DriverResult<String>;

    /// Calls the JavaScript function declaration `script` with `this` bound to `element`
    async fn execute_script(&self, script: &str, element: &Self::Element) -> DriverResult<()>;

    /// Ends the session and releases the browser
    async fn quit(&mut self) -> DriverResult<()>;
}

/// Reads an integer attribute of the first element matching `selector`
///
/// Returns `Ok(None)` if the element or attribute is missing or not a number.
pub async fn read_int_attribute<D: BrowserDriver + ?Sized>(
    driver: &D,
    selector: &str,
    attribute: &str,
) -> DriverResult<Option<u32>> {
    let Some(element) = driver.find_element(selector).await? else {
        return Ok(None);
    };

    Ok(driver
        .attribute(&element, attribute)
        .await?
        .and_then(|value| value.trim().parse::<u32>().ok()))
}
