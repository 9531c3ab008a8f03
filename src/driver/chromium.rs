//! Chromium backend over the DevTools protocol

use crate::config::BrowserConfig;
use crate::driver::{BrowserDriver, DriverError, DriverResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

/// A single Chromium tab driven over CDP
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumDriver {
    /// Launches Chromium and opens a blank tab
    pub async fn launch(config: &BrowserConfig) -> DriverResult<Self> {
        let mut builder =
            LaunchConfig::builder().window_size(config.window_width, config.window_height);
        if !config.headless {
            builder = builder.with_head();
        }
        let launch = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(launch)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The handler must be polled for the connection to make progress
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        tracing::info!("Browser launched (headless: {})", config.headless);

        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
        })
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        Ok(())
    }
}

/// Maps CDP failures onto the driver taxonomy
fn classify(error: CdpError) -> DriverError {
    let message = error.to_string();
    let lower = message.to_lowercase();

    if lower.contains("no node with given id")
        || lower.contains("could not find node")
        || lower.contains("stale")
        || lower.contains("cannot find context with specified id")
    {
        DriverError::StaleElement(message)
    } else if lower.contains("not interactable") || lower.contains("scrolling failed") {
        DriverError::NotInteractable(message)
    } else {
        DriverError::Command(message)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Element = Element;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.ensure_open()?;
        let url = self.page.url().await.map_err(classify)?;
        Ok(url.unwrap_or_default())
    }

    async fn refresh(&self) -> DriverResult<()> {
        self.ensure_open()?;
        self.page.reload().await.map_err(classify)?;
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> DriverResult<Option<Element>> {
        // querySelectorAll reports absence as an empty list instead of an error
        let mut found = self.find_elements(selector).await?;
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }

    async fn find_elements(&self, selector: &str) -> DriverResult<Vec<Element>> {
        self.ensure_open()?;
        self.page.find_elements(selector).await.map_err(classify)
    }

    async fn find_child(&self, parent: &Element, selector: &str) -> DriverResult<Option<Element>> {
        self.ensure_open()?;
        let mut found = parent.find_elements(selector).await.map_err(classify)?;
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        self.ensure_open()?;
        element.attribute(name).await.map_err(classify)
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        self.ensure_open()?;
        let text = element.inner_text().await.map_err(classify)?;
        Ok(text.unwrap_or_default())
    }

    async fn execute_script(&self, script: &str, element: &Element) -> DriverResult<()> {
        self.ensure_open()?;
        element
            .call_js_fn(script, false)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn quit(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.browser.close().await;
        self.handler.abort();
        result.map_err(|e| DriverError::Command(e.to_string()))?;

        tracing::info!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
