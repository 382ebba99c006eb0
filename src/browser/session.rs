use anyhow::{Result, Context};
use async_trait::async_trait;
use std::time::Duration;
use fantoccini::error::CmdError;
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;
use tracing::{debug, error};

use crate::browser::locator::{BrowserHandle, BrowserLauncher, ElementLocator, LocatorError, Target};
use crate::cli::config::BrowserSettings;

/// Poll interval used by all bounded waits
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser session backed by a WebDriver endpoint
pub struct BrowserSession {
    /// WebDriver instance, taken on release
    driver: Option<WebDriver>,
}

/// Launches Chrome sessions through a WebDriver server
pub struct WebDriverLauncher {
    config: BrowserSettings,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserSettings) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserHandle>> {
        let session = BrowserSession::connect(&self.config).await?;
        Ok(Box::new(session))
    }
}

fn by(target: &Target) -> By {
    match target {
        Target::Css(selector) => By::Css(selector.as_str()),
        Target::XPath(path) => By::XPath(path.as_str()),
        Target::Id(id) => By::Id(id.as_str()),
    }
}

fn classify(target: &Target, err: WebDriverError) -> LocatorError {
    match err {
        WebDriverError::NoSuchElement(_) => LocatorError::NotFound(target.to_string()),
        WebDriverError::Timeout(_) => LocatorError::Timeout(target.to_string()),
        WebDriverError::CmdError(CmdError::Standard(status)) => {
            from_error_code(target, status.error(), &status.message)
        }
        WebDriverError::CmdError(CmdError::WaitTimeout) => LocatorError::Timeout(target.to_string()),
        other => LocatorError::Driver(format!("{}: {}", target, other)),
    }
}

/// Map a W3C WebDriver error code to a locator failure
fn from_error_code(target: &Target, code: &str, message: &str) -> LocatorError {
    match code {
        "no such element" | "stale element reference" => LocatorError::NotFound(target.to_string()),
        "timeout" | "script timeout" => LocatorError::Timeout(target.to_string()),
        "element not interactable" | "element click intercepted" => {
            LocatorError::NotInteractable(target.to_string())
        }
        _ => LocatorError::Driver(format!("{}: {}: {}", target, code, message)),
    }
}

impl BrowserSession {
    /// Connect to the WebDriver server and start a Chrome session
    pub async fn connect(config: &BrowserSettings) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();

        for arg in &config.chrome_args {
            caps.add_chrome_arg(arg)?;
        }

        if config.headless {
            caps.set_headless()?;
        }

        let driver = WebDriver::new(&config.webdriver_url, caps).await
            .context(format!("Failed to connect to WebDriver at {}", config.webdriver_url))?;

        driver.set_page_load_timeout(Duration::from_secs(config.page_load_timeout_secs)).await?;

        debug!("Browser session initialized");

        Ok(Self { driver: Some(driver) })
    }

    fn driver(&self) -> Result<&WebDriver, LocatorError> {
        self.driver.as_ref()
            .ok_or_else(|| LocatorError::Driver("browser session already released".to_string()))
    }

    async fn ready_element(&self, target: &Target, timeout: Duration) -> Result<WebElement, LocatorError> {
        self.driver()?
            .query(by(target))
            .wait(timeout, POLL_INTERVAL)
            .and_clickable()
            .first()
            .await
            .map_err(|e| match classify(target, e) {
                // the query reports an expired wait as a missing element
                LocatorError::NotFound(t) => LocatorError::Timeout(t),
                other => other,
            })
    }
}

#[async_trait]
impl ElementLocator for BrowserSession {
    async fn click_when_ready(&self, target: &Target, timeout: Duration) -> Result<(), LocatorError> {
        let element = self.ready_element(target, timeout).await?;
        element.click().await.map_err(|e| classify(target, e))?;
        debug!("Clicked {}", target);
        Ok(())
    }

    async fn select_value(&self, target: &Target, value: &str) -> Result<(), LocatorError> {
        let element = self.driver()?.find(by(target)).await
            .map_err(|e| classify(target, e))?;
        let select = SelectElement::new(&element).await
            .map_err(|e| classify(target, e))?;
        select.select_by_value(value).await
            .map_err(|e| classify(target, e))?;
        debug!("Selected value {} in {}", value, target);
        Ok(())
    }

    async fn attribute_values(&self, target: &Target, attribute: &str) -> Result<Vec<String>, LocatorError> {
        let elements = self.driver()?.find_all(by(target)).await
            .map_err(|e| classify(target, e))?;

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(value) = element.attr(attribute).await.map_err(|e| classify(target, e))? {
                values.push(value);
            }
        }

        Ok(values)
    }

    async fn attribute_when_ready(
        &self,
        target: &Target,
        attribute: &str,
        timeout: Duration,
    ) -> Result<Option<String>, LocatorError> {
        let element = self.ready_element(target, timeout).await?;
        element.attr(attribute).await.map_err(|e| classify(target, e))
    }

    async fn wait_for(&self, target: &Target, timeout: Duration) -> Result<bool, LocatorError> {
        let found = self.driver()?
            .query(by(target))
            .wait(timeout, POLL_INTERVAL)
            .exists()
            .await
            .map_err(|e| classify(target, e))?;
        Ok(found)
    }
}

#[async_trait]
impl BrowserHandle for BrowserSession {
    async fn open(&self, url: &str) -> Result<(), LocatorError> {
        debug!("Navigating to: {}", url);
        self.driver()?.goto(url).await
            .map_err(|e| LocatorError::Driver(format!("failed to navigate to {}: {}", url, e)))
    }

    async fn release(&mut self) -> Result<(), LocatorError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await
                .map_err(|e| LocatorError::Driver(format!("failed to quit browser: {}", e)))?;
            debug!("Browser session closed");
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            // Spawn a task to quit the driver
            tokio::spawn(async move {
                if let Err(e) = driver.quit().await {
                    error!("Error closing browser session during drop: {}", e);
                }
            });
        }
    }
}
