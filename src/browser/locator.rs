use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How an element is found on the rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Target {
    Css(String),
    XPath(String),
    Id(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Css(selector) => write!(f, "css:{}", selector),
            Target::XPath(path) => write!(f, "xpath:{}", path),
            Target::Id(id) => write!(f, "id:{}", id),
        }
    }
}

/// Failure reported by the browser while locating or driving an element
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("timed out waiting for: {0}")]
    Timeout(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("browser driver error: {0}")]
    Driver(String),
}

impl LocatorError {
    /// UI failures that a page legitimately produces (missing or unready controls)
    pub fn is_transient(&self) -> bool {
        !matches!(self, LocatorError::Driver(_))
    }
}

/// Query and interaction capability over the currently rendered page
#[async_trait]
pub trait ElementLocator: Send + Sync {
    /// Wait until the element is clickable, then click it
    async fn click_when_ready(&self, target: &Target, timeout: Duration) -> Result<(), LocatorError>;

    /// Choose an option by value in a `<select>` control
    async fn select_value(&self, target: &Target, value: &str) -> Result<(), LocatorError>;

    /// Read one attribute from every matching element, in rendered order.
    /// Elements without the attribute are skipped.
    async fn attribute_values(&self, target: &Target, attribute: &str) -> Result<Vec<String>, LocatorError>;

    /// Wait until the element is clickable and read one of its attributes
    async fn attribute_when_ready(
        &self,
        target: &Target,
        attribute: &str,
        timeout: Duration,
    ) -> Result<Option<String>, LocatorError>;

    /// Wait until at least one matching element is present.
    /// Returns `false` if the wait ran out.
    async fn wait_for(&self, target: &Target, timeout: Duration) -> Result<bool, LocatorError>;
}

/// A live browser owned by exactly one scrape session
#[async_trait]
pub trait BrowserHandle: ElementLocator {
    async fn open(&self, url: &str) -> Result<(), LocatorError>;

    /// Shut the browser down. Later calls are no-ops.
    async fn release(&mut self) -> Result<(), LocatorError>;
}

/// Produces a fresh browser for each scrape run
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserHandle>>;
}
