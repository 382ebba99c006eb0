//! In-memory stand-in for the auction site used by walker and session tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::browser::{BrowserHandle, BrowserLauncher, ElementLocator, LocatorError, Target};
use crate::cli::config::HarvesterConfig;

/// State of the "next" control on the last page
#[derive(Debug, Clone, Copy)]
pub enum NextControl {
    Enabled,
    Disabled,
    Absent,
}

/// `counts[i]` unique domains on page `i + 1`
pub fn numbered_pages(counts: &[usize]) -> Vec<Vec<String>> {
    counts
        .iter()
        .enumerate()
        .map(|(page, count)| (0..*count).map(|i| format!("p{}-d{}.ca", page + 1, i + 1)).collect())
        .collect()
}

pub struct FakeSite {
    pages: Vec<Vec<String>>,
    last_next: NextControl,
    cookie_banner: bool,
    page_size_control: bool,
    stuck: bool,
    next_blocked: bool,
    fail_read_on: Option<usize>,
    current: Mutex<usize>,
    selected: Mutex<Option<String>>,
    next_clicks: AtomicUsize,
    releases: Arc<AtomicUsize>,
    targets: HarvesterConfig,
}

impl FakeSite {
    pub fn new(pages: Vec<Vec<String>>, last_next: NextControl) -> Self {
        Self {
            pages,
            last_next,
            cookie_banner: true,
            page_size_control: true,
            stuck: false,
            next_blocked: false,
            fail_read_on: None,
            current: Mutex::new(0),
            selected: Mutex::new(None),
            next_clicks: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            targets: HarvesterConfig::default(),
        }
    }

    pub fn without_cookie_banner(mut self) -> Self {
        self.cookie_banner = false;
        self
    }

    pub fn without_page_size_control(mut self) -> Self {
        self.page_size_control = false;
        self
    }

    pub fn stuck_on_first_page(mut self) -> Self {
        self.stuck = true;
        self
    }

    /// The next control renders but an overlay intercepts every click
    pub fn with_blocked_next(mut self) -> Self {
        self.next_blocked = true;
        self
    }

    /// Reading listings on the page at this 0-based index fails with a driver error
    pub fn failing_read_on(mut self, index: usize) -> Self {
        self.fail_read_on = Some(index);
        self
    }

    pub fn selected_page_size(&self) -> Option<String> {
        self.selected.lock().unwrap().clone()
    }

    pub fn next_clicks(&self) -> usize {
        self.next_clicks.load(Ordering::SeqCst)
    }

    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }

    fn current(&self) -> usize {
        *self.current.lock().unwrap()
    }

    fn next_state(&self) -> NextControl {
        let current = self.current();
        if current + 1 < self.pages.len() {
            NextControl::Enabled
        } else if current < self.pages.len() {
            self.last_next
        } else {
            NextControl::Absent
        }
    }
}

#[async_trait]
impl ElementLocator for FakeSite {
    async fn click_when_ready(&self, target: &Target, _timeout: Duration) -> Result<(), LocatorError> {
        if *target == self.targets.site.cookie_banner {
            return if self.cookie_banner {
                Ok(())
            } else {
                Err(LocatorError::Timeout(target.to_string()))
            };
        }

        match self.next_state() {
            NextControl::Absent => Err(LocatorError::Timeout(target.to_string())),
            _ if self.next_blocked => Err(LocatorError::NotInteractable(target.to_string())),
            _ => {
                self.next_clicks.fetch_add(1, Ordering::SeqCst);
                if !self.stuck {
                    *self.current.lock().unwrap() += 1;
                }
                Ok(())
            }
        }
    }

    async fn select_value(&self, target: &Target, value: &str) -> Result<(), LocatorError> {
        if !self.page_size_control {
            return Err(LocatorError::NotFound(target.to_string()));
        }
        *self.selected.lock().unwrap() = Some(value.to_string());
        Ok(())
    }

    async fn attribute_values(&self, _target: &Target, _attribute: &str) -> Result<Vec<String>, LocatorError> {
        let current = self.current();
        if self.fail_read_on == Some(current) {
            return Err(LocatorError::Driver("chrome not reachable".to_string()));
        }
        Ok(self.pages.get(current).cloned().unwrap_or_default())
    }

    async fn attribute_when_ready(
        &self,
        target: &Target,
        _attribute: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, LocatorError> {
        match self.next_state() {
            NextControl::Enabled => Ok(Some("page-link".to_string())),
            NextControl::Disabled => Ok(Some("page-link disabled".to_string())),
            NextControl::Absent => Err(LocatorError::Timeout(target.to_string())),
        }
    }

    async fn wait_for(&self, _target: &Target, _timeout: Duration) -> Result<bool, LocatorError> {
        Ok(self.current() < self.pages.len())
    }
}

#[async_trait]
impl BrowserHandle for FakeSite {
    async fn open(&self, _url: &str) -> Result<(), LocatorError> {
        Ok(())
    }

    async fn release(&mut self) -> Result<(), LocatorError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one prepared `FakeSite`, or fails when none was prepared
pub struct FakeLauncher {
    site: Mutex<Option<FakeSite>>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self { site: Mutex::new(Some(site)) }
    }

    pub fn unavailable() -> Self {
        Self { site: Mutex::new(None) }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserHandle>> {
        let site = self.site.lock().unwrap().take()
            .ok_or_else(|| anyhow::anyhow!("Failed to connect to WebDriver"))?;
        Ok(Box::new(site))
    }
}
