use anyhow::{Result, Context};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

use crate::browser::{BrowserHandle, BrowserLauncher};
use crate::cli::config::SiteSettings;
use crate::crawler::pacing::{FixedDelay, Pacer};
use crate::crawler::task::{PageBatch, ScrapeStatus, ScrapeSummary, Skip, Termination};
use crate::crawler::walker::{PaginationWalker, Step};
use crate::storage::ListingSink;

/// One scrape run: launches a browser, walks every result page and appends each
/// batch to the sinks in order. Always produces a summary.
pub struct ScrapeSession {
    site: SiteSettings,
    launcher: Arc<dyn BrowserLauncher>,
    /// Written in order: spreadsheet first, then the relational store
    sinks: Vec<Arc<dyn ListingSink>>,
    initial_load: Arc<dyn Pacer>,
    settle: Arc<dyn Pacer>,
}

/// Running totals of a scrape
struct Tally {
    started_at: DateTime<Utc>,
    domains: Vec<String>,
    pages: u32,
    skips: Vec<Skip>,
    errors: Vec<String>,
}

impl Tally {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            domains: Vec::new(),
            pages: 0,
            skips: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn into_summary(self, termination: Option<Termination>) -> ScrapeSummary {
        let status = if self.errors.is_empty() {
            ScrapeStatus::Completed
        } else {
            ScrapeStatus::CompletedWithErrors
        };

        ScrapeSummary {
            status,
            message: format!("Scraped {} domains from {} pages", self.domains.len(), self.pages),
            total_domains: self.domains.len(),
            total_pages: self.pages,
            domains: self.domains,
            termination,
            skips: self.skips,
            errors: self.errors,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

impl ScrapeSession {
    pub fn new(
        site: SiteSettings,
        launcher: Arc<dyn BrowserLauncher>,
        sinks: Vec<Arc<dyn ListingSink>>,
    ) -> Self {
        let initial_load = Arc::new(FixedDelay::from_secs(site.initial_load_secs));
        let settle = Arc::new(FixedDelay::from_secs(site.page_settle_secs));

        Self {
            site,
            launcher,
            sinks,
            initial_load,
            settle,
        }
    }

    /// Replace the fixed delays used while loading pages
    pub fn with_pacers(mut self, initial_load: Arc<dyn Pacer>, settle: Arc<dyn Pacer>) -> Self {
        self.initial_load = initial_load;
        self.settle = settle;
        self
    }

    /// Run the scrape to the end. Errors are recorded in the summary, never returned.
    pub async fn execute(&self) -> ScrapeSummary {
        info!("Scraping started: {}", self.site.start_url);
        let mut tally = Tally::start();

        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!("Failed to launch browser: {:#}", e);
                tally.errors.push(format!("browser launch failed: {:#}", e));
                return tally.into_summary(None);
            }
        };

        let walked = AssertUnwindSafe(self.walk(browser.as_ref(), &mut tally))
            .catch_unwind()
            .await;

        let termination = match walked {
            Ok(Ok(termination)) => Some(termination),
            Ok(Err(e)) => {
                error!("An error occurred during scraping: {:#}", e);
                tally.errors.push(format!("{:#}", e));
                None
            }
            Err(_) => {
                error!("Scrape aborted by a panic");
                tally.errors.push("scrape aborted unexpectedly".to_string());
                None
            }
        };

        if let Err(e) = browser.release().await {
            error!("Error closing browser session: {}", e);
            tally.errors.push(e.to_string());
        }
        info!("Scraping finished. Browser closed.");

        tally.into_summary(termination)
    }

    async fn walk(&self, browser: &dyn BrowserHandle, tally: &mut Tally) -> Result<Termination> {
        browser.open(&self.site.start_url).await
            .context(format!("Failed to open {}", self.site.start_url))?;
        self.initial_load.pause().await;

        let mut walker = PaginationWalker::new(browser, self.site.clone(), self.site.page_size, self.settle.clone());

        let outcome = loop {
            match walker.next_batch().await {
                Ok(Step::Batch(batch)) => {
                    info!("Processing page {}", batch.page);
                    self.deliver(&batch, tally).await;
                    tally.pages = walker.pages();
                }
                Ok(Step::Done(termination)) => break Ok(termination),
                Err(e) => break Err(e.into()),
            }
        };

        tally.skips = walker.skips().to_vec();
        outcome
    }

    /// Hand one batch to every sink; a failing sink does not stop the others
    async fn deliver(&self, batch: &PageBatch, tally: &mut Tally) {
        for sink in &self.sinks {
            if let Err(e) = sink.append_listings(&batch.listings).await {
                error!("Failed to write page {} to {}: {:#}", batch.page, sink.name(), e);
                tally.errors.push(format!("{} sink failed on page {}: {:#}", sink.name(), batch.page, e));
            }
        }

        tally.domains.extend(batch.domains());
        info!("Added {} domains. Total domains scraped: {}", batch.len(), tally.domains.len());
    }
}
