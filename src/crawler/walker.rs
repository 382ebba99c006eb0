use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{ElementLocator, LocatorError};
use crate::cli::config::SiteSettings;
use crate::crawler::pacing::Pacer;
use crate::crawler::task::{DomainListing, PageBatch, Skip, Termination};

/// Outcome of one pull from the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Batch(PageBatch),
    Done(Termination),
}

/// A failure that ends the walk
#[derive(Debug, Error)]
#[error("{step} failed on page {page}: {source}")]
pub struct WalkError {
    pub step: &'static str,
    pub page: u32,
    #[source]
    pub source: LocatorError,
}

/// Walks result pages one at a time until the site runs out of listings.
///
/// Setup (cookie banner, page size) happens on the first pull and navigation to
/// the next page happens on the pull after a batch was handed out, so callers
/// finish with a batch before the browser moves on.
pub struct PaginationWalker<'a, L: ElementLocator + ?Sized> {
    locator: &'a L,
    site: SiteSettings,
    page_size: u32,
    settle: Arc<dyn Pacer>,
    started: bool,
    /// Pages yielded so far
    page: u32,
    finished: Option<Termination>,
    seen: HashSet<String>,
    skips: Vec<Skip>,
}

impl<'a, L: ElementLocator + ?Sized> PaginationWalker<'a, L> {
    pub fn new(locator: &'a L, site: SiteSettings, page_size: u32, settle: Arc<dyn Pacer>) -> Self {
        Self {
            locator,
            site,
            page_size,
            settle,
            started: false,
            page: 0,
            finished: None,
            seen: HashSet::new(),
            skips: Vec::new(),
        }
    }

    /// Pull the next batch. Once a `Done` has been returned it is returned again.
    pub async fn next_batch(&mut self) -> Result<Step, WalkError> {
        if let Some(termination) = self.finished {
            return Ok(Step::Done(termination));
        }

        if self.started {
            if self.limit_reached() {
                return Ok(self.finish(Termination::PageLimit));
            }
            if let Some(termination) = self.advance().await? {
                return Ok(self.finish(termination));
            }
        } else {
            self.prepare().await?;
            self.started = true;
            if self.limit_reached() {
                return Ok(self.finish(Termination::PageLimit));
            }
        }

        self.read_page().await
    }

    /// Pages yielded so far
    pub fn pages(&self) -> u32 {
        self.page
    }

    pub fn skips(&self) -> &[Skip] {
        &self.skips
    }

    fn limit_reached(&self) -> bool {
        self.site.max_pages.map_or(false, |max| self.page >= max)
    }

    fn finish(&mut self, termination: Termination) -> Step {
        info!("Pagination finished after {} pages: {}", self.page, termination);
        self.finished = Some(termination);
        Step::Done(termination)
    }

    fn fatal(&self, step: &'static str, source: LocatorError) -> WalkError {
        WalkError { step, page: self.page + 1, source }
    }

    async fn prepare(&mut self) -> Result<(), WalkError> {
        let timeout = self.site.wait_timeout();

        // The banner is not shown to every visitor
        if let Err(e) = self.locator.click_when_ready(&self.site.cookie_banner, timeout).await {
            warn!("Cookie banner not accepted: {}", e);
            self.skips.push(Skip {
                step: "accept cookie banner".to_string(),
                reason: e.to_string(),
            });
        }

        self.locator
            .select_value(&self.site.per_page_control, &self.page_size.to_string())
            .await
            .map_err(|e| self.fatal("set page size", e))?;
        debug!("Results per page set to {}", self.page_size);

        self.settle.pause().await;
        Ok(())
    }

    /// Move to the following page, or report why that is not possible
    async fn advance(&mut self) -> Result<Option<Termination>, WalkError> {
        let timeout = self.site.wait_timeout();
        let next = &self.site.next_control;

        let class = match self.locator.attribute_when_ready(next, "class", timeout).await {
            Ok(class) => class.unwrap_or_default(),
            Err(e) if e.is_transient() => {
                debug!("Next control unavailable: {}", e);
                return Ok(Some(Termination::NextUnavailable));
            }
            Err(e) => return Err(self.fatal("locate next control", e)),
        };

        if class.split_whitespace().any(|c| c == self.site.disabled_class) {
            return Ok(Some(Termination::NextDisabled));
        }

        match self.locator.click_when_ready(next, timeout).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                debug!("Next control could not be activated: {}", e);
                return Ok(Some(Termination::NextUnavailable));
            }
            Err(e) => return Err(self.fatal("activate next control", e)),
        }
        debug!("Navigated past page {}", self.page);

        self.settle.pause().await;

        // An empty page never renders listings; the read that follows ends the walk
        match self.locator.wait_for(&self.site.listing, timeout).await {
            Ok(true) => {}
            Ok(false) => debug!("No listings rendered within {:?}", timeout),
            Err(e) if e.is_transient() => debug!("Waiting for listings failed: {}", e),
            Err(e) => return Err(self.fatal("wait for page render", e)),
        }

        Ok(None)
    }

    async fn read_page(&mut self) -> Result<Step, WalkError> {
        let page = self.page + 1;
        let values = self.locator
            .attribute_values(&self.site.listing, &self.site.listing_attribute)
            .await
            .map_err(|e| self.fatal("read listings", e))?;

        if values.is_empty() {
            return Ok(self.finish(Termination::EmptyPage));
        }

        let rendered = values.len();
        let listings: Vec<DomainListing> = values
            .into_iter()
            .filter(|domain| self.seen.insert(domain.clone()))
            .map(|domain| DomainListing { domain, page })
            .collect();

        if listings.is_empty() {
            warn!("Page {} only repeated {} listings already seen", page, rendered);
            return Ok(self.finish(Termination::Stalled));
        }

        if listings.len() < rendered {
            debug!("Dropped {} repeated listings on page {}", rendered - listings.len(), page);
        }

        self.page = page;
        Ok(Step::Batch(PageBatch { page, listings }))
    }
}
