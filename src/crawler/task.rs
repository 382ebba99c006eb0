use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use std::fmt;

/// A scraped domain name and the page it was found on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainListing {
    /// Domain name as rendered by the site
    pub domain: String,

    /// 1-based index of the result page
    pub page: u32,
}

/// All new listings read from one rendered result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBatch {
    pub page: u32,
    pub listings: Vec<DomainListing>,
}

impl PageBatch {
    pub fn domains(&self) -> Vec<String> {
        self.listings.iter().map(|l| l.domain.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The current page rendered no listings
    EmptyPage,
    /// No clickable "next" control within the wait
    NextUnavailable,
    /// The "next" control carries the disabled marker
    NextDisabled,
    /// Every listing on the page was already yielded this run
    Stalled,
    /// Configured page cap reached
    PageLimit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Termination::EmptyPage => "no listings on page",
            Termination::NextUnavailable => "next control not available",
            Termination::NextDisabled => "next control disabled",
            Termination::Stalled => "page repeated previous listings",
            Termination::PageLimit => "page limit reached",
        };
        f.write_str(text)
    }
}

/// A UI failure that was tolerated without ending the walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skip {
    pub step: String,
    pub reason: String,
}

/// Final state of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrapeStatus {
    Completed,
    CompletedWithErrors,
}

/// Summary returned by every scrape run, including failed ones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub status: ScrapeStatus,
    pub message: String,
    pub domains: Vec<String>,
    pub total_domains: usize,
    pub total_pages: u32,
    pub termination: Option<Termination>,
    pub skips: Vec<Skip>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
