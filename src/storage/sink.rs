use anyhow::Result;
use async_trait::async_trait;

use crate::crawler::task::DomainListing;
use crate::enrichment::record::MetricsRecord;

/// Append-only destination for scraped listings.
///
/// Every call appends; repeated domains across runs are kept as separate rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingSink: Send + Sync {
    /// Short name used in logs and error summaries
    fn name(&self) -> &'static str;

    /// Append listings in the given order
    async fn append_listings(&self, listings: &[DomainListing]) -> Result<()>;
}

/// Destination for enrichment results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Persist all records as one unit: either every record is stored or none is
    async fn append_metrics(&self, records: &[MetricsRecord]) -> Result<()>;
}
