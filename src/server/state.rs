use anyhow::{Result, Context};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::browser::WebDriverLauncher;
use crate::cli::config::HarvesterConfig;
use crate::crawler::{FixedDelay, ScrapeSession, ScrapeSummary};
use crate::enrichment::{BatchMetricsClient, EnrichReport, MozClient};
use crate::storage::{ListingSink, PostgresStore, SheetsClient};

/// Components built once from the configuration and shared by every request
pub struct AppState {
    pub scrape: ScrapeSession,
    pub metrics: BatchMetricsClient,
    pub chunk_size: usize,
    pub sheets: Option<Arc<SheetsClient>>,
    pub source_range: String,
    /// Scrape runs never overlap
    scrape_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        scrape: ScrapeSession,
        metrics: BatchMetricsClient,
        chunk_size: usize,
        sheets: Option<Arc<SheetsClient>>,
        source_range: String,
    ) -> Self {
        Self {
            scrape,
            metrics,
            chunk_size,
            sheets,
            source_range,
            scrape_lock: Mutex::new(()),
        }
    }

    /// Connect the stores and clients named in the configuration
    pub async fn build(config: &HarvesterConfig) -> Result<Self> {
        let store = Arc::new(PostgresStore::connect(&config.storage).await?);

        let sheets = if config.sheets.enabled {
            let client = SheetsClient::new(&config.sheets, config.metrics.request_timeout())
                .context("Failed to set up spreadsheet client")?;
            Some(Arc::new(client))
        } else {
            info!("Spreadsheet sink disabled");
            None
        };

        let mut sinks: Vec<Arc<dyn ListingSink>> = Vec::new();
        if let Some(sheets) = &sheets {
            sinks.push(sheets.clone());
        }
        sinks.push(store.clone());

        let launcher = Arc::new(WebDriverLauncher::new(config.browser.clone()));
        let scrape = ScrapeSession::new(config.site.clone(), launcher, sinks);

        let api = Arc::new(MozClient::new(&config.metrics)?);
        let pacer = Arc::new(FixedDelay::new(config.metrics.chunk_pause()));
        let metrics = BatchMetricsClient::new(api, store, pacer);

        Ok(Self::new(
            scrape,
            metrics,
            config.metrics.chunk_size,
            sheets,
            config.sheets.source_range.clone(),
        ))
    }

    /// Run one scrape, waiting for any run already in progress
    pub async fn run_scrape(&self) -> ScrapeSummary {
        let _guard = self.scrape_lock.lock().await;
        self.scrape.execute().await
    }

    /// Enrich every identifier listed in the spreadsheet's source range
    pub async fn metrics_from_sheet(&self) -> Result<EnrichReport> {
        let sheets = self.sheets.as_ref()
            .context("Spreadsheet access is disabled in the configuration")?;

        let targets = sheets.read_column(&self.source_range).await?;
        info!("Read {} targets from {}", targets.len(), self.source_range);

        let report = self.metrics.enrich(&targets, self.chunk_size).await?;
        Ok(report)
    }
}
