use anyhow::{Result, Context};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::cli::config::SheetsSettings;
use crate::crawler::task::DomainListing;
use crate::storage::sink::ListingSink;

/// Response shape of the values endpoints
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Google Sheets v4 client for one spreadsheet
pub struct SheetsClient {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    append_range: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(settings: &SheetsSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: settings.spreadsheet_id.clone(),
            append_range: settings.append_range.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    fn values_url(&self, range_segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .context(format!("Invalid Sheets API base URL: {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets API base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range_segment]);
        Ok(url)
    }

    /// Append rows below the existing data of the configured range
    pub async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<()> {
        let url = self.values_url(&format!("{}:append", self.append_range))?;
        let row_count = rows.len();

        let response = self.client.post(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&serde_json::json!({ "values": rows }))
            .send()
            .await
            .context("Failed to send rows to Sheets API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Sheets append failed with {}: {}", status, error_text);
            anyhow::bail!("Sheets append failed with {}: {}", status, error_text);
        }

        debug!("Appended {} rows to spreadsheet", row_count);

        Ok(())
    }

    /// First cell of every non-empty row in `range`
    pub async fn read_column(&self, range: &str) -> Result<Vec<String>> {
        let url = self.values_url(range)?;

        let response = self.client.get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to read values from Sheets API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Sheets read failed with {}: {}", status, error_text);
        }

        let range: ValueRange = response.json().await
            .context("Failed to parse Sheets API response")?;

        let column = range.values
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|cell| match cell {
                serde_json::Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|cell| !cell.is_empty())
            .collect();

        Ok(column)
    }
}

#[async_trait]
impl ListingSink for SheetsClient {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    async fn append_listings(&self, listings: &[DomainListing]) -> Result<()> {
        if listings.is_empty() {
            return Ok(());
        }
        let rows = listings.iter().map(|l| vec![l.domain.clone()]).collect();
        self.append_rows(rows).await
    }
}
