use anyhow::{Result, Context};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::config::HarvesterConfig;
use crate::crawler::ScrapeStatus;
use crate::enrichment::read_targets_from_path;
use crate::server::{self, AppState};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

async fn build_state(config_path: Option<&Path>) -> Result<(HarvesterConfig, AppState)> {
    let config = HarvesterConfig::load(config_path)?;
    let state = AppState::build(&config).await?;
    Ok((config, state))
}

/// Run one scrape and print its summary
pub async fn scrape(config_path: Option<&Path>) -> Result<()> {
    let (_, state) = build_state(config_path).await?;

    let summary = state.run_scrape().await;
    if summary.status == ScrapeStatus::CompletedWithErrors {
        warn!("Scrape finished with {} errors", summary.errors.len());
    }

    print_json(&summary)
}

/// Fetch metrics for targets given on the command line
pub async fn metrics(config_path: Option<&Path>, targets: Vec<String>) -> Result<()> {
    let (_, state) = build_state(config_path).await?;

    let report = state.metrics.enrich(&targets, state.chunk_size).await?;
    info!("Stored {} records from {} chunks", report.records, report.chunks);

    print_json(&report.responses)
}

/// Fetch metrics for targets read from a CSV or XLSX file
pub async fn metrics_file(config_path: Option<&Path>, path: &Path) -> Result<()> {
    let targets = read_targets_from_path(path)?;
    let (_, state) = build_state(config_path).await?;

    let report = state.metrics.enrich(&targets, state.chunk_size).await?;
    info!("Stored {} records from {} chunks", report.records, report.chunks);

    print_json(&report.responses)
}

/// Fetch metrics for targets listed in the spreadsheet
pub async fn metrics_sheet(config_path: Option<&Path>) -> Result<()> {
    let (_, state) = build_state(config_path).await?;

    let report = state.metrics_from_sheet().await?;
    info!("Stored {} records from {} chunks", report.records, report.chunks);

    print_json(&report.responses)
}

/// Run the HTTP service until interrupted
pub async fn serve(config_path: Option<&Path>, bind: Option<String>) -> Result<()> {
    let (config, state) = build_state(config_path).await?;
    let bind = bind.unwrap_or(config.server.bind);

    server::serve(&bind, Arc::new(state)).await
}

/// Show the effective configuration
pub async fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = HarvesterConfig::load(config_path)?;
    let text = serde_yaml::to_string(&config)
        .context("Failed to serialize configuration")?;

    println!("Current configuration:");
    println!("{}", text);

    Ok(())
}

/// Write the default configuration if none exists yet
pub async fn init_config(config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) if path.exists() => {
            println!("Configuration already exists at {}", path.display());
        },
        Some(path) => {
            HarvesterConfig::default().save_to_file(path)?;
            println!("Created default configuration at {}", path.display());
        },
        None => {
            // Creates default.yaml in the config directory when missing
            HarvesterConfig::load_default()?;
            println!("Default configuration is in place");
        },
    }

    Ok(())
}
