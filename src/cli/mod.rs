pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk every result page of the auction site and store the listed domains
    Scrape,

    /// Fetch metrics for the given domains, chunk by chunk
    Metrics {
        /// Domains or URLs to look up
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Fetch metrics for the domains in the first column of a CSV or XLSX file
    MetricsFile {
        #[arg(required = true)]
        path: PathBuf,
    },

    /// Fetch metrics for the domains in the configured spreadsheet range
    MetricsSheet,

    /// Run the HTTP service
    Serve {
        /// Address to listen on, overrides the configuration
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Show or initialize the configuration
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Scrape => {
            info!("Starting scrape");
            commands::scrape(config_path).await
        },
        Commands::Metrics { targets } => {
            info!("Fetching metrics for {} targets", targets.len());
            commands::metrics(config_path, targets).await
        },
        Commands::MetricsFile { path } => {
            info!("Fetching metrics for targets in {}", path.display());
            commands::metrics_file(config_path, &path).await
        },
        Commands::MetricsSheet => {
            info!("Fetching metrics for spreadsheet targets");
            commands::metrics_sheet(config_path).await
        },
        Commands::Serve { bind } => commands::serve(config_path, bind).await,
        Commands::Config { show } => {
            if show {
                commands::show_config(config_path).await
            } else {
                commands::init_config(config_path).await
            }
        },
    }
}
