// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Oakwatch CLI
//!
//! `serve` (the default) starts the HTTP API; `scan` runs one pass and prints
//! the result JSON, which is handy on a field laptop without the frontend.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use oakwatch::classifier::ClassificationAdapter;
use oakwatch::config::AppConfig;
use oakwatch::geotag::{Coordinate, GeoTagExtractor};
use oakwatch::scan::ScanOrchestrator;
use oakwatch::scorer::HttpScorer;
use oakwatch::web::{self, AppState};
use oakwatch::Result;

/// Oakwatch - oak wilt photo triage for survey drives
#[derive(Parser, Debug)]
#[command(name = "oakwatch")]
#[command(version = "1.2.0")]
#[command(about = "Scans a removable drive for recent photos and triages them for oak wilt", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API (default)
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one scan and print the result JSON
    Scan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Oakwatch v1.2.0 - Oak Wilt Photo Triage");
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port).await,
        Some(Commands::Scan) => run_scan_once(config).await,
        None => run_serve(config, None, None).await,
    }
}

fn build_orchestrator(config: &AppConfig) -> Result<ScanOrchestrator> {
    let scorer = HttpScorer::new(&config.classifier.url, config.classifier.timeout_secs)?;
    let adapter = ClassificationAdapter::new(Arc::new(scorer), config.classifier.input_edge);
    let geotag = GeoTagExtractor::new(Coordinate {
        lat: config.geotag.fallback_lat,
        lon: config.geotag.fallback_lon,
    });

    Ok(ScanOrchestrator::new(config.clone(), adapter, geotag))
}

async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    info!("Watching for drive at {}", config.scan.mount_path);
    info!("Scorer endpoint: {}", config.classifier.url);

    let orchestrator = build_orchestrator(&config)?;
    let state = Arc::new(AppState { orchestrator });

    web::start_server(config, state).await
}

async fn run_scan_once(config: AppConfig) -> Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let outcome = orchestrator.run_scan().await?;

    let all: Vec<_> = outcome.result.all().collect();
    println!("{}", serde_json::to_string_pretty(&all)?);

    info!(
        "Scan complete: {} records on {:?} (csv: {:?}, geojson: {:?})",
        outcome.result.len(),
        outcome.mount,
        outcome.csv_path,
        outcome.geojson_path
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["oakwatch"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_overrides() {
        let cli = Cli::try_parse_from(["oakwatch", "serve", "--port", "8080"]).unwrap();
        match cli.command {
            Some(Commands::Serve { port, .. }) => assert_eq!(port, Some(8080)),
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_scan_command() {
        let cli = Cli::try_parse_from(["oakwatch", "scan", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Scan)));
    }
}
