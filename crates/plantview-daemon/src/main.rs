//! Plantview Daemon - Main entry point
//!
//! Serves the viewer frontend, the equipment API, and large model assets
//! reconstructed from their stored parts.

mod api;
mod config;
mod proxy;
mod server;
mod state;
mod store;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "plantview")]
#[command(about = "Facility model viewer server with split asset reconstruction")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "plantview.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the configured split assets and exit
    #[arg(long)]
    list_assets: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Plantview v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    if args.list_assets {
        let catalog = config.asset_catalog()?;
        println!("{} split assets:", catalog.len());
        for asset in &catalog.asset {
            println!("  - {} ({} parts)", asset.name, asset.parts.len());
            for part in &asset.parts {
                println!("      {}", part);
            }
        }
        return Ok(());
    }

    let state = state::AppState::new(config.clone())?;
    server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await?;

    Ok(())
}
