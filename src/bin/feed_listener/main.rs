//! backpack.tf listing feed listener.
//!
//! This binary connects to the backpack.tf events socket, filters listing
//! events with the configured policy and reports forwarded listings.

mod config;
mod error;
mod store;

use std::{process::exit, sync::Arc};

use autopricer_feed::{
    audit::AuditLog,
    connection::{ConnectionManager, FeedHandler},
    filter::FilterChain,
    logs::LogViewer,
    pipeline::Pipeline,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use config::{CliConfig, EnvConfig};
use error::{Error, Result};
use store::TracingStore;

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(env_config, cli_config).await {
        error!(%e, "Feed listener encountered an error, shutting down");
        exit(1);
    }
}

async fn run(env_config: EnvConfig, cli_config: CliConfig) -> Result<()> {
    let context = cli_config.filter_context()?;
    let skus = cli_config.sku_map()?;
    let venue = env_config.venue()?;
    info!(
        allowed = context.allowed_item_names().len(),
        skus = skus.len(),
        url = %venue.url(),
        "Loaded configuration"
    );

    if let Some(addr) = cli_config.serve_logs {
        let viewer = LogViewer::new(env_config.log_dir().ok_or(Error::NoLogDir)?);
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, dir = %viewer.dir().display(), "Serving log viewer");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, viewer.router()).await {
                error!(%e, "Log viewer stopped");
            }
        });
    }

    let pipeline = Pipeline::new(
        FilterChain::new(Arc::new(context), skus),
        Arc::new(TracingStore),
    );
    let handler = FeedHandler::new(pipeline, AuditLog::new(env_config.audit_log_file()));
    ConnectionManager::new(venue, handler)
        .run(tokio::time::sleep)
        .await?;
    Ok(())
}
