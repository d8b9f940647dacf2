//! Configuration for the feed listener.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): file locations, venue override
//! - CLI arguments: filter policy and item schema files, log viewer address

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use autopricer_feed::{
    Venue,
    audit::DEFAULT_AUDIT_LOG_FILE,
    filter::{FilterConfig, FilterContext},
    logs::LogViewer,
    types::Sku,
};
use clap::Parser;

/// Environment configuration.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EnvConfig {
    /// Audit log of socket lifecycle events (default: websocket.log)
    pub audit_log_file: Option<PathBuf>,

    /// Directory the log viewer reads from (default: ~/.pm2/logs)
    pub log_dir: Option<PathBuf>,

    /// Feed address overriding the backpack.tf events socket
    pub feed_url: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn audit_log_file(&self) -> PathBuf {
        self.audit_log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG_FILE))
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(LogViewer::default_dir)
    }

    /// Venue to connect to, the override keeps the backpack.tf headers.
    pub fn venue(&self) -> Result<Venue, url::ParseError> {
        match &self.feed_url {
            Some(url) => Ok(Venue::custom(url.parse()?).with_header("batch-test", "true")),
            None => Ok(Venue::backpack_tf()),
        }
    }
}

/// CLI arguments of the feed listener.
#[derive(Debug, Parser)]
#[command(name = "feed-listener")]
#[command(about = "Ingests backpack.tf listing events into listing storage")]
pub struct CliConfig {
    /// JSON filter policy (allowedItemNames, excludedSteamIds,
    /// excludedListingDescriptions, blockedAttributes)
    #[arg(long)]
    pub filter_config: PathBuf,

    /// JSON object mapping item names to skus
    #[arg(long)]
    pub sku_map: PathBuf,

    /// Serve the log viewer on this address (e.g., 127.0.0.1:3000)
    #[arg(long)]
    pub serve_logs: Option<SocketAddr>,
}

impl CliConfig {
    pub fn filter_context(&self) -> Result<FilterContext, ConfigError> {
        parse_filter_context(&read(&self.filter_config)?, &self.filter_config)
    }

    pub fn sku_map(&self) -> Result<HashMap<String, Sku>, ConfigError> {
        parse_sku_map(&read(&self.sku_map)?, &self.sku_map)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })
}

fn parse_filter_context(text: &str, path: &Path) -> Result<FilterContext, ConfigError> {
    let config: FilterConfig = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })?;
    Ok(FilterContext::from_config(config)?)
}

fn parse_sku_map(text: &str, path: &Path) -> Result<HashMap<String, Sku>, ConfigError> {
    serde_json::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid filter configuration: {0}")]
    Filter(#[from] autopricer_feed::error::Error),
}
