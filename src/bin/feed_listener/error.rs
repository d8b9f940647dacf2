//! Error types for the feed listener.

use crate::config::ConfigError;

/// Main error type for the feed listener.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidFeedUrl(#[from] url::ParseError),

    #[error("No log directory, set LOG_DIR")]
    NoLogDir,

    #[error("Log viewer error: {0}")]
    LogViewer(#[from] std::io::Error),

    #[error("Feed error: {0}")]
    Feed(#[from] autopricer_feed::error::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
