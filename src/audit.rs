//! Append-only audit trail of connection lifecycle transitions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

pub const DEFAULT_AUDIT_LOG_FILE: &str = "websocket.log";

/// Text file receiving one `[timestamp] message` line per transition.
#[derive(Clone, Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a line stamped with the current time, creating the file
    /// if needed.
    pub async fn append(&self, message: &str) -> std::io::Result<()> {
        let line = format_line(Utc::now(), message);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// `[2024-01-01T00:00:00.000Z] message\n`
pub fn format_line(at: DateTime<Utc>, message: &str) -> String {
    format!(
        "[{}] {message}\n",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}
