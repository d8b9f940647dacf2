//! HTTP view of the process log files.
//!
//! `GET /logs?file=<name>` renders the tail of one of [`LOG_FILES`], read
//! from the viewer's log directory at request time.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

/// Files the viewer is allowed to serve, the first one is the default.
pub const LOG_FILES: [&str; 2] = ["tf2-autopricer-out.log", "tf2-autopricer-error.log"];

/// Characters kept from the end of the file.
pub const TAIL_CHARS: usize = 15_000;

/// Page reload period.
pub const REFRESH_MS: u64 = 500_000;

#[derive(Clone, Debug)]
pub struct LogViewer {
    dir: Arc<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    file: Option<String>,
}

impl LogViewer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
        }
    }

    /// `$HOME/.pm2/logs`, falling back to `%USERPROFILE%`.
    pub fn default_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".pm2").join("logs"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/logs", get(show_log))
            .with_state(self.clone())
    }
}

async fn show_log(State(viewer): State<LogViewer>, Query(query): Query<LogQuery>) -> Response {
    let file = query
        .file
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| LOG_FILES[0].to_owned());
    if !LOG_FILES.contains(&file.as_str()) {
        return (StatusCode::BAD_REQUEST, "Invalid log file requested.").into_response();
    }

    let buttons = LOG_FILES
        .iter()
        .map(|f| format!(r#"<a href="/logs?file={f}"><button>{f}</button></a>"#))
        .join(" ");

    match tokio::fs::read(viewer.dir.join(&file)).await {
        Ok(bytes) => {
            let data = String::from_utf8_lossy(&bytes);
            let body = format!(
                r#"{buttons}
<hr>
<pre id="logbox">{}</pre>
<script>
  setTimeout(() => {{
    window.location.reload();
  }}, {REFRESH_MS});
</script>"#,
                escape_html(tail(&data, TAIL_CHARS))
            );
            Html(render_page(&format!("Logs - {file}"), &body)).into_response()
        }
        Err(e) => {
            debug!(%file, %e, "Failed to read log file");
            let body = format!(
                "{buttons}<hr><p>Error reading log: {file}</p><pre>{}</pre>",
                escape_html(&e.to_string())
            );
            Html(render_page("Logs", &body)).into_response()
        }
    }
}

fn render_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    )
}

/// Last `n` characters of `text`.
fn tail(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
