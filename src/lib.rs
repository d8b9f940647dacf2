//! backpack.tf listing feed ingestion.
//!
//! # Overview
//!
//! Listens to the backpack.tf events socket, filters listing updates and
//! deletions, and forwards the accepted ones to listing storage.
//!
//! Use [`filter::FilterContext`] to describe which listings are of interest,
//! bind it to an item schema with [`filter::FilterChain`], then wrap the chain
//! and a [`pipeline::ListingStore`] in a [`pipeline::Pipeline`].
//! [`connection::ConnectionManager`] with a [`connection::FeedHandler`] keeps
//! the socket session alive and feeds it with inbound messages.
//!
//! [`scheduler::Scheduler`] periodically triggers the pricing jobs working on
//! the same storage, with no coordination with ingestion.
//!
//! [`logs::LogViewer`] serves the tails of the process logs over HTTP.
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Storage calls are fire-and-forget; nothing waits for in-flight calls
//!   on shutdown.
//!
//! * Missed socket messages during reconnection are not recovered.
//!
//! # Testing
//!
//! [`testing`] module provides a recording listing store and event fixtures.
//!

pub mod audit;
pub mod connection;
pub mod error;
pub mod filter;
pub mod logs;
pub mod normalizer;
pub mod pipeline;
pub mod scheduler;
pub mod testing;
pub mod types;

use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    handshake::client::Request,
    http::{HeaderName, HeaderValue},
};
use url::Url;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
/// Push feed the listings are streamed from.
pub struct Venue {
    url: String,
    headers: Vec<(String, String)>,
}

impl Venue {
    pub fn backpack_tf() -> Self {
        Self {
            url: "wss://ws.backpack.tf/events/".to_owned(),
            headers: vec![("batch-test".to_owned(), "true".to_owned())],
        }
    }

    pub fn custom(url: Url) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Handshake request carrying the venue headers.
    pub fn request(&self) -> Result<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }
}
