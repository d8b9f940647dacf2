//! Push-socket session lifecycle.
//!
//! [`ConnectionManager`] keeps a session to the [`Venue`] open for the
//! lifetime of the process, reconnecting after every close, and reports
//! each lifecycle transition to an injected [`TransportEventHandler`].
//! Handlers can't distinguish the first connection from a reconnection.
//!
//! [`FeedHandler`] is the handler used in production: it writes every
//! transition to the [`AuditLog`] and feeds messages to the [`Pipeline`].

use std::{future::Future, time::Duration};

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::{
    Venue,
    audit::AuditLog,
    error::Result,
    filter::SkuResolver,
    pipeline::{ListingStore, Pipeline},
};

/// Session transition, as observed by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Open,

    /// Reason is empty when the peer gave none, or the session was lost.
    Close { reason: String },

    Error(String),

    /// Text of a text frame, or of a UTF-8 binary frame.
    Message(String),
}

/// Receiver of session transitions.
///
/// An error returned from [`TransportEventHandler::on_message`] is fatal and
/// ends [`ConnectionManager::run`].
pub trait TransportEventHandler: Send + Sync {
    fn on_open(&self) -> impl Future<Output = ()> + Send;

    fn on_close(&self, reason: &str) -> impl Future<Output = ()> + Send;

    fn on_error(&self, message: &str) -> impl Future<Output = ()> + Send;

    fn on_message(&self, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Capped exponential delay between reconnection attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay following `delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }
}

#[derive(Debug)]
pub struct ConnectionManager<H> {
    venue: Venue,
    handler: H,
    reconnect: ReconnectPolicy,
}

impl<H: TransportEventHandler> ConnectionManager<H> {
    pub fn new(venue: Venue, handler: H) -> Self {
        Self {
            venue,
            handler,
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Routes a transition to the matching handler callback.
    pub async fn dispatch(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Open => self.handler.on_open().await,
            TransportEvent::Close { reason } => self.handler.on_close(&reason).await,
            TransportEvent::Error(message) => self.handler.on_error(&message).await,
            TransportEvent::Message(text) => return self.handler.on_message(&text).await,
        }
        Ok(())
    }

    /// Keeps the session open, reconnecting after `sleep`-ing for the
    /// policy delay.
    ///
    /// Only returns on a fatal error: an invalid venue request, or a
    /// message rejected by the handler.
    pub async fn run<S, SFut>(&self, sleep: S) -> Result<()>
    where
        S: Fn(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let mut delay = self.reconnect.initial_delay;
        loop {
            let request = self.venue.request()?;
            match connect_async(request).await {
                Ok((stream, _)) => {
                    delay = self.reconnect.initial_delay;
                    self.session(stream).await?;
                }
                Err(e) => {
                    self.dispatch(TransportEvent::Error(e.to_string())).await?;
                    self.dispatch(TransportEvent::Close {
                        reason: String::new(),
                    })
                    .await?;
                }
            }
            debug!(?delay, url = %self.venue.url(), "Reconnecting");
            sleep(delay).await;
            delay = self.reconnect.next_delay(delay);
        }
    }

    /// Pongs are queued by tungstenite itself and flushed on the next read.
    async fn session(&self, mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Result<()> {
        self.dispatch(TransportEvent::Open).await?;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(message) => {
                    let Some(event) = classify(message) else {
                        continue;
                    };
                    let closed = matches!(event, TransportEvent::Close { .. });
                    self.dispatch(event).await?;
                    if closed {
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.dispatch(TransportEvent::Error(e.to_string())).await?;
                    break;
                }
            }
        }
        self.dispatch(TransportEvent::Close {
            reason: String::new(),
        })
        .await
    }
}

/// Maps an inbound frame to the transition it represents.
///
/// Control frames other than close, and binary frames that are not
/// UTF-8, carry nothing for the handler.
pub fn classify(message: Message) -> Option<TransportEvent> {
    match message {
        Message::Text(text) => Some(TransportEvent::Message(text)),
        Message::Binary(data) => String::from_utf8(data).ok().map(TransportEvent::Message),
        Message::Close(frame) => Some(TransportEvent::Close {
            reason: frame.map(|f| f.reason.into_owned()).unwrap_or_default(),
        }),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

/// Production handler: audits transitions and ingests messages.
#[derive(Debug)]
pub struct FeedHandler<R, S> {
    pipeline: Pipeline<R, S>,
    audit: AuditLog,
}

impl<R: SkuResolver, S: ListingStore> FeedHandler<R, S> {
    pub fn new(pipeline: Pipeline<R, S>, audit: AuditLog) -> Self {
        Self { pipeline, audit }
    }

    pub fn pipeline(&self) -> &Pipeline<R, S> {
        &self.pipeline
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    async fn audit(&self, message: &str) {
        if let Err(e) = self.audit.append(message).await {
            warn!(path = %self.audit.path().display(), %e, "Failed to write audit log");
        }
    }
}

impl<R: SkuResolver, S: ListingStore> TransportEventHandler for FeedHandler<R, S> {
    async fn on_open(&self) {
        let message = "[WebSocket] Connected to bptf socket.";
        info!("{message}");
        self.audit(message).await;
    }

    async fn on_close(&self, reason: &str) {
        let message = format!("[WebSocket] bptf Socket connection closed. {reason}");
        warn!("{message}");
        self.audit(&message).await;
    }

    async fn on_error(&self, error: &str) {
        let message = format!("[WebSocket] bptf Socket encountered an error: {error}");
        error!("{message}");
        self.audit(&message).await;
    }

    async fn on_message(&self, text: &str) -> Result<()> {
        self.pipeline.handle_message(text).map(drop)
    }
}
