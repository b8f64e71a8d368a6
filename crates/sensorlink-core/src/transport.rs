//! Transport contract: four events in, one operation out.
//!
//! The concrete transport is an external collaborator. The core only
//! depends on this contract, so sessions can be driven by a WebSocket
//! link in production and a channel-backed double in tests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::Endpoint;

/// Event reported by an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link finished opening. Always the first event delivered.
    Opened,
    /// A text frame arrived.
    Message {
        /// Transport-reported source, e.g. the dial URL.
        origin: String,
        /// Raw frame text, undecoded.
        text: String,
    },
    /// The link closed, locally or by the remote side.
    Closed,
    /// A runtime transport fault. Does not by itself imply the link
    /// closed; a separate [`TransportEvent::Closed`] follows if it did.
    Error(String),
}

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Open { url: String, reason: String },
    #[error("send failed: {0}")]
    Send(String),
    #[error("close failed: {0}")]
    Close(String),
}

/// Write half of an open transport.
#[async_trait]
pub trait TransportSink: Send {
    /// Write raw text to the link.
    ///
    /// # Errors
    /// Returns an error if the write fails (link closed, I/O fault).
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Request link close. The matching [`TransportEvent::Closed`]
    /// arrives asynchronously on the event feed.
    ///
    /// # Errors
    /// Returns an error if the close request cannot be written.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An open transport: write half plus the ordered event feed.
pub struct TransportConnection {
    /// Write half.
    pub sink: Box<dyn TransportSink>,
    /// Ordered event feed; [`TransportEvent::Opened`] arrives first.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("sink", &"<dyn TransportSink>")
            .field("events", &self.events)
            .finish()
    }
}

/// Opens transports to a controller endpoint.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Dial the endpoint and perform any handshake.
    ///
    /// # Errors
    /// Returns an error if the link cannot be established.
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportConnection, TransportError>;
}
