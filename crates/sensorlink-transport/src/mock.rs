//! Channel-backed transport for tests.
//!
//! Each dial hands the test a [`MockRemote`]: the remote end of the
//! link, with a sender for injecting transport events and a receiver
//! capturing every frame the session wrote.

use async_trait::async_trait;
use sensorlink_core::{
    Endpoint, TransportConnection, TransportConnector, TransportError, TransportEvent,
    TransportSink,
};
use tokio::sync::mpsc;

/// Remote end of a mock link.
pub struct MockRemote {
    /// Inject transport events into the session.
    pub events: mpsc::UnboundedSender<TransportEvent>,
    /// Frames the session wrote to the transport, in order.
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl MockRemote {
    /// Report the link as open.
    pub fn open(&self) {
        let _ = self.events.send(TransportEvent::Opened);
    }

    /// Deliver a raw inbound frame.
    pub fn message(&self, origin: &str, text: &str) {
        let _ = self.events.send(TransportEvent::Message {
            origin: origin.to_string(),
            text: text.to_string(),
        });
    }

    /// Report the link as closed by the remote side.
    pub fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed);
    }
}

/// Connector whose dials are served by in-process channels.
pub struct MockConnector {
    remotes: mpsc::UnboundedSender<MockRemote>,
    fail: bool,
}

impl MockConnector {
    /// Connector whose dials succeed. The returned receiver yields one
    /// [`MockRemote`] per dial.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockRemote>) {
        let (remotes, rx) = mpsc::unbounded_channel();
        (
            Self {
                remotes,
                fail: false,
            },
            rx,
        )
    }

    /// Connector whose dials are refused.
    #[must_use]
    pub fn refusing() -> Self {
        let (remotes, _) = mpsc::unbounded_channel();
        Self {
            remotes,
            fail: true,
        }
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportConnection, TransportError> {
        if self.fail {
            return Err(TransportError::Open {
                url: endpoint.url(),
                reason: "connection refused".to_string(),
            });
        }

        let (event_tx, events) = mpsc::unbounded_channel();
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let _ = self.remotes.send(MockRemote {
            events: event_tx.clone(),
            outbound,
        });

        Ok(TransportConnection {
            sink: Box::new(MockSink {
                outbound: outbound_tx,
                events: event_tx,
            }),
            events,
        })
    }
}

/// Write half of a mock link. Closing completes the close handshake
/// immediately by emitting [`TransportEvent::Closed`] on the feed.
struct MockSink {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.outbound
            .send(text.to_string())
            .map_err(|_| TransportError::Send("mock link closed".to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let _ = self.events.send(TransportEvent::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dial_yields_remote_and_captures_sends() {
        let (connector, mut remotes) = MockConnector::new();
        let endpoint = Endpoint::new("10.0.0.5", 81).unwrap();

        let mut conn = connector.connect(&endpoint).await.unwrap();
        let mut remote = remotes.recv().await.unwrap();

        conn.sink.send("GET_ALL").await.unwrap();
        assert_eq!(remote.outbound.recv().await.unwrap(), "GET_ALL");

        remote.message("ws://10.0.0.5:81", r#"{"status":"DONE"}"#);
        assert!(matches!(
            conn.events.recv().await.unwrap(),
            TransportEvent::Message { .. }
        ));
    }

    #[tokio::test]
    async fn test_refusing_connector_fails_dial() {
        let connector = MockConnector::refusing();
        let endpoint = Endpoint::new("10.0.0.5", 81).unwrap();
        let err = connector.connect(&endpoint).await.unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
