//! WebSocket transport for the controller link.
//!
//! Thin wrapper around `tokio-tungstenite`: one dial function, a write
//! half implementing the core sink contract, and a reader task that maps
//! wire frames onto the four-event transport feed.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use sensorlink_core::{
    Endpoint, TransportConnection, TransportConnector, TransportError, TransportEvent,
    TransportSink,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

/// Concrete stream type (avoids repeating the generic everywhere).
type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connector dialing `ws://{host}:{port}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportConnection, TransportError> {
        let url = endpoint.url();
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Open {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(%url, "websocket open");

        let (sink, stream) = stream.split();
        let (event_tx, events) = mpsc::unbounded_channel();

        // The handshake already succeeded; report it on the feed so the
        // session observes open/message/close/error in one place.
        let _ = event_tx.send(TransportEvent::Opened);
        tokio::spawn(read_loop(stream, url, event_tx));

        Ok(TransportConnection {
            sink: Box::new(WsSink { sink }),
            events,
        })
    }
}

/// Write half of the WebSocket connection.
struct WsSink {
    sink: futures::stream::SplitSink<WsStream, tungstenite::Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}

/// Map inbound wire frames onto the event feed until the link ends.
async fn read_loop(
    mut stream: futures::stream::SplitStream<WsStream>,
    origin: String,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(tungstenite::Message::Text(text)) => {
                let message = TransportEvent::Message {
                    origin: origin.clone(),
                    text: text.to_string(),
                };
                if events.send(message).is_err() {
                    return;
                }
            }
            Ok(tungstenite::Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => {
                    let message = TransportEvent::Message {
                        origin: origin.clone(),
                        text,
                    };
                    if events.send(message).is_err() {
                        return;
                    }
                }
                Err(_) => {
                    tracing::warn!(%origin, "dropping non-UTF-8 binary frame");
                }
            },
            Ok(tungstenite::Message::Close(_)) => break,
            // Ping/pong are answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%origin, "websocket read error: {e}");
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
    let _ = events.send(TransportEvent::Closed);
}
