//! Transport implementations for the sensorlink client.
//!
//! Provides:
//! - WebSocket connector (feature: websocket)
//! - Channel-backed mock connector for tests (feature: mock)

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "websocket")]
pub use websocket::WsConnector;
