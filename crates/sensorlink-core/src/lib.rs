//! Core abstractions for the sensorlink controller client.
//!
//! This crate provides the fundamental building blocks:
//! - `protocol` - Wire payload types and the frame codec
//! - `Journal` - Append-only event log with snapshot folding
//! - `Endpoint` - Validated controller address
//! - Transport contract traits

pub mod endpoint;
pub mod journal;
pub mod protocol;
pub mod transport;

pub use endpoint::{Endpoint, EndpointError};
pub use journal::{Journal, LogEntry};
pub use protocol::{DecodeError, SensorPayload, SensorReading};
pub use transport::{
    TransportConnection, TransportConnector, TransportError, TransportEvent, TransportSink,
};
