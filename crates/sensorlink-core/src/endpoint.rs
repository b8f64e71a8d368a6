//! Controller endpoint address.

use std::fmt;

use thiserror::Error;

/// Address of a sensor controller.
///
/// Validated at construction and immutable for the lifetime of one
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

/// Endpoint validation error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("port must be in 1..=65535")]
    ZeroPort,
}

impl Endpoint {
    /// Create a validated endpoint.
    ///
    /// # Errors
    /// Returns an error for an empty host or port 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if port == 0 {
            return Err(EndpointError::ZeroPort);
        }
        Ok(Self { host, port })
    }

    /// Controller host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Controller TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Dial URL for the duplex transport.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
