//! Wire protocol for the controller link.
//!
//! Outbound commands travel as the raw command string with no framing.
//! Inbound frames are percent-escaped JSON text; decoding un-escapes the
//! byte sequences and parses the result into [`SensorPayload`].

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status marking a fully completed request-response cycle.
pub const STATUS_DONE: &str = "DONE";
/// Status reported by the controller right after the link opens.
pub const STATUS_CONNECTED: &str = "CONNECTED";
/// Status carried by the synthetic decode-failure payload.
pub const STATUS_ERROR: &str = "ERROR";
/// Status of the synthetic entry logged for an outbound send.
pub const STATUS_SENT: &str = "SENT";

/// Request the water temperature reading.
pub const CMD_GET_WATER_TEMP: &str = "GET_WATER_TEMP";
/// Request the air temperature reading.
pub const CMD_GET_AIR_TEMP: &str = "GET_AIR_TEMP";
/// Request every reading the controller tracks.
pub const CMD_GET_ALL: &str = "GET_ALL";

/// A single named sensor reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sensor name, unique within a payload.
    pub name: String,
    /// Reading rendered as text by the controller.
    pub value: String,
}

impl SensorReading {
    /// Create a reading.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Decoded inbound payload.
///
/// `status` is required on the wire; `data` is absent on pure status
/// frames and defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPayload {
    /// Protocol status; drives command gating and auto-poll.
    pub status: String,
    /// Readings to fold into the snapshot.
    #[serde(default)]
    pub data: Vec<SensorReading>,
}

impl SensorPayload {
    /// Payload carrying a bare status and no readings.
    #[must_use]
    pub fn status_only(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            data: Vec::new(),
        }
    }

    /// Synthetic payload substituted when an inbound frame fails to decode.
    #[must_use]
    pub fn decode_error() -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            data: vec![SensorReading::new(STATUS_ERROR, STATUS_ERROR)],
        }
    }
}

/// Frame decode error.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid percent-escaped text: {0}")]
    Escape(#[from] std::str::Utf8Error),
    #[error("invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an outbound command.
///
/// The wire form is the raw command string; no framing or escaping.
#[must_use]
pub fn encode_command(command: &str) -> String {
    command.to_string()
}

/// Decode an inbound frame: un-escape percent-encoded byte sequences,
/// then parse the text as JSON.
///
/// # Errors
/// Returns an error on a malformed escape sequence, invalid JSON, or a
/// payload missing its `status` field. The session layer substitutes
/// [`SensorPayload::decode_error`] instead of surfacing this to callers.
pub fn decode_frame(raw: &str) -> Result<SensorPayload, DecodeError> {
    let text = percent_decode_str(raw).decode_utf8()?;
    Ok(serde_json::from_str(&text)?)
}

/// Whether manual commands are enabled for the given observed status.
///
/// A new command may be issued once the previous one fully completed
/// (`DONE`), right after the link opened (`CONNECTED`), or after a decode
/// failure (`ERROR`). Any other status, including `SENT`, keeps commands
/// gated until the controller answers.
#[must_use]
pub fn commands_enabled(status: Option<&str>) -> bool {
    matches!(status, Some(STATUS_DONE | STATUS_CONNECTED | STATUS_ERROR))
}

#[cfg(test)]
mod tests {
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

    use super::*;

    fn escape(text: &str) -> String {
        utf8_percent_encode(text, NON_ALPHANUMERIC).to_string()
    }

    #[test]
    fn test_decode_roundtrip() {
        let payload = SensorPayload {
            status: STATUS_DONE.to_string(),
            data: vec![
                SensorReading::new("WATER_TEMP", "21.5"),
                SensorReading::new("AIR_TEMP", "23°C"),
            ],
        };
        let frame = escape(&serde_json::to_string(&payload).unwrap());
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_plain_json_without_escapes() {
        let decoded = decode_frame(r#"{"status":"CONNECTED"}"#).unwrap();
        assert_eq!(decoded.status, STATUS_CONNECTED);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_decode_unknown_fields_ignored() {
        let decoded =
            decode_frame(r#"{"status":"DONE","data":[],"uptime":42}"#).unwrap();
        assert_eq!(decoded.status, STATUS_DONE);
    }

    #[test]
    fn test_decode_invalid_escape_sequence() {
        // %FF is not valid UTF-8 once un-escaped.
        let err = decode_frame("%FF%FE").unwrap_err();
        assert!(matches!(err, DecodeError::Escape(_)));
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode_frame("not json at all").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_missing_status() {
        let err = decode_frame(r#"{"data":[{"name":"X","value":"1"}]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_error_payload_shape() {
        let payload = SensorPayload::decode_error();
        assert_eq!(payload.status, STATUS_ERROR);
        assert_eq!(payload.data, vec![SensorReading::new("ERROR", "ERROR")]);
    }

    #[test]
    fn test_encode_is_identity() {
        assert_eq!(encode_command(CMD_GET_ALL), "GET_ALL");
        assert_eq!(encode_command("anything goes"), "anything goes");
    }

    #[test]
    fn test_commands_enabled_gating() {
        assert!(commands_enabled(Some(STATUS_DONE)));
        assert!(commands_enabled(Some(STATUS_CONNECTED)));
        assert!(commands_enabled(Some(STATUS_ERROR)));
        assert!(!commands_enabled(Some(STATUS_SENT)));
        assert!(!commands_enabled(Some("BUSY")));
        assert!(!commands_enabled(None));
    }
}
