//! Session state machine.
//!
//! The original controller client mutated shared view state from
//! transport callbacks; here the lifecycle is an explicit machine. Caller
//! operations and transport notifications feed a single transition
//! surface that folds entries into the shared journal and returns the
//! effects to execute, so every ordering and gating rule is testable
//! without a live socket.

use std::sync::Arc;
use std::time::Duration;

use sensorlink_core::{
    Endpoint, Journal, LogEntry, SensorPayload, TransportError,
    protocol::{self, STATUS_DONE},
};
use thiserror::Error;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No connection attempted yet.
    #[default]
    Idle,
    /// Transport dial in flight.
    Connecting,
    /// Link open; commands may be sent.
    Connected,
    /// Link closed; eligible to connect again.
    Closed,
    /// Dial failed; eligible to connect again.
    Failed,
}

impl SessionPhase {
    /// Whether a new connect attempt is allowed from this phase.
    #[must_use]
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Failed)
    }
}

/// Transport notification fed into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport handshake completed.
    Opened,
    /// Raw inbound frame.
    Message {
        /// Transport-reported source.
        origin: String,
        /// Undecoded frame text.
        text: String,
    },
    /// Link closed, locally or by the remote side.
    Closed,
    /// Dial failed before open.
    OpenFailed(String),
    /// Post-open transport fault; observed only, never a phase change.
    RuntimeError(String),
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Dial the endpoint.
    OpenTransport(Endpoint),
    /// Write raw text to the transport.
    SendText(String),
    /// Request link close.
    CloseTransport,
}

/// Session tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Minimum wait between a ready (`DONE`) observation and the
    /// auto-poll re-send. `None` re-issues immediately; the polling
    /// cadence is then governed purely by round-trip latency.
    pub min_poll_interval: Option<Duration>,
}

/// Session operation error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation attempted in a phase that does not allow it.
    #[error("{op} is not valid while {phase:?}")]
    InvalidPhase {
        /// The rejected operation.
        op: &'static str,
        /// Phase at the time of the attempt.
        phase: SessionPhase,
    },
    /// Refused to send an empty command.
    #[error("refusing to send an empty command")]
    EmptyCommand,
    /// Transport-level failure surfaced by an operation.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Connection/protocol state machine.
///
/// Owns the phase, the auto-poll flag, and the last outbound command;
/// folds every event into the shared journal. Exactly one instance per
/// session, mutated from one place at a time.
pub struct SessionMachine {
    phase: SessionPhase,
    journal: Arc<Journal>,
    loop_enabled: bool,
    last_command: Option<String>,
}

impl SessionMachine {
    /// Create a machine folding into `journal`.
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            journal,
            loop_enabled: false,
            last_command: None,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the auto-poll loop is enabled.
    #[must_use]
    pub const fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// Most recent outbound command, if any.
    #[must_use]
    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    /// Start a connection attempt.
    ///
    /// Valid from `Idle`, `Closed`, and `Failed`. Clears the journal
    /// when a prior session existed, then moves to `Connecting`; the
    /// phase settles on the open or open-failure notification.
    ///
    /// # Errors
    /// Rejected while already `Connecting` or `Connected`.
    pub fn connect(&mut self, endpoint: Endpoint) -> Result<Effect, SessionError> {
        if !self.phase.can_connect() {
            return Err(SessionError::InvalidPhase {
                op: "connect",
                phase: self.phase,
            });
        }
        if self.phase != SessionPhase::Idle {
            self.journal.clear();
        }
        tracing::debug!(endpoint = %endpoint, "connecting");
        self.phase = SessionPhase::Connecting;
        Ok(Effect::OpenTransport(endpoint))
    }

    /// Request link close.
    ///
    /// The phase stays `Connected` until the close notification arrives.
    ///
    /// # Errors
    /// Rejected unless `Connected`.
    pub fn disconnect(&mut self) -> Result<Effect, SessionError> {
        if self.phase != SessionPhase::Connected {
            return Err(SessionError::InvalidPhase {
                op: "disconnect",
                phase: self.phase,
            });
        }
        tracing::debug!("disconnecting");
        Ok(Effect::CloseTransport)
    }

    /// Send a command.
    ///
    /// Records the text as the last outbound command and appends the
    /// synthetic `SENT` marker, which gates further commands until the
    /// controller answers.
    ///
    /// # Errors
    /// Rejected unless `Connected`, or if `text` is empty.
    pub fn send(&mut self, text: &str) -> Result<Effect, SessionError> {
        if self.phase != SessionPhase::Connected {
            return Err(SessionError::InvalidPhase {
                op: "send",
                phase: self.phase,
            });
        }
        if text.is_empty() {
            return Err(SessionError::EmptyCommand);
        }
        self.last_command = Some(text.to_string());
        self.journal.push(LogEntry::sent());
        Ok(Effect::SendText(protocol::encode_command(text)))
    }

    /// Toggle the auto-poll loop.
    ///
    /// Enabling while the observed status is already ready re-issues the
    /// last command immediately.
    pub fn set_loop(&mut self, enabled: bool) -> Vec<Effect> {
        self.loop_enabled = enabled;
        if enabled {
            self.maybe_auto_poll()
        } else {
            Vec::new()
        }
    }

    /// Clear the displayed log. Snapshot and phase are unaffected.
    pub fn clear_log(&self) {
        self.journal.clear();
    }

    /// Apply a transport notification, returning the effects to execute.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Opened => {
                if self.phase == SessionPhase::Connecting {
                    tracing::debug!("link open");
                    self.phase = SessionPhase::Connected;
                } else {
                    tracing::warn!(phase = ?self.phase, "unexpected open notification");
                }
                Vec::new()
            }
            SessionEvent::Message { origin, text } => {
                let msg = match protocol::decode_frame(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::warn!(%origin, "frame decode failed: {e}");
                        self.loop_enabled = false;
                        SensorPayload::decode_error()
                    }
                };
                self.journal.push(LogEntry::inbound(origin, msg));
                self.maybe_auto_poll()
            }
            SessionEvent::Closed => {
                if matches!(self.phase, SessionPhase::Connecting | SessionPhase::Connected) {
                    tracing::debug!("link closed");
                    self.phase = SessionPhase::Closed;
                    self.loop_enabled = false;
                    self.journal.clear();
                }
                Vec::new()
            }
            SessionEvent::OpenFailed(reason) => {
                tracing::warn!("transport open failed: {reason}");
                self.phase = SessionPhase::Failed;
                Vec::new()
            }
            SessionEvent::RuntimeError(details) => {
                tracing::warn!("transport error: {details}");
                Vec::new()
            }
        }
    }

    /// Re-issue the last command when the loop is on and the previous
    /// request-response cycle fully completed. The `SENT` marker pushed
    /// here flips the observed status away from `DONE`, so each ready
    /// observation triggers exactly one send.
    fn maybe_auto_poll(&mut self) -> Vec<Effect> {
        if !self.loop_enabled || self.phase != SessionPhase::Connected {
            return Vec::new();
        }
        if self.journal.status().as_deref() != Some(STATUS_DONE) {
            return Vec::new();
        }
        let Some(command) = self.last_command.clone() else {
            return Vec::new();
        };
        tracing::debug!(%command, "auto-poll re-issue");
        self.journal.push(LogEntry::sent());
        vec![Effect::SendText(command)]
    }
}
