//! Session orchestration for the sensorlink client.
//!
//! Provides:
//! - `SessionMachine` - Pure connection/protocol state machine
//! - `SessionManager` - Async driver binding the machine to a transport

pub mod machine;
pub mod manager;

pub use machine::{
    Effect, SessionConfig, SessionError, SessionEvent, SessionMachine, SessionPhase,
};
pub use manager::{SessionManager, SessionView};
