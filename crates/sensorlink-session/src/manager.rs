//! Async session manager.
//!
//! Binds the [`SessionMachine`] to a transport: executes the effects the
//! machine returns, pumps transport events back into it, and publishes a
//! read-only [`SessionView`] for observers. All machine access is
//! serialized behind one lock, so events are processed to completion in
//! arrival order.

use std::{collections::HashMap, sync::Arc};

use sensorlink_core::{
    Endpoint, Journal, LogEntry, TransportConnection, TransportConnector, TransportError,
    TransportEvent, TransportSink, protocol,
};
use tokio::sync::{Mutex, mpsc, watch};

use crate::machine::{
    Effect, SessionConfig, SessionError, SessionEvent, SessionMachine, SessionPhase,
};

/// Read-only view of the session published to observers.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Status of the most recent log entry.
    pub status: Option<String>,
    /// Latest-value-wins sensor readings.
    pub snapshot: HashMap<String, String>,
    /// Ordered event log.
    pub log: Vec<LogEntry>,
    /// Whether the auto-poll loop is enabled.
    pub loop_enabled: bool,
}

impl SessionView {
    /// Whether manual commands are currently enabled.
    #[must_use]
    pub fn commands_enabled(&self) -> bool {
        protocol::commands_enabled(self.status.as_deref())
    }
}

struct Inner {
    machine: SessionMachine,
    sink: Option<Box<dyn TransportSink>>,
    /// Bumped on every connect; events tagged with an older value come
    /// from a transport this session no longer owns and are dropped.
    generation: u64,
}

struct Shared<C> {
    connector: C,
    config: SessionConfig,
    journal: Arc<Journal>,
    inner: Mutex<Inner>,
    view_tx: watch::Sender<SessionView>,
}

/// Session manager driving one controller connection at a time.
///
/// Cheap to clone; clones share the same session.
pub struct SessionManager<C: TransportConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: TransportConnector> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: TransportConnector + 'static> SessionManager<C> {
    /// Create a manager with default configuration.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, SessionConfig::default())
    }

    /// Create a manager with explicit configuration.
    #[must_use]
    pub fn with_config(connector: C, config: SessionConfig) -> Self {
        let journal = Arc::new(Journal::new());
        let (view_tx, _) = watch::channel(SessionView::default());
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                journal: Arc::clone(&journal),
                inner: Mutex::new(Inner {
                    machine: SessionMachine::new(journal),
                    sink: None,
                    generation: 0,
                }),
                view_tx,
            }),
        }
    }

    /// The shared journal, for streaming log subscriptions.
    #[must_use]
    pub fn journal(&self) -> &Arc<Journal> {
        &self.shared.journal
    }

    /// Current view snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.shared.view_tx.borrow().clone()
    }

    /// Subscribe to view updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.shared.view_tx.subscribe()
    }

    /// Start a connection attempt to `endpoint`.
    ///
    /// Returns as soon as the phase is `Connecting`; the dial completes
    /// in the background and settles the phase to `Connected` or
    /// `Failed`.
    ///
    /// # Errors
    /// Rejected while already `Connecting` or `Connected`.
    pub async fn connect(&self, endpoint: Endpoint) -> Result<(), SessionError> {
        let mut inner = self.shared.inner.lock().await;
        let effect = inner.machine.connect(endpoint)?;
        inner.generation += 1;
        let generation = inner.generation;
        inner.sink = None;
        self.shared.publish(&inner);
        drop(inner);

        if let Effect::OpenTransport(endpoint) = effect {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                shared.dial(endpoint, generation).await;
            });
        }
        Ok(())
    }

    /// Request link close.
    ///
    /// The phase flips to `Closed` when the close notification arrives.
    ///
    /// # Errors
    /// Rejected unless `Connected`; surfaces transport close failures.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let mut inner = self.shared.inner.lock().await;
        inner.machine.disconnect()?;
        if let Some(mut sink) = inner.sink.take() {
            sink.close().await?;
        }
        self.shared.publish(&inner);
        Ok(())
    }

    /// Send a command to the controller.
    ///
    /// # Errors
    /// Rejected unless `Connected`, for empty text, or on a transport
    /// write failure.
    pub async fn send(&self, text: &str) -> Result<(), SessionError> {
        let mut inner = self.shared.inner.lock().await;
        let effect = inner.machine.send(text)?;
        if let Effect::SendText(text) = effect {
            Shared::<C>::write(&mut inner, &text).await?;
        }
        self.shared.publish(&inner);
        Ok(())
    }

    /// Toggle the auto-poll loop.
    pub async fn set_loop(&self, enabled: bool) {
        let mut inner = self.shared.inner.lock().await;
        let effects = inner.machine.set_loop(enabled);
        self.shared.execute(&mut inner, effects).await;
        self.shared.publish(&inner);
    }

    /// Clear the displayed log without touching the snapshot.
    pub async fn clear_log(&self) {
        let inner = self.shared.inner.lock().await;
        inner.machine.clear_log();
        self.shared.publish(&inner);
    }
}

impl<C: TransportConnector + 'static> Shared<C> {
    async fn dial(self: Arc<Self>, endpoint: Endpoint, generation: u64) {
        match self.connector.connect(&endpoint).await {
            Ok(TransportConnection { sink, events }) => {
                let mut inner = self.inner.lock().await;
                if inner.generation != generation {
                    tracing::debug!("discarding dial result from a superseded connect");
                    return;
                }
                inner.sink = Some(sink);
                drop(inner);

                let shared = Arc::clone(&self);
                tokio::spawn(async move {
                    shared.pump(events, generation).await;
                });
            }
            Err(e) => {
                self.apply(SessionEvent::OpenFailed(e.to_string()), generation)
                    .await;
            }
        }
    }

    /// Forward transport events into the machine until the link closes.
    async fn pump(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        generation: u64,
    ) {
        loop {
            match events.recv().await {
                Some(TransportEvent::Opened) => {
                    self.apply(SessionEvent::Opened, generation).await;
                }
                Some(TransportEvent::Message { origin, text }) => {
                    self.apply(SessionEvent::Message { origin, text }, generation)
                        .await;
                }
                Some(TransportEvent::Error(details)) => {
                    self.apply(SessionEvent::RuntimeError(details), generation)
                        .await;
                }
                // A dropped feed is a close the transport never reported.
                Some(TransportEvent::Closed) | None => {
                    self.apply(SessionEvent::Closed, generation).await;
                    return;
                }
            }
        }
    }

    async fn apply(&self, event: SessionEvent, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!("dropping event from a superseded transport");
            return;
        }
        let closing = event == SessionEvent::Closed;
        let effects = inner.machine.apply(event);
        if closing {
            inner.sink = None;
        }
        self.execute(&mut inner, effects).await;
        self.publish(&inner);
    }

    /// Execute machine effects. Auto-poll re-sends honor the configured
    /// minimum interval; the lock is held throughout, which is what
    /// serializes the session against concurrent operations.
    async fn execute(&self, inner: &mut Inner, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SendText(text) => {
                    if let Some(interval) = self.config.min_poll_interval {
                        tokio::time::sleep(interval).await;
                    }
                    if let Err(e) = Self::write(inner, &text).await {
                        tracing::warn!("auto-poll send failed: {e}");
                    }
                }
                Effect::CloseTransport => {
                    if let Some(mut sink) = inner.sink.take() {
                        if let Err(e) = sink.close().await {
                            tracing::warn!("transport close failed: {e}");
                        }
                    }
                }
                Effect::OpenTransport(_) => {
                    tracing::warn!("unexpected open effect outside connect");
                }
            }
        }
    }

    async fn write(inner: &mut Inner, text: &str) -> Result<(), SessionError> {
        match inner.sink.as_mut() {
            Some(sink) => Ok(sink.send(text).await?),
            None => Err(SessionError::Transport(TransportError::Send(
                "no open transport".to_string(),
            ))),
        }
    }

    fn publish(&self, inner: &Inner) {
        self.view_tx.send_replace(SessionView {
            phase: inner.machine.phase(),
            status: self.journal.status(),
            snapshot: self.journal.snapshot(),
            log: self.journal.entries(),
            loop_enabled: inner.machine.loop_enabled(),
        });
    }
}
