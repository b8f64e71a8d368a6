//! Append-only event journal with snapshot folding.

use std::{collections::HashMap, sync::RwLock};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::protocol::{self, SensorPayload};

/// Origin recorded on locally produced entries.
pub const LOCAL_ORIGIN: &str = "localhost";

/// One journal entry: an inbound decoded frame or a local send marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Transport-reported origin, or [`LOCAL_ORIGIN`] for send markers.
    pub from: String,
    /// Decoded payload; synthetic for send markers and decode failures.
    pub msg: SensorPayload,
}

impl LogEntry {
    /// Entry for an inbound frame.
    #[must_use]
    pub fn inbound(from: impl Into<String>, msg: SensorPayload) -> Self {
        Self {
            from: from.into(),
            msg,
        }
    }

    /// Synthetic marker appended for every outbound send. Never passes
    /// through the codec and carries no readings.
    #[must_use]
    pub fn sent() -> Self {
        Self {
            from: LOCAL_ORIGIN.to_string(),
            msg: SensorPayload::status_only(protocol::STATUS_SENT),
        }
    }
}

struct Inner {
    entries: Vec<LogEntry>,
    snapshot: HashMap<String, String>,
    status: Option<String>,
}

/// Journal with broadcast and history support.
///
/// Every pushed entry is appended in order and folded exactly once: its
/// status becomes the observed status, and each of its readings is written
/// into the snapshot last-write-wins. Live subscribers receive entries as
/// they arrive; [`Journal::entries_plus_stream`] replays history first.
pub struct Journal {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<LogEntry>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                snapshot: HashMap::new(),
                status: None,
            }),
            sender,
        }
    }

    /// Append an entry, folding it into the observed status and snapshot.
    pub fn push(&self, entry: LogEntry) {
        let _ = self.sender.send(entry.clone()); // live listeners

        let mut inner = self.inner.write().unwrap();
        inner.status = Some(entry.msg.status.clone());
        for reading in &entry.msg.data {
            inner
                .snapshot
                .insert(reading.name.clone(), reading.value.clone());
        }
        inner.entries.push(entry);
    }

    /// Clear the entry history and observed status.
    ///
    /// The snapshot is left untouched: readings stay visible for
    /// reference until overwritten by a later session.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.status = None;
    }

    /// Ordered copy of the entry history.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.read().unwrap().entries.clone()
    }

    /// Number of entries in the history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().entries.is_empty()
    }

    /// Latest-value-wins view of every reading seen so far.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().unwrap().snapshot.clone()
    }

    /// Status of the most recently appended entry.
    #[must_use]
    pub fn status(&self) -> Option<String> {
        self.inner.read().unwrap().status.clone()
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Stream that yields the history first, then live updates.
    #[must_use]
    pub fn entries_plus_stream(&self) -> futures::stream::BoxStream<'static, LogEntry> {
        let (history, rx) = (self.entries(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{SensorReading, STATUS_DONE, STATUS_SENT};

    use super::*;

    fn done_with(name: &str, value: &str) -> LogEntry {
        LogEntry::inbound(
            "ws://10.0.0.5:81",
            SensorPayload {
                status: STATUS_DONE.to_string(),
                data: vec![SensorReading::new(name, value)],
            },
        )
    }

    #[test]
    fn test_push_preserves_order() {
        let journal = Journal::new();
        journal.push(LogEntry::sent());
        journal.push(done_with("WATER_TEMP", "21.5"));
        journal.push(done_with("AIR_TEMP", "19.0"));

        let entries = journal.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].msg.status, STATUS_SENT);
        assert_eq!(entries[1].msg.data[0].name, "WATER_TEMP");
        assert_eq!(entries[2].msg.data[0].name, "AIR_TEMP");
    }

    #[test]
    fn test_fold_tracks_latest_status() {
        let journal = Journal::new();
        assert_eq!(journal.status(), None);
        journal.push(LogEntry::sent());
        assert_eq!(journal.status().as_deref(), Some(STATUS_SENT));
        journal.push(done_with("X", "1"));
        assert_eq!(journal.status().as_deref(), Some(STATUS_DONE));
    }

    #[test]
    fn test_fold_is_last_write_wins() {
        let journal = Journal::new();
        journal.push(done_with("X", "1"));
        journal.push(done_with("Y", "2"));
        journal.push(done_with("X", "3"));

        let snapshot = journal.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["X"], "3");
        assert_eq!(snapshot["Y"], "2");
    }

    #[test]
    fn test_fold_is_idempotent_under_repeats() {
        let journal = Journal::new();
        journal.push(done_with("X", "5"));
        journal.push(done_with("X", "5"));

        let snapshot = journal.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["X"], "5");
    }

    #[test]
    fn test_clear_keeps_snapshot() {
        let journal = Journal::new();
        journal.push(done_with("WATER_TEMP", "21.5"));
        journal.clear();

        assert!(journal.is_empty());
        assert_eq!(journal.status(), None);
        assert_eq!(journal.snapshot()["WATER_TEMP"], "21.5");
    }

    #[tokio::test]
    async fn test_subscribers_see_live_entries() {
        let journal = Journal::new();
        let mut rx = journal.subscribe();
        journal.push(done_with("X", "1"));

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.msg.data[0].value, "1");
    }

    #[tokio::test]
    async fn test_entries_plus_stream_replays_history() {
        let journal = Journal::new();
        journal.push(LogEntry::sent());
        journal.push(done_with("X", "1"));

        let mut stream = journal.entries_plus_stream();
        assert_eq!(stream.next().await.unwrap().msg.status, STATUS_SENT);
        assert_eq!(stream.next().await.unwrap().msg.status, STATUS_DONE);
    }
}
