//! Event sinks: where the trace stream goes.
//!
//! Gnomes and the delivery producer report every state change as a
//! [`TreeEvent`] to a shared [`EventSink`]. Sinks are called from many
//! worker threads at once and must not block for long.

use parking_lot::Mutex;
use tinsel_types::{GnomeId, TreeEvent};
use tracing::info;

/// Receiver for trace events.
pub trait EventSink: Send + Sync {
    /// Called once per state change, from the thread that made it.
    fn record(&self, event: &TreeEvent);
}

/// Writes each event as one human-readable `info` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &TreeEvent) {
        info!(
            target: "tinsel::trace",
            gnome = event.gnome().map(GnomeId::into_inner),
            "{event}"
        );
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &TreeEvent) {}
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TreeEvent>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.
    pub fn events(&self) -> Vec<TreeEvent> {
        self.events.lock().clone()
    }

    /// Events concerning one gnome, in the order that gnome produced them.
    pub fn for_gnome(&self, gnome: GnomeId) -> Vec<TreeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.gnome() == Some(gnome))
            .cloned()
            .collect()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &TreeEvent) {
        self.events.lock().push(event.clone());
    }
}
