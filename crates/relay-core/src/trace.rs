//! Lifecycle trace events and the subscriber registry.
//!
//! The engine emits a [`TraceEvent`] at every lifecycle milestone,
//! unconditionally — an empty registry makes emission a no-op. Consumers
//! implement [`TraceSink`] and attach to a [`TraceRegistry`]; the registry
//! is the single explicit attach/detach point, never ad hoc global state.
//!
//! Each event carries a measurement payload (timings, message counts) and a
//! metadata payload (backend, strategy, reason, finish reason).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Event names
// ─────────────────────────────────────────────────────────────────────────────

/// The named lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// A call began.
    CallStart,
    /// A call completed successfully.
    CallStop,
    /// A call failed.
    CallException,
    /// A streaming call began.
    StreamStart,
    /// One chunk was pulled by the consumer.
    StreamChunk,
    /// The stream was exhausted.
    StreamStop,
    /// The outbound message sequence is about to be dispatched.
    BackendRequest,
    /// The backend produced a response.
    BackendResponse,
    /// Compaction is about to run.
    CompactionStart,
    /// Compaction completed.
    CompactionStop,
    /// Compaction failed (non-fatal).
    CompactionError,
}

impl EventName {
    /// Dotted wire name, e.g. `call.start`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallStart => "call.start",
            Self::CallStop => "call.stop",
            Self::CallException => "call.exception",
            Self::StreamStart => "stream.start",
            Self::StreamChunk => "stream.chunk",
            Self::StreamStop => "stream.stop",
            Self::BackendRequest => "backend.request",
            Self::BackendResponse => "backend.response",
            Self::CompactionStart => "compaction.start",
            Self::CompactionStop => "compaction.stop",
            Self::CompactionError => "compaction.error",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TraceEvent
// ─────────────────────────────────────────────────────────────────────────────

/// One emitted lifecycle event.
#[derive(Clone, Debug, Serialize)]
pub struct TraceEvent {
    /// Event name.
    pub name: EventName,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Numeric measurements (durations, counts).
    pub measurements: Map<String, Value>,
    /// Contextual metadata (backend id, strategy, reason).
    pub metadata: Map<String, Value>,
}

impl TraceEvent {
    /// Create an event with empty payloads.
    #[must_use]
    pub fn new(name: EventName) -> Self {
        Self {
            name,
            timestamp: Utc::now(),
            measurements: Map::new(),
            metadata: Map::new(),
        }
    }

    /// Add a measurement, returning the modified event.
    #[must_use]
    pub fn with_measurement(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.measurements.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry, returning the modified event.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.metadata.insert(key.into(), value.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sink and registry
// ─────────────────────────────────────────────────────────────────────────────

/// Consumer of lifecycle events.
///
/// `emit` is called synchronously on the engine's call path; sinks should
/// hand off expensive work rather than block.
pub trait TraceSink: Send + Sync {
    /// Receive one event.
    fn emit(&self, event: &TraceEvent);
}

/// Handle returned by [`TraceRegistry::attach`], used to detach later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// The explicit subscriber registry.
///
/// Attach returns a [`SubscriberId`]; detach with that id removes the sink.
/// Emission iterates subscribers in attach order.
#[derive(Default)]
pub struct TraceRegistry {
    subscribers: RwLock<Vec<(SubscriberId, Arc<dyn TraceSink>)>>,
    next_id: AtomicU64,
}

impl TraceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink. Returns the id needed to detach it.
    pub fn attach(&self, sink: Arc<dyn TraceSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, sink));
        id
    }

    /// Detach a previously attached sink.
    ///
    /// Returns `false` when the id is unknown (already detached).
    pub fn detach(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Deliver an event to every attached sink. No-op when empty.
    pub fn emit(&self, event: &TraceEvent) {
        for (_, sink) in self.subscribers.read().iter() {
            sink.emit(event);
        }
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for TraceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceRegistry")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
