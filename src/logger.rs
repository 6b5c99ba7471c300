use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::GameError;
use crate::events::{BatchSummary, Emission, EventKind, GameOverCause, LogEvent};
use crate::session::StateSnapshot;

/// Buffered events above this count are handed to the side channel and the
/// buffer truncated, bounding memory on long sessions.
pub const MAX_BUFFERED_EVENTS: usize = 1000;

/// Host callback receiving both emission channels.
pub type EmitFn = Box<dyn FnMut(&Emission)>;

/// Durable side channel for flushed events. Append failures are reported by
/// the logger, never raised into game logic.
pub trait EventSink {
    fn append(&mut self, events: &[LogEvent]) -> Result<(), GameError>;
}

/// Session-scoped event pipeline. Owned by the running session and replaced
/// wholesale on restart; the emission callback and side channel are
/// recovered from the old instance by value.
pub struct EventLogger {
    session_id: String,
    events: Vec<LogEvent>,
    // Buffer prefix already appended to the sink.
    flushed: usize,
    state: Option<StateSnapshot>,
    enabled: bool,
    emit: Option<EmitFn>,
    sink: Option<Box<dyn EventSink>>,
    sink_failures: u32,
    snapshot_interval_ms: u64,
    since_snapshot_ms: u64,
}

impl EventLogger {
    pub fn new(
        snapshot_interval_ms: u64,
        emit: Option<EmitFn>,
        sink: Option<Box<dyn EventSink>>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            events: Vec::new(),
            flushed: 0,
            state: None,
            enabled: true,
            emit,
            sink,
            sink_failures: 0,
            snapshot_interval_ms,
            since_snapshot_ms: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn sink_failures(&self) -> u32 {
        self.sink_failures
    }

    /// Install the snapshot that subsequent records are stamped with. The
    /// game refreshes this immediately before every record call.
    pub fn set_state(&mut self, state: StateSnapshot) {
        self.state = Some(state);
    }

    /// Append one event. No-op while disabled or before the first snapshot
    /// is installed. Critical kinds reach the per-event channel and the
    /// side channel synchronously, in append order.
    pub fn record(&mut self, kind: EventKind, payload: Value) {
        if !self.enabled {
            return;
        }
        let state = match &self.state {
            Some(s) => s.clone(),
            None => return,
        };
        let event = LogEvent {
            kind,
            timestamp: Utc::now(),
            elapsed_ms: state.status.elapsed_ms,
            session_id: self.session_id.clone(),
            state,
            payload,
        };
        if kind.is_critical() {
            if let Some(emit) = self.emit.as_mut() {
                emit(&Emission::Event {
                    event: event.clone(),
                });
            }
        }
        self.events.push(event);
        if kind.is_critical() {
            self.flush();
        } else if self.events.len() > MAX_BUFFERED_EVENTS {
            self.flush();
            self.events.clear();
            self.flushed = 0;
        }
    }

    /// Advance the periodic-snapshot cadence. The game calls this with the
    /// tick delta only while the session is unpaused, so modal popups
    /// suppress ambient snapshots for free.
    pub fn tick(&mut self, delta_ms: u64) {
        if !self.enabled || self.snapshot_interval_ms == 0 || self.state.is_none() {
            return;
        }
        self.since_snapshot_ms += delta_ms;
        while self.since_snapshot_ms >= self.snapshot_interval_ms {
            self.since_snapshot_ms -= self.snapshot_interval_ms;
            self.record(
                EventKind::PeriodicSnapshot,
                json!({ "reason": "periodic_update" }),
            );
        }
    }

    /// One final batch emission carrying the ordered event list plus its
    /// derived summary, then a last flush, then the logger goes inert.
    /// Calling it again (or recording afterwards) does nothing.
    pub fn finalize(&mut self, cause: GameOverCause) {
        if !self.enabled {
            return;
        }
        let summary = BatchSummary::from_events(&self.events);
        if let Some(emit) = self.emit.as_mut() {
            emit(&Emission::Batch {
                session_id: self.session_id.clone(),
                cause,
                summary,
                events: self.events.clone(),
            });
        }
        self.flush();
        self.enabled = false;
    }

    /// Hand back the emission callback and side channel so a restarted
    /// session can reuse them with a fresh logger.
    pub fn into_channels(self) -> (Option<EmitFn>, Option<Box<dyn EventSink>>) {
        (self.emit, self.sink)
    }

    fn flush(&mut self) {
        if self.flushed >= self.events.len() {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.append(&self.events[self.flushed..]) {
                self.sink_failures += 1;
                warn!("event sink append failed: {err}");
            }
        }
        self.flushed = self.events.len();
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("session_id", &self.session_id)
            .field("events", &self.events.len())
            .field("flushed", &self.flushed)
            .field("enabled", &self.enabled)
            .field("sink_failures", &self.sink_failures)
            .finish()
    }
}
