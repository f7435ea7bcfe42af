//! Sequence tracking and gap detection across reconnects.

use bo1_core_types::{EventType, GapDetected};
use serde_json::Value;

use super::types::StreamEvent;
use crate::errors::CoreError;

/// Result of checking one event's sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceCheck {
    /// The event carries no sequence number; deliver it untracked.
    Untracked,
    /// Next expected event (or the first of a fresh session).
    Fresh,
    /// Already delivered before the reconnect; the server is replaying.
    Duplicate,
    /// Events were missed between the previous connection and this one.
    Gap(GapReport),
}

/// Missed range detected on a resumed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapReport {
    pub session_id: String,
    pub expected_sequence: u64,
    pub actual_sequence: u64,
    pub missed_count: u64,
}

impl GapReport {
    /// Build the synthetic `gap_detected` event for this report.
    ///
    /// The event has no sequence number so it never feeds back into tracking.
    pub fn to_event(&self) -> StreamEvent {
        let payload = GapDetected {
            session_id: self.session_id.clone(),
            expected_sequence: self.expected_sequence,
            actual_sequence: self.actual_sequence,
            missed_count: self.missed_count,
        };
        StreamEvent {
            event_type: EventType::GapDetected,
            data: serde_json::to_value(payload).unwrap_or(Value::Null),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            session_id: Some(self.session_id.clone()),
            sequence: None,
        }
    }
}

/// Tracks the last delivered sequence number for the active session.
///
/// Missed events are not recoverable from the client side; a gap is only
/// reported so the application can decide how to react.
#[derive(Debug, Default)]
pub struct GapDetector {
    session_id: Option<String>,
    /// Last sequence dispatched for `session_id`, across connections.
    last_seen: Option<u64>,
    /// Last sequence received on the current connection.
    connection_last: Option<u64>,
    /// Set when a connection resumes a session with history, until the first
    /// new event has been checked.
    resuming: bool,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new connection for `session_id`.
    ///
    /// A different session resets all history, so its first event is never
    /// reported as a gap.
    pub fn begin_connection(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            self.session_id = Some(session_id.to_string());
            self.last_seen = None;
        }
        self.connection_last = None;
        self.resuming = self.last_seen.is_some();
    }

    /// Check an incoming event before it is dispatched.
    ///
    /// Errors when the sequence fails to increase within one connection.
    pub fn observe(&mut self, event: &StreamEvent) -> Result<SequenceCheck, CoreError> {
        let Some(sequence) = event.sequence else {
            return Ok(SequenceCheck::Untracked);
        };
        let session_id = self.session_id.clone().unwrap_or_default();

        if let Some(previous) = self.connection_last {
            if sequence <= previous {
                return Err(CoreError::sequence_violation(&session_id, previous, sequence));
            }
        }
        self.connection_last = Some(sequence);

        let Some(last) = self.last_seen else {
            self.resuming = false;
            return Ok(SequenceCheck::Fresh);
        };
        if sequence <= last {
            return Ok(SequenceCheck::Duplicate);
        }
        if !std::mem::take(&mut self.resuming) {
            return Ok(SequenceCheck::Fresh);
        }

        let expected = last + 1;
        if sequence > expected {
            Ok(SequenceCheck::Gap(GapReport {
                session_id,
                expected_sequence: expected,
                actual_sequence: sequence,
                missed_count: sequence - expected,
            }))
        } else {
            Ok(SequenceCheck::Fresh)
        }
    }

    /// Record that an event was dispatched.
    pub fn record_delivered(&mut self, sequence: Option<u64>) {
        if let Some(sequence) = sequence {
            self.last_seen = Some(self.last_seen.map_or(sequence, |l| l.max(sequence)));
        }
    }

    /// Last dispatched sequence for the tracked session.
    pub fn last_seen_sequence(&self) -> Option<u64> {
        self.last_seen
    }

    /// Session currently tracked.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
