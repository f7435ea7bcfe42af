//! Stream event type and frame decoding.

use bo1_core_types::{EventPayload, EventType, SCHEMA_VERSION_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreError;
use crate::sse::SseEvent;

/// SSE event name used for frames sent without an explicit `event:` line.
const UNNAMED_EVENT: &str = "message";

/// A decoded event from a session stream.
///
/// Immutable once decoded; discarded after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event_type: EventType,
    /// Variant-specific payload.
    pub data: Value,
    /// ISO 8601 creation time, set by the origin.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Per-session sequence number assigned by the origin.
    #[serde(default)]
    pub sequence: Option<u64>,
}

impl StreamEvent {
    /// Create an event with no metadata.
    pub fn new(event_type: impl Into<EventType>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: None,
            session_id: None,
            sequence: None,
        }
    }

    /// Set the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Decode one SSE frame.
    ///
    /// Returns `Ok(None)` for keep-alive frames with no data. The payload is
    /// the JSON `data` member when present (envelope form), otherwise the
    /// whole JSON document (flat form). Metadata is read from the top level;
    /// the SSE `id` stands in for a missing sequence number.
    pub fn from_frame(frame: &SseEvent) -> Result<Option<Self>, CoreError> {
        let raw = frame.data.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let document: Value = serde_json::from_str(raw).map_err(|e| {
            CoreError::Decode(format!(
                "event {:?} carries invalid JSON: {}",
                frame.event, e
            ))
        })?;

        let event_type = if !frame.event.is_empty() && frame.event != UNNAMED_EVENT {
            EventType::from_wire(&frame.event)
        } else {
            document
                .get("event_type")
                .and_then(|v| v.as_str())
                .or_else(|| document.get("type").and_then(|v| v.as_str()))
                .map(EventType::from_wire)
                .unwrap_or_else(|| EventType::Other(UNNAMED_EVENT.to_string()))
        };

        let sequence = document
            .get("sequence")
            .and_then(|v| v.as_u64())
            .or_else(|| document.get("seq").and_then(|v| v.as_u64()))
            .or_else(|| frame.id.trim().parse::<u64>().ok());

        let timestamp = ["timestamp", "ts", "created_at"]
            .iter()
            .find_map(|key| document.get(*key).and_then(|v| v.as_str()))
            .map(String::from);

        let session_id = document
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(String::from);

        let data = match document {
            Value::Object(mut map) if map.contains_key("data") => {
                let version = map.remove(SCHEMA_VERSION_FIELD);
                let mut data = map.remove("data").unwrap_or(Value::Null);
                // Keep an envelope-level version visible to payload checks.
                if let (Some(version), Value::Object(inner)) = (version, &mut data) {
                    inner.entry(SCHEMA_VERSION_FIELD).or_insert(version);
                }
                data
            }
            other => other,
        };

        Ok(Some(Self {
            event_type,
            data,
            timestamp,
            session_id,
            sequence,
        }))
    }

    /// Decode the payload into the typed shape for this event type.
    pub fn payload(&self) -> Result<EventPayload, CoreError> {
        EventPayload::decode(&self.event_type, &self.data).map_err(|e| {
            CoreError::Decode(format!("{} payload: {}", self.event_type, e))
        })
    }

    /// Check if this event ends the deliberation.
    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }

    /// Get a field from the data payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a string field from the data payload.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Get a u64 field from the data payload.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, data: &str, id: &str) -> SseEvent {
        SseEvent {
            event: event.to_string(),
            data: data.to_string(),
            id: id.to_string(),
            retry: None,
        }
    }

    #[test]
    fn test_envelope_frame() {
        let raw = json!({
            "event_type": "contribution",
            "session_id": "sess-1",
            "sequence": 4,
            "timestamp": "2026-01-02T03:04:05Z",
            "data": {"persona_code": "cfo", "content": "Watch the burn rate."}
        })
        .to_string();

        let event = StreamEvent::from_frame(&frame("contribution", &raw, ""))
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, EventType::Contribution);
        assert_eq!(event.sequence, Some(4));
        assert_eq!(event.session_id.as_deref(), Some("sess-1"));
        assert_eq!(event.timestamp.as_deref(), Some("2026-01-02T03:04:05Z"));
        assert_eq!(event.get_str("persona_code"), Some("cfo"));
        assert!(event.get("sequence").is_none());
    }

    #[test]
    fn test_envelope_schema_version_moves_into_payload() {
        let raw = json!({
            "schema_version": 2,
            "sequence": 1,
            "data": {"score": 0.8}
        })
        .to_string();

        let event = StreamEvent::from_frame(&frame("convergence", &raw, ""))
            .unwrap()
            .unwrap();
        assert_eq!(event.get_u64("schema_version"), Some(2));
        assert_eq!(event.get("score"), Some(&json!(0.8)));
    }

    #[test]
    fn test_flat_frame_uses_type_field_and_sse_id() {
        let raw = json!({"type": "convergence", "score": 0.82}).to_string();
        let event = StreamEvent::from_frame(&frame("message", &raw, "17"))
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, EventType::Convergence);
        assert_eq!(event.sequence, Some(17));
        assert_eq!(event.get("score"), Some(&json!(0.82)));
    }

    #[test]
    fn test_named_frame_wins_over_body_type() {
        let raw = json!({"type": "something_else", "seq": 2}).to_string();
        let event = StreamEvent::from_frame(&frame("voting_started", &raw, ""))
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, EventType::VotingStarted);
        assert_eq!(event.sequence, Some(2));
    }

    #[test]
    fn test_unknown_event_is_kept() {
        let raw = json!({"whatever": true}).to_string();
        let event = StreamEvent::from_frame(&frame("expert_summary", &raw, ""))
            .unwrap()
            .unwrap();
        assert_eq!(
            event.event_type,
            EventType::Other("expert_summary".to_string())
        );
        assert!(event.payload().unwrap().is_opaque());
    }

    #[test]
    fn test_keepalive_and_malformed() {
        assert!(StreamEvent::from_frame(&frame("message", "  ", ""))
            .unwrap()
            .is_none());

        let err = StreamEvent::from_frame(&frame("contribution", "{not json", "")).unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }

    #[test]
    fn test_typed_payload() {
        let event = StreamEvent::new(
            EventType::PersonaVote,
            json!({"persona_code": "cto", "recommendation": "Ship it", "confidence": 0.9}),
        );
        match event.payload().unwrap() {
            EventPayload::PersonaVote(vote) => {
                assert_eq!(vote.persona_code, "cto");
                assert_eq!(vote.recommendation, "Ship it");
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        let bad = StreamEvent::new(EventType::PersonaVote, json!({"persona_code": 7}));
        assert!(bad.payload().is_err());
    }
}
