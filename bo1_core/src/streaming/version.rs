//! Event schema version negotiation.
//!
//! Version skew between a long-lived client and a redeployed backend is
//! expected during rolling deploys, so every check here reports
//! `is_compatible = true`. Skew only shows up as a warning string and a log
//! line; the stream is never blocked.
//!
//! Older servers are accepted silently (lenient policy).

use bo1_core_types::{SCHEMA_VERSION, SCHEMA_VERSION_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::types::StreamEvent;

/// Response header carrying the server's event schema version.
pub const SCHEMA_VERSION_HEADER: &str = "X-SSE-Schema-Version";

/// Outcome of a schema version comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCheck {
    pub is_compatible: bool,
    pub event_version: u32,
    pub expected_version: u32,
    pub warning: Option<String>,
}

impl VersionCheck {
    fn matching() -> Self {
        Self {
            is_compatible: true,
            event_version: SCHEMA_VERSION,
            expected_version: SCHEMA_VERSION,
            warning: None,
        }
    }

    fn invalid(warning: String) -> Self {
        Self {
            warning: Some(warning),
            ..Self::matching()
        }
    }
}

/// Check the schema version carried in an event's payload.
pub fn check_event_version(event: &StreamEvent) -> VersionCheck {
    check_payload_version(Some(&event.data))
}

/// Check the `schema_version` field of a payload.
///
/// A missing payload, a null payload, or a payload without the field is
/// assumed to match the expected version.
pub fn check_payload_version(data: Option<&Value>) -> VersionCheck {
    let Some(raw) = data.and_then(|d| d.get(SCHEMA_VERSION_FIELD)) else {
        return VersionCheck::matching();
    };

    let parsed = match raw {
        Value::Null => return VersionCheck::matching(),
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    match parsed {
        Some(version) => compare(version, "event"),
        None => {
            warn!(value = %raw, "invalid event schema version");
            VersionCheck::invalid(format!("invalid event schema version: {}", raw))
        }
    }
}

/// Check the value of the `X-SSE-Schema-Version` response header.
///
/// A malformed header never fails the connection; it is reported as a
/// warning and the expected version is assumed.
pub fn check_server_version(header: Option<&str>) -> VersionCheck {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return VersionCheck::matching();
    }

    match header.parse::<u32>() {
        Ok(version) => compare(version, "server"),
        Err(_) => {
            warn!(header = %header, "invalid schema-version header");
            VersionCheck::invalid(format!("invalid schema-version header: {:?}", header))
        }
    }
}

fn compare(version: u32, source: &str) -> VersionCheck {
    let mut check = VersionCheck {
        event_version: version,
        ..VersionCheck::matching()
    };

    if version > SCHEMA_VERSION {
        info!(
            source,
            version,
            expected = SCHEMA_VERSION,
            "server event schema is newer than expected"
        );
        check.warning = Some(format!(
            "server event schema is newer than expected (got v{}, expected v{})",
            version, SCHEMA_VERSION
        ));
    } else if version < SCHEMA_VERSION {
        debug!(
            source,
            version,
            expected = SCHEMA_VERSION,
            "accepting older event schema"
        );
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo1_core_types::EventType;
    use serde_json::json;

    #[test]
    fn test_missing_version_defaults_to_expected() {
        let event = StreamEvent::new(EventType::Contribution, json!({"content": "hi"}));
        let check = check_event_version(&event);
        assert!(check.is_compatible);
        assert_eq!(check.event_version, SCHEMA_VERSION);
        assert_eq!(check.expected_version, SCHEMA_VERSION);
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_null_or_absent_payload() {
        assert_eq!(check_payload_version(None), VersionCheck::matching());
        assert_eq!(check_payload_version(Some(&Value::Null)), VersionCheck::matching());

        let event = StreamEvent::new(EventType::Complete, Value::Null);
        assert_eq!(check_event_version(&event), VersionCheck::matching());
    }

    #[test]
    fn test_same_version() {
        let data = json!({"schema_version": SCHEMA_VERSION});
        let check = check_payload_version(Some(&data));
        assert!(check.is_compatible);
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_newer_versions_warn_but_stay_compatible() {
        for k in 1..5 {
            let data = json!({"schema_version": SCHEMA_VERSION + k});
            let check = check_payload_version(Some(&data));
            assert!(check.is_compatible);
            assert_eq!(check.event_version, SCHEMA_VERSION + k);
            let warning = check.warning.expect("newer schema should warn");
            assert!(warning.contains("newer than expected"));
        }
    }

    #[test]
    fn test_older_version_is_accepted_silently() {
        let check = compare(SCHEMA_VERSION - 1, "event");
        assert!(check.is_compatible);
        assert_eq!(check.event_version, SCHEMA_VERSION - 1);
        assert!(check.warning.is_none());

        let check = check_server_version(Some("0"));
        assert!(check.is_compatible);
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_invalid_event_version() {
        let data = json!({"schema_version": "two"});
        let check = check_payload_version(Some(&data));
        assert!(check.is_compatible);
        assert_eq!(check.event_version, SCHEMA_VERSION);
        assert!(check.warning.unwrap().contains("invalid"));
    }

    #[test]
    fn test_numeric_string_event_version() {
        let data = json!({"schema_version": "3"});
        let check = check_payload_version(Some(&data));
        assert_eq!(check.event_version, 3);
    }

    #[test]
    fn test_server_header() {
        assert_eq!(check_server_version(None), VersionCheck::matching());
        assert_eq!(check_server_version(Some("")), VersionCheck::matching());
        assert_eq!(check_server_version(Some(" 1 ")), VersionCheck::matching());

        let newer = check_server_version(Some("2"));
        assert!(newer.is_compatible);
        assert_eq!(newer.event_version, 2);
        assert!(newer.warning.unwrap().contains("newer than expected"));
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["abc", "1.5", "-1", "v2"] {
            let check = check_server_version(Some(header));
            assert!(check.is_compatible, "{header} should stay compatible");
            assert_eq!(check.event_version, SCHEMA_VERSION);
            let warning = check.warning.expect("malformed header should warn");
            assert!(warning.contains("invalid schema-version header"));
        }
    }
}
