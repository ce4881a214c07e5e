// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound socket events.
//!
//! ```json
//! {"type": "notification",
//!  "data": {"id": "alert_1736069400", "message": "Time to stretch",
//!           "priority": "normal", "created_at": "2026-01-05T09:30:00.123456"}}
//! ```

use chrono::Utc;
use lifepilot_core::types::parse_timestamp;
use lifepilot_core::{Notification, Priority};
use serde::Deserialize;
use serde_json::Value;

const NOTIFICATION_TYPE: &str = "notification";

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    id: Value,
    message: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Outcome of parsing one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Notification(Notification),
    /// A well-formed event of a type this client does not handle.
    Other(String),
    Malformed(String),
}

/// Parses one text frame. Never fails; bad input becomes `Malformed`.
pub fn parse_event(text: &str) -> InboundEvent {
    let event: RawEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => return InboundEvent::Malformed(e.to_string()),
    };
    if event.kind != NOTIFICATION_TYPE {
        return InboundEvent::Other(event.kind);
    }

    let raw: RawNotification = match serde_json::from_value(event.data) {
        Ok(raw) => raw,
        Err(e) => return InboundEvent::Malformed(e.to_string()),
    };
    let id = match raw.id {
        Value::String(s) if !s.is_empty() => s,
        Value::Number(n) => n.to_string(),
        other => return InboundEvent::Malformed(format!("unusable notification id: {other}")),
    };

    InboundEvent::Notification(Notification {
        id,
        message: raw.message,
        priority: raw
            .priority
            .as_deref()
            .map(Priority::from_wire)
            .unwrap_or_default(),
        created_at: raw
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now),
        // Read status is client-side; every received event starts unread.
        read: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_notification_event() {
        let text = r#"{"type":"notification","data":{"id":"n1","message":"Time to stretch","priority":"high","created_at":"2026-01-05T09:30:00.123456","status":"sent","user_id":"device-1"}}"#;
        let InboundEvent::Notification(n) = parse_event(text) else {
            panic!("expected notification");
        };
        assert_eq!(n.id, "n1");
        assert_eq!(n.message, "Time to stretch");
        assert_eq!(n.priority, Priority::High);
        assert_eq!(n.created_at.minute(), 30);
        assert!(!n.read);
    }

    #[test]
    fn server_read_flag_is_ignored() {
        let text = r#"{"type":"notification","data":{"id":"n2","message":"Drink water","read":true}}"#;
        let InboundEvent::Notification(n) = parse_event(text) else {
            panic!("expected notification");
        };
        assert!(!n.read);
    }

    #[test]
    fn normal_priority_and_numeric_id() {
        let text = r#"{"type":"notification","data":{"id":42,"message":"hi","priority":"normal"}}"#;
        let InboundEvent::Notification(n) = parse_event(text) else {
            panic!("expected notification");
        };
        assert_eq!(n.id, "42");
        assert_eq!(n.priority, Priority::Medium);
    }

    #[test]
    fn other_types_are_reported_not_parsed() {
        assert_eq!(
            parse_event(r#"{"type":"ping"}"#),
            InboundEvent::Other("ping".into())
        );
    }

    #[test]
    fn malformed_frames() {
        assert!(matches!(parse_event("not json"), InboundEvent::Malformed(_)));
        assert!(matches!(
            parse_event(r#"{"type":"notification","data":{"message":"no id"}}"#),
            InboundEvent::Malformed(_)
        ));
        assert!(matches!(
            parse_event(r#"{"type":"notification","data":{"id":"","message":"x"}}"#),
            InboundEvent::Malformed(_)
        ));
        assert!(matches!(
            parse_event(r#"{"type":"notification"}"#),
            InboundEvent::Malformed(_)
        ));
    }
}
