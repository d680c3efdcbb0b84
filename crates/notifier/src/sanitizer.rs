//! Push payload sanitizer.
//!
//! APNs rejects payloads above 4KB. Everything that reaches the transport
//! goes through [`sanitize`] first: text is length-capped, `badge`/`sound`
//! must have the right JSON type, and `data` keeps only whitelisted keys with
//! scalar values.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use ripple_common::types::PushNotification;

pub const MAX_TITLE_CHARS: usize = 80;
pub const MAX_BODY_CHARS: usize = 220;
pub const MAX_DATA_STRING_CHARS: usize = 256;

/// `data` keys allowed through to the device.
pub const ALLOWED_DATA_KEYS: [&str; 6] = [
    "type",
    "commentId",
    "parentId",
    "chainId",
    "actorAddress",
    "parentAddress",
];

const ELLIPSIS: char = '…';

/// Notification content safe to hand to the push transport. Computed per send, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedNotification {
    pub title: String,
    pub body: String,
    pub badge: Option<Number>,
    pub sound: Option<String>,
    pub data: Map<String, Value>,
}

pub fn sanitize(notification: &PushNotification) -> SanitizedNotification {
    let badge = match &notification.badge {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    };
    let sound = match &notification.sound {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    let data = notification
        .data
        .as_ref()
        .map(filter_data)
        .unwrap_or_default();

    SanitizedNotification {
        title: truncate(&notification.title, MAX_TITLE_CHARS),
        body: truncate(&notification.body, MAX_BODY_CHARS),
        badge,
        sound,
        data,
    }
}

/// Keep whitelisted keys with scalar values. Hex identifiers are kept whole;
/// other strings are capped. Objects and arrays are dropped.
pub fn filter_data(data: &Map<String, Value>) -> Map<String, Value> {
    let mut filtered = Map::new();
    for key in ALLOWED_DATA_KEYS {
        let Some(value) = data.get(key) else {
            continue;
        };
        let kept = match value {
            Value::String(s) if is_hex_identifier(s) => Value::String(s.clone()),
            Value::String(s) => Value::String(s.chars().take(MAX_DATA_STRING_CHARS).collect()),
            Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
            Value::Array(_) | Value::Object(_) => continue,
        };
        filtered.insert(key.to_string(), kept);
    }
    filtered
}

/// Cap `text` at `max_chars` characters, ending in an ellipsis when cut.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push(ELLIPSIS);
    truncated
}

/// `0x` followed by one or more hex digits.
fn is_hex_identifier(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn notification(title: &str, body: &str, data: Value) -> PushNotification {
        PushNotification {
            title: title.to_string(),
            body: body.to_string(),
            badge: None,
            sound: None,
            data: data.as_object().cloned(),
        }
    }

    #[test]
    fn test_long_title_is_cut_to_80_chars_with_ellipsis() {
        let sanitized = sanitize(&notification(&"t".repeat(300), "body", json!({})));
        assert_eq!(sanitized.title.chars().count(), 80);
        assert!(sanitized.title.starts_with(&"t".repeat(79)));
        assert!(sanitized.title.ends_with('…'));
    }

    #[test]
    fn test_body_limit_and_short_text_untouched() {
        let sanitized = sanitize(&notification("hi", &"b".repeat(221), json!({})));
        assert_eq!(sanitized.title, "hi");
        assert_eq!(sanitized.body.chars().count(), 220);
        assert!(sanitized.body.ends_with('…'));

        let exact = sanitize(&notification("hi", &"b".repeat(220), json!({})));
        assert_eq!(exact.body, "b".repeat(220));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let sanitized = sanitize(&notification(&"é".repeat(100), "", json!({})));
        assert_eq!(sanitized.title.chars().count(), 80);
    }

    #[test]
    fn test_data_whitelist() {
        let sanitized = sanitize(&notification(
            "t",
            "b",
            json!({
                "type": "reply",
                "commentId": "0xabc123",
                "chainId": 8453,
                "secret": "drop me",
                "parentAddress": null,
                "actorAddress": { "nested": true },
                "parentId": ["0x1"]
            }),
        ));

        assert_eq!(sanitized.data.get("type"), Some(&json!("reply")));
        assert_eq!(sanitized.data.get("commentId"), Some(&json!("0xabc123")));
        assert_eq!(sanitized.data.get("chainId"), Some(&json!(8453)));
        assert_eq!(sanitized.data.get("parentAddress"), Some(&Value::Null));
        assert!(!sanitized.data.contains_key("secret"));
        assert!(!sanitized.data.contains_key("actorAddress"));
        assert!(!sanitized.data.contains_key("parentId"));
    }

    #[test]
    fn test_long_strings_capped_but_hex_ids_kept() {
        let long_hex = format!("0x{}", "ab".repeat(200));
        let sanitized = sanitize(&notification(
            "t",
            "b",
            json!({ "type": "x".repeat(1000), "commentId": long_hex.clone() }),
        ));
        assert_eq!(
            sanitized.data["type"].as_str().unwrap().chars().count(),
            256
        );
        assert_eq!(sanitized.data["commentId"], json!(long_hex));
    }

    #[test]
    fn test_badge_and_sound_type_checked() {
        let mut n = notification("t", "b", json!({}));
        n.badge = Some(json!("3"));
        n.sound = Some(json!(1));
        let sanitized = sanitize(&n);
        assert_eq!(sanitized.badge, None);
        assert_eq!(sanitized.sound, None);

        n.badge = Some(json!(3));
        n.sound = Some(json!("chime.caf"));
        let sanitized = sanitize(&n);
        assert_eq!(sanitized.badge.map(|b| b.to_string()), Some("3".to_string()));
        assert_eq!(sanitized.sound.as_deref(), Some("chime.caf"));
    }

    #[test]
    fn test_hex_identifier_shape() {
        assert!(is_hex_identifier("0xABCdef09"));
        assert!(!is_hex_identifier("0x"));
        assert!(!is_hex_identifier("0xzz"));
        assert!(!is_hex_identifier("abc"));
    }
}
