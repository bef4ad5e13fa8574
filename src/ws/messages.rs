//! Inbound message decoding and close-frame helpers.

use axum::extract::ws::{CloseFrame, Message, close_code};

/// Maximum length of a close-frame reason (125-byte control payload minus
/// the 2-byte code).
const MAX_CLOSE_REASON_LEN: usize = 123;

/// Extracts the relayed payload from an inbound text message.
///
/// - A JSON object with a `payload` field relays that field.
/// - Any other JSON value is relayed whole.
/// - Text that is not JSON is relayed as a JSON string.
#[must_use]
pub fn parse_inbound(text: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(mut object)) => match object.remove("payload") {
            Some(payload) => payload,
            None => serde_json::Value::Object(object),
        },
        Ok(value) => value,
        Err(_) => serde_json::Value::String(text.to_string()),
    }
}

/// Builds a close message with `code` and a reason truncated to fit a
/// control frame on a UTF-8 boundary.
#[must_use]
pub fn close_message(code: u16, reason: &str) -> Message {
    let mut end = reason.len().min(MAX_CLOSE_REASON_LEN);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    let reason = reason.get(..end).unwrap_or_default().to_string();
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// Close message sent when a session ends normally.
#[must_use]
pub fn normal_close(reason: &str) -> Message {
    close_message(close_code::NORMAL, reason)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn envelope_payload_is_unwrapped() {
        let value = parse_inbound(r#"{"type":"data","payload":{"console":"log"}}"#);
        assert_eq!(value, serde_json::json!({"console": "log"}));
    }

    #[test]
    fn bare_json_is_relayed_whole() {
        let value = parse_inbound(r#"{"network":{"url":"/api"}}"#);
        assert_eq!(value, serde_json::json!({"network": {"url": "/api"}}));
        assert_eq!(parse_inbound("[1,2]"), serde_json::json!([1, 2]));
    }

    #[test]
    fn plain_text_becomes_string() {
        assert_eq!(parse_inbound("hello"), serde_json::json!("hello"));
    }

    #[test]
    fn close_reason_is_truncated_on_char_boundary() {
        let long = "é".repeat(100);
        let Message::Close(Some(frame)) = close_message(4102, &long) else {
            panic!("expected close frame");
        };
        assert_eq!(frame.code, 4102);
        assert!(frame.reason.as_str().len() <= MAX_CLOSE_REASON_LEN);
        assert!(frame.reason.as_str().chars().all(|c| c == 'é'));
    }
}
