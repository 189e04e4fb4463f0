//! Inbound messages and the outbound envelope.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::epoch_millis;

// ============================================================================
// InboundMessage
// ============================================================================

/// A frame received from the server.
///
/// The routing discriminator is the `feature` field when present, otherwise
/// the `type` field.
///
/// # Format
///
/// ```json
/// { "type": "chat_message", "feature": "messaging", "content": "hi" }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Routing discriminator.
    feature: String,
    /// Complete decoded object.
    body: Map<String, Value>,
}

impl InboundMessage {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::Protocol`] if it is not an object with `feature` or `type`
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Builds a message from a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the value has no string discriminator.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(body) = value else {
            return Err(Error::protocol("inbound frame is not a JSON object"));
        };

        let feature = body
            .get("feature")
            .and_then(Value::as_str)
            .or_else(|| body.get("type").and_then(Value::as_str))
            .ok_or_else(|| Error::protocol("inbound frame has no feature or type"))?
            .to_string();

        Ok(Self { feature, body })
    }

    /// Returns the routing discriminator.
    #[inline]
    #[must_use]
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Returns the `type` field, if any.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> Option<&str> {
        self.get_str("type")
    }

    /// Returns a string field.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// Returns a field.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Returns the decoded object.
    #[inline]
    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Converts into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

// ============================================================================
// OutboundEnvelope
// ============================================================================

/// A page payload tagged with its origin.
///
/// # Format
///
/// ```json
/// {
///   "type": "chat_message",
///   "content": "hi",
///   "source_page": "/chat/12",
///   "connection_type": "chat",
///   "features": ["messaging"],
///   "timestamp": 1700000000000
/// }
/// ```
///
/// Non-object payloads are carried under a `data` key. Injected fields
/// overwrite payload fields with the same name.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    /// Original payload fields.
    #[serde(flatten)]
    payload: Map<String, Value>,
    /// Route the message was sent from.
    pub source_page: String,
    /// Connection type label from the page policy.
    pub connection_type: String,
    /// Features the page supports.
    pub features: Vec<String>,
    /// Send time in epoch milliseconds.
    pub timestamp: u64,
}

impl OutboundEnvelope {
    /// Wraps `payload` with page metadata, stamped now.
    #[must_use]
    pub fn new(
        payload: Value,
        source_page: impl Into<String>,
        connection_type: impl Into<String>,
        features: Vec<String>,
    ) -> Self {
        let mut payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        for key in ["source_page", "connection_type", "features", "timestamp"] {
            payload.remove(key);
        }

        Self {
            payload,
            source_page: source_page.into(),
            connection_type: connection_type.into(),
            features,
            timestamp: epoch_millis(),
        }
    }

    /// Returns the original payload fields.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_feature_preferred_over_type() {
        let msg =
            InboundMessage::from_text(r#"{"type":"chat_message","feature":"messaging"}"#).unwrap();
        assert_eq!(msg.feature(), "messaging");
        assert_eq!(msg.message_type(), Some("chat_message"));
    }

    #[test]
    fn test_type_used_when_no_feature() {
        let msg = InboundMessage::from_text(r#"{"type":"typing_indicator"}"#).unwrap();
        assert_eq!(msg.feature(), "typing_indicator");
    }

    #[test]
    fn test_rejects_non_object() {
        let err = InboundMessage::from_text("[1,2]").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_rejects_missing_discriminator() {
        let err = InboundMessage::from_text(r#"{"content":"hi"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = InboundMessage::from_text("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_envelope_injects_metadata() {
        let envelope = OutboundEnvelope::new(
            json!({ "type": "chat_message", "content": "hi", "source_page": "spoofed" }),
            "/chat/12",
            "chat",
            vec!["messaging".into()],
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["content"], json!("hi"));
        assert_eq!(value["source_page"], json!("/chat/12"));
        assert_eq!(value["connection_type"], json!("chat"));
        assert_eq!(value["features"], json!(["messaging"]));
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_envelope_wraps_scalar_payload() {
        let envelope = OutboundEnvelope::new(json!("ping"), "/", "global", Vec::new());
        assert_eq!(envelope.payload().get("data"), Some(&json!("ping")));
    }
}
