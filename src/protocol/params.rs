//! Identification parameters sent in the connect handshake.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ConnectionId;

// ============================================================================
// UserType
// ============================================================================

/// Role of the connecting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Platform customer.
    Customer,
    /// Consultant answering customers.
    Consultant,
    /// Doctor.
    Doctor,
    /// Any other authenticated user.
    #[default]
    User,
}

impl UserType {
    /// Maps a role string to a user type; unknown roles become [`UserType::User`].
    #[must_use]
    pub fn from_role(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "customer" => Self::Customer,
            "consultant" => Self::Consultant,
            "doctor" => Self::Doctor,
            _ => Self::User,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Consultant => "consultant",
            Self::Doctor => "doctor",
            Self::User => "user",
        }
    }
}

// ============================================================================
// DeviceInfo
// ============================================================================

/// Device and browser introspection results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable per-device id.
    pub device_id: String,
    /// Device class, e.g. `desktop` or `mobile`.
    pub device_type: String,
    /// Client IP if known.
    pub ip: Option<String>,
    /// User agent string.
    pub user_agent: String,
    /// Platform name.
    pub platform: String,
    /// Screen width in pixels.
    pub screen_width: u32,
    /// Screen height in pixels.
    pub screen_height: u32,
}

impl DeviceInfo {
    /// Formats the screen as `WIDTHxHEIGHT`.
    #[inline]
    #[must_use]
    pub fn screen_resolution(&self) -> String {
        format!("{}x{}", self.screen_width, self.screen_height)
    }
}

// ============================================================================
// ConnectionParams
// ============================================================================

/// Identifies who is connecting and from what device.
///
/// # Format
///
/// ```json
/// {
///   "userId": "42",
///   "token": "bearer-token",
///   "userType": "consultant",
///   "connectionId": "chat_chat_1700000000000",
///   "deviceId": "dev-1",
///   "deviceType": "desktop",
///   "userAgent": "...",
///   "platform": "Linux",
///   "screenResolution": "1920x1080"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    /// Authenticated user id.
    pub user_id: String,
    /// Bearer token, if any.
    pub token: Option<String>,
    /// Role of the user.
    pub user_type: UserType,
    /// Id of this attempt.
    pub connection_id: ConnectionId,
    /// Device id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Device class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// User agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Screen resolution as `WxH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
}

impl ConnectionParams {
    /// Creates params without device details.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        token: Option<String>,
        user_type: UserType,
        connection_id: ConnectionId,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token,
            user_type,
            connection_id,
            device_id: None,
            device_type: None,
            user_agent: None,
            platform: None,
            screen_resolution: None,
        }
    }

    /// Fills the device fields from `device`.
    #[must_use]
    pub fn with_device(mut self, device: &DeviceInfo) -> Self {
        self.device_id = Some(device.device_id.clone());
        self.device_type = Some(device.device_type.clone());
        self.user_agent = Some(device.user_agent.clone());
        self.platform = Some(device.platform.clone());
        self.screen_resolution = Some(device.screen_resolution());
        self
    }

    /// Returns a copy stamped with a new connection id, for a retry.
    #[must_use]
    pub fn for_retry(&self) -> Self {
        Self {
            connection_id: self.connection_id.regenerate(),
            ..self.clone()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn device() -> DeviceInfo {
        DeviceInfo {
            device_id: "dev-1".into(),
            device_type: "desktop".into(),
            ip: None,
            user_agent: "test-agent".into(),
            platform: "Linux".into(),
            screen_width: 1920,
            screen_height: 1080,
        }
    }

    #[test]
    fn test_user_type_from_role() {
        assert_eq!(UserType::from_role("Consultant"), UserType::Consultant);
        assert_eq!(UserType::from_role(" doctor "), UserType::Doctor);
        assert_eq!(UserType::from_role("customer"), UserType::Customer);
        assert_eq!(UserType::from_role("admin"), UserType::User);
    }

    #[test]
    fn test_params_serialize_camel_case() {
        let params = ConnectionParams::new(
            "42",
            Some("tok".into()),
            UserType::Consultant,
            ConnectionId::generate("chat", "/chat"),
        )
        .with_device(&device());

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["userId"], json!("42"));
        assert_eq!(value["userType"], json!("consultant"));
        assert_eq!(value["screenResolution"], json!("1920x1080"));
        assert!(value["connectionId"].as_str().unwrap().starts_with("chat_chat_"));
    }

    #[test]
    fn test_params_skip_missing_device_fields() {
        let params = ConnectionParams::new(
            "1",
            None,
            UserType::User,
            ConnectionId::generate("global", "/"),
        );
        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("deviceId").is_none());
        assert_eq!(value["token"], json!(null));
    }

    #[test]
    fn test_for_retry_changes_only_connection_id() {
        let params = ConnectionParams::new(
            "7",
            Some("t".into()),
            UserType::Customer,
            ConnectionId::generate("chat", "/chat"),
        );
        let retry = params.for_retry();
        assert_ne!(retry.connection_id, params.connection_id);
        assert_eq!(retry.user_id, params.user_id);
        assert_eq!(retry.token, params.token);
    }
}
