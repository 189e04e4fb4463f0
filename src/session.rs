//! Authentication and device collaborators.
//!
//! The controller never stores tokens itself; it asks an [`AuthProvider`]
//! at connect time and a [`DeviceProvider`] for the handshake's device
//! fields. [`StaticSession`] is a simple in-memory provider for tooling
//! and tests.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::protocol::{DeviceInfo, UserType};

// ============================================================================
// CurrentUser
// ============================================================================

/// The authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// User id.
    pub id: String,
    /// Role string as reported by the auth layer.
    pub current_role: String,
}

impl CurrentUser {
    /// Creates a user.
    #[must_use]
    pub fn new(id: impl Into<String>, current_role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current_role: current_role.into(),
        }
    }

    /// Maps the role to a handshake user type.
    #[inline]
    #[must_use]
    pub fn user_type(&self) -> UserType {
        UserType::from_role(&self.current_role)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Source of the current identity and bearer token.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the signed-in user, if any.
    fn current_user(&self) -> Option<CurrentUser>;

    /// Returns a non-expired token, refreshing if needed.
    async fn valid_token(&self) -> Option<String>;
}

/// Source of device details for the handshake.
pub trait DeviceProvider: Send + Sync {
    /// Returns the device description.
    fn device_info(&self) -> DeviceInfo;
}

impl DeviceProvider for DeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        self.clone()
    }
}

// ============================================================================
// StaticSession
// ============================================================================

/// In-memory [`AuthProvider`] whose identity is set explicitly.
#[derive(Debug, Default)]
pub struct StaticSession {
    user: RwLock<Option<CurrentUser>>,
    token: RwLock<Option<String>>,
}

impl StaticSession {
    /// Creates a signed-out session.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session signed in as `user` with `token`.
    #[must_use]
    pub fn signed_in(user: CurrentUser, token: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(user, token);
        session
    }

    /// Sets the user and token.
    pub fn sign_in(&self, user: CurrentUser, token: impl Into<String>) {
        *self.user.write() = Some(user);
        *self.token.write() = Some(token.into());
    }

    /// Clears the user and token.
    pub fn sign_out(&self) {
        *self.user.write() = None;
        *self.token.write() = None;
    }

    /// Replaces the token only, e.g. to simulate expiry with `None`.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

#[async_trait]
impl AuthProvider for StaticSession {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user.read().clone()
    }

    async fn valid_token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_from_role() {
        assert_eq!(CurrentUser::new("1", "Doctor").user_type(), UserType::Doctor);
        assert_eq!(CurrentUser::new("1", "admin").user_type(), UserType::User);
    }

    #[test]
    fn test_static_session_sign_in_and_out() {
        let session = StaticSession::new();
        assert!(session.current_user().is_none());
        assert!(tokio_test::block_on(session.valid_token()).is_none());

        session.sign_in(CurrentUser::new("7", "customer"), "tok");
        assert_eq!(session.current_user().map(|u| u.id), Some("7".to_string()));
        assert_eq!(tokio_test::block_on(session.valid_token()).as_deref(), Some("tok"));

        session.set_token(None);
        assert!(session.current_user().is_some());
        assert!(tokio_test::block_on(session.valid_token()).is_none());

        session.sign_out();
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_device_info_is_its_own_provider() {
        let device = DeviceInfo {
            device_id: "dev-1".into(),
            screen_width: 1280,
            screen_height: 720,
            ..DeviceInfo::default()
        };
        assert_eq!(device.device_info(), device);
    }
}
