//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing connection, handler and listener ids.
//!
//! | Type | Format |
//! |------|--------|
//! | [`ConnectionId`] | `{connectionType}_{sanitizedPath}_{epochMillis}` |
//! | [`HandlerId`] | Caller-chosen string |
//! | [`ListenerId`] | Process-unique counter |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Clock
// ============================================================================

/// Last millisecond stamp handed out by [`unique_millis`].
static LAST_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Strictly increasing millisecond stamp, process-wide.
///
/// Two calls in the same millisecond (or across a backwards clock step)
/// still yield distinct values.
fn unique_millis() -> u64 {
    let now = epoch_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_MILLIS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifies one connection attempt.
///
/// Every attempt, including automatic reconnects, gets a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generates an id for a connection of `connection_type` made from `path`.
    #[must_use]
    pub fn generate(connection_type: &str, path: &str) -> Self {
        Self(format!(
            "{}_{}_{}",
            connection_type,
            sanitize_path(path),
            unique_millis()
        ))
    }

    /// Generates a new id with the same type and path as this one.
    #[must_use]
    pub fn regenerate(&self) -> Self {
        let prefix = self
            .0
            .rsplit_once('_')
            .map_or(self.0.as_str(), |(prefix, _)| prefix);
        Self(format!("{prefix}_{}", unique_millis()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapses every run of non-alphanumeric characters into one `_`.
fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// HandlerId
// ============================================================================

/// Identifies a message handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId(String);

impl HandlerId {
    /// Creates a handler id from a string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a unique id with the given prefix.
    #[must_use]
    pub fn unique(prefix: &str) -> Self {
        Self(format!("{prefix}_{}", Uuid::new_v4().simple()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for HandlerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Global counter for listener ids.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a status listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates the next listener id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_format() {
        let id = ConnectionId::generate("chat", "/chat/room-42");
        let (prefix, millis) = id.as_str().rsplit_once('_').unwrap();
        assert_eq!(prefix, "chat_chat_room_42");
        assert!(millis.parse::<u64>().is_ok());
    }

    #[test]
    fn test_connection_id_root_path() {
        let id = ConnectionId::generate("global", "/");
        assert!(id.as_str().starts_with("global_root_"));
    }

    #[test]
    fn test_connection_ids_unique_in_same_millisecond() {
        let a = ConnectionId::generate("chat", "/chat");
        let b = ConnectionId::generate("chat", "/chat");
        assert_ne!(a, b);
    }

    #[test]
    fn test_regenerate_keeps_prefix() {
        let a = ConnectionId::generate("consultant", "/consultant/dashboard");
        let b = a.regenerate();
        assert_ne!(a, b);
        assert!(b.as_str().starts_with("consultant_consultant_dashboard_"));
    }

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(sanitize_path("//a--b//c?x=1"), "a_b_c_x_1");
        assert_eq!(sanitize_path(""), "root");
    }

    #[test]
    fn test_handler_id_unique() {
        let a = HandlerId::unique("page_chat");
        let b = HandlerId::unique("page_chat");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("page_chat_"));
    }

    #[test]
    fn test_listener_ids_increase() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert!(b.as_u64() > a.as_u64());
    }
}
