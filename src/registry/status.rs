//! Connection status and status-change listeners.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::dispatch::panic_message;
use crate::identifiers::ListenerId;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// State of the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No transport and no attempt in progress.
    #[default]
    Disconnected,
    /// An attempt (initial or reconnect) is in progress.
    Connecting,
    /// Handshake completed; frames flow.
    Connected,
    /// The last attempt failed.
    Error,
}

impl ConnectionStatus {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    ///
    /// `Disconnected → Connecting → (Connected | Error)`, and from
    /// `Connected`/`Error` only back to `Disconnected` or `Connecting`.
    /// An attempt may also be abandoned with `Connecting → Disconnected`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Error | Self::Disconnected)
                | (Self::Connected | Self::Error, Self::Disconnected | Self::Connecting)
        )
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// StatusChange
// ============================================================================

/// One status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status before the transition.
    pub previous: ConnectionStatus,
    /// Status after the transition.
    pub current: ConnectionStatus,
}

/// Status listener callback.
pub type StatusListener = Arc<dyn Fn(StatusChange) + Send + Sync>;

// ============================================================================
// StatusListeners
// ============================================================================

/// Ordered listener set.
#[derive(Default)]
pub(crate) struct StatusListeners {
    entries: Mutex<Vec<(ListenerId, StatusListener)>>,
}

impl StatusListeners {
    pub(crate) fn add(&self, listener: StatusListener) -> ListenerId {
        let id = ListenerId::next();
        self.entries.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        before != entries.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Calls every listener in registration order; a panicking listener is
    /// logged and skipped.
    pub(crate) fn notify(&self, change: StatusChange) {
        let snapshot: Vec<(ListenerId, StatusListener)> = self.entries.lock().clone();
        for (id, listener) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(change))) {
                warn!(
                    listener = %id,
                    previous = %change.previous,
                    current = %change.current,
                    panic = %panic_message(panic.as_ref()),
                    "Status listener panicked"
                );
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
