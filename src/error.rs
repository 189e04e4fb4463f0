//! Error types for the realtime connection layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use consult_realtime::{ConnectionRegistry, Result};
//!
//! async fn example(registry: &ConnectionRegistry, params: ConnectionParams) -> Result<()> {
//!     registry.connect(params).await?;
//!     Ok(())
//! }
//! ```
//!
//! Only the explicit connect path and configuration return errors to callers.
//! Background reconnects, heartbeat timeouts and handler failures are logged
//! and surfaced as status changes instead.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::ConnectFailed`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::HeartbeatTimeout`] |
//! | Session | [`Error::AuthUnavailable`], [`Error::SendWhileDisconnected`] |
//! | Dispatch | [`Error::Handler`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ErrorKind
// ============================================================================

/// Coarse classification of failures.
///
/// Several variants of [`enum@Error`] share a kind, e.g. a handshake timeout
/// and a refused socket are both [`ErrorKind::ConnectFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Handshake or network failure while connecting.
    ConnectFailed,
    /// A page requires auth but no user or token is available.
    AuthUnavailable,
    /// An outbound message was attempted while not connected.
    SendWhileDisconnected,
    /// A registered message handler failed.
    HandlerException,
    /// Keepalive responses stopped arriving.
    HeartbeatTimeout,
    /// Invalid configuration.
    Config,
    /// Malformed frame or unexpected protocol state.
    Protocol,
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when registry or policy configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connect attempt failed.
    ///
    /// Returned when the socket cannot be opened, the server rejects the
    /// identification frame, or the transport closes before the ack.
    #[error("Connect failed: {message}")]
    ConnectFailed {
        /// Description of the failure.
        message: String,
    },

    /// Connect attempt did not complete in time.
    #[error("Connect timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Transport closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Too many heartbeats went unanswered.
    #[error("Heartbeat timeout after {missed} missed pings")]
    HeartbeatTimeout {
        /// Number of consecutive unanswered pings.
        missed: u32,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No authenticated user or valid token.
    #[error("Authentication unavailable")]
    AuthUnavailable,

    /// Message not sent because the connection is not live.
    #[error("Cannot send while {status}")]
    SendWhileDisconnected {
        /// Status at the time of the send attempt.
        status: String,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// A message handler returned an error or panicked.
    #[error("Handler {handler_id} failed: {message}")]
    Handler {
        /// Id of the failing handler.
        handler_id: String,
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connect failed error.
    #[inline]
    pub fn connect_failed(message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            message: message.into(),
        }
    }

    /// Creates a connect timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a heartbeat timeout error.
    #[inline]
    pub fn heartbeat_timeout(missed: u32) -> Self {
        Self::HeartbeatTimeout { missed }
    }

    /// Creates a send-while-disconnected error.
    #[inline]
    pub fn send_while_disconnected(status: impl ToString) -> Self {
        Self::SendWhileDisconnected {
            status: status.to_string(),
        }
    }

    /// Creates a handler error.
    #[inline]
    pub fn handler(handler_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler_id: handler_id.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::Url(_) => ErrorKind::Config,
            Self::ConnectFailed { .. }
            | Self::ConnectionTimeout { .. }
            | Self::ConnectionClosed
            | Self::WebSocket(_) => ErrorKind::ConnectFailed,
            Self::HeartbeatTimeout { .. } => ErrorKind::HeartbeatTimeout,
            Self::AuthUnavailable => ErrorKind::AuthUnavailable,
            Self::SendWhileDisconnected { .. } => ErrorKind::SendWhileDisconnected,
            Self::Handler { .. } => ErrorKind::HandlerException,
            Self::Protocol { .. } | Self::Json(_) => ErrorKind::Protocol,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::HeartbeatTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::HeartbeatTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the background reconnect loop should retry.
    ///
    /// A rejected identification is still retried: tokens may be refreshed
    /// between attempts.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Url(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
