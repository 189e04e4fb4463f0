//! Client frames and server control frames.
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `connect` | Client → Server | Identification with [`ConnectionParams`] |
//! | `ping` | Client → Server | Heartbeat |
//! | `connected` / `connection_ack` | Server → Client | Handshake accepted |
//! | `error` / `auth_error` | Server → Client | Handshake rejected |
//! | `pong` | Server → Client | Heartbeat reply |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use super::{ConnectionParams, InboundMessage};

// ============================================================================
// ClientFrame
// ============================================================================

/// A control frame sent by the registry itself.
///
/// # Format
///
/// ```json
/// { "type": "connect", "userId": "42", "connectionId": "...", ... }
/// { "type": "ping", "timestamp": 1700000000000 }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame<'a> {
    /// Identification handshake.
    Connect(&'a ConnectionParams),
    /// Heartbeat ping.
    Ping {
        /// Send time in epoch milliseconds.
        timestamp: u64,
    },
}

// ============================================================================
// Control
// ============================================================================

/// Server frames the registry consumes instead of dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Handshake accepted.
    Ack,
    /// Handshake rejected.
    Rejected {
        /// Server-supplied reason.
        reason: String,
    },
    /// Heartbeat reply.
    Pong,
}

impl Control {
    /// Classifies an inbound message by its `type` field.
    #[must_use]
    pub fn classify(message: &InboundMessage) -> Option<Self> {
        match message.message_type()? {
            "connected" | "connection_ack" | "connection_established" => Some(Self::Ack),
            "error" | "auth_error" | "connection_rejected" => Some(Self::Rejected {
                reason: message
                    .get_str("message")
                    .or_else(|| message.get_str("error"))
                    .unwrap_or("rejected by server")
                    .to_string(),
            }),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
