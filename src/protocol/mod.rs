//! Wire message types.
//!
//! All frames are JSON text over a single WebSocket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ClientFrame::Connect` | Client → Server | Identification handshake |
//! | `ClientFrame::Ping` | Client → Server | Heartbeat |
//! | `Control` | Server → Client | Ack, rejection, pong |
//! | `InboundMessage` | Server → Client | Feature-tagged application data |
//! | `OutboundEnvelope` | Client → Server | Page payload plus origin metadata |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Handshake and heartbeat frames |
//! | `message` | Inbound messages and outbound envelope |
//! | `params` | Connection and device parameters |

// ============================================================================
// Submodules
// ============================================================================

/// Handshake and heartbeat frames.
pub mod frame;

/// Inbound messages and outbound envelope.
pub mod message;

/// Connection and device parameters.
pub mod params;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{ClientFrame, Control};
pub use message::{InboundMessage, OutboundEnvelope};
pub use params::{ConnectionParams, DeviceInfo, UserType};
