//! Consult Realtime - shared, page-aware WebSocket connection layer.
//!
//! This library keeps one multiplexed realtime connection for every page of
//! the consultation application and decides, per route and auth state,
//! whether that connection should exist.
//!
//! # Architecture
//!
//! - **Registry**: owns the single transport, its status, reconnect backoff
//!   and heartbeat
//! - **Dispatcher**: routes each inbound frame to every handler whose
//!   feature filter accepts it
//! - **Policy**: resolves a route to a [`PageWebSocketConfig`] by
//!   longest segment prefix
//! - **Controller**: one per mounted page; connects, adopts, or releases
//!
//! Key design principles:
//!
//! - The registry is an injected handle, never a global
//! - Teardown is refcounted: the transport closes when the last page lets go
//! - Background failures surface as status, never as errors in page code
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use consult_realtime::{
//!     ConnectionRegistry, CurrentUser, DeviceInfo, PageConnectionController, PolicyTable,
//!     Result, StaticSession,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = ConnectionRegistry::builder()
//!         .url("wss://consult.example.com/ws")
//!         .build()?;
//!
//!     let session = Arc::new(StaticSession::signed_in(
//!         CurrentUser::new("42", "consultant"),
//!         "bearer-token",
//!     ));
//!
//!     let page = PageConnectionController::new(
//!         registry.clone(),
//!         Arc::new(PolicyTable::consultation()),
//!         session,
//!         Arc::new(DeviceInfo::default()),
//!         "/chat/12",
//!     );
//!
//!     page.evaluate().await;
//!     page.send_message(serde_json::json!({ "type": "chat_message", "content": "hello" }));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`controller`] | Per-page orchestration |
//! | [`dispatch`] | Feature-filtered message handlers |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`policy`] | Route-to-connection policy table |
//! | [`protocol`] | Wire frames and handshake parameters |
//! | [`registry`] | The shared connection |
//! | [`session`] | Auth and device collaborators |
//! | [`transport`] | WebSocket and in-memory connectors |

// ============================================================================
// Modules
// ============================================================================

/// Per-page orchestration.
///
/// [`PageConnectionController`] binds route and auth changes to the shared
/// registry.
pub mod controller;

/// Feature-filtered message handlers.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Route-to-connection policy table.
pub mod policy;

/// Wire frames and handshake parameters.
pub mod protocol;

/// The shared connection: status, reconnect, heartbeat.
pub mod registry;

/// Auth and device collaborators.
pub mod session;

/// WebSocket transport layer.
///
/// [`Connector`] implementations for real sockets and in-memory tests.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Controller types
pub use controller::{ConnectionDecision, ControllerPhase, Evaluation, PageConnectionController};

// Dispatch types
pub use dispatch::{DispatchReport, FeatureFilter, HandlerFn, MessageDispatcher, WILDCARD};

// Error types
pub use error::{Error, ErrorKind, Result};

// Identifier types
pub use identifiers::{ConnectionId, HandlerId, ListenerId};

// Policy types
pub use policy::{PageWebSocketConfig, PolicyTable, PolicyTableBuilder};

// Protocol types
pub use protocol::{ConnectionParams, DeviceInfo, InboundMessage, OutboundEnvelope, UserType};

// Registry types
pub use registry::{
    BackoffPolicy, ConnectOutcome, ConnectionRegistry, ConnectionStatus, RegistryBuilder,
    RegistryConfig, StatusChange, StatusListener,
};

// Session types
pub use session::{AuthProvider, CurrentUser, DeviceProvider, StaticSession};

// Transport types
pub use transport::{Connector, Link, LinkSender, MemoryConnector, TransportEvent, WsConnector};
