//! Transport layer.
//!
//! A [`Connector`] opens a full-duplex link to the realtime server and hands
//! back a channel pair; the registry never touches sockets directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   TransportCommand   ┌──────────────────┐
//! │  ConnectionRegistry  │─────────────────────►│  bridge task     │      WebSocket
//! │  (pump task)         │◄─────────────────────│  (WsConnector)   │◄────────────────► server
//! └──────────────────────┘   TransportEvent     └──────────────────┘
//! ```
//!
//! # Link Lifecycle
//!
//! 1. `Connector::open` - Establish the socket, spawn the bridge task
//! 2. `Link::send_text` / `Link::recv` - Exchange text frames
//! 3. `Link::close` (or dropping every sender) - Close the socket
//! 4. `TransportEvent::Closed` - Remote close or transport error
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | tokio-tungstenite client connector |
//! | `memory` | In-process connector with a scriptable server |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket client connector.
pub mod connection;

/// In-process connector for tests and demos.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::WsConnector;
pub use memory::MemoryConnector;

// ============================================================================
// Types
// ============================================================================

/// Commands from the registry to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Send a text frame.
    Send(String),
    /// Close the transport.
    Close,
}

/// Events from the transport to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Text(String),
    /// The transport closed or failed.
    Closed {
        /// Close reason or error description.
        reason: Option<String>,
    },
}

// ============================================================================
// Connector
// ============================================================================

/// Opens transport links.
///
/// Implementations must return only once the link can carry frames.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a link to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConnectFailed`] if the server is unreachable.
    async fn open(&self, url: &Url) -> Result<Link>;
}

// ============================================================================
// Link
// ============================================================================

/// An open transport: outbound commands plus inbound events.
#[derive(Debug)]
pub struct Link {
    sender: LinkSender,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Link {
    /// Creates a link from its channel ends.
    #[must_use]
    pub fn new(
        commands: mpsc::UnboundedSender<TransportCommand>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            sender: LinkSender { commands },
            events,
        }
    }

    /// Queues a text frame. Returns `false` if the transport is gone.
    #[inline]
    pub fn send_text(&self, text: String) -> bool {
        self.sender.send_text(text)
    }

    /// Receives the next event. `None` means the transport task ended.
    #[inline]
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Requests close.
    #[inline]
    pub fn close(&self) {
        self.sender.close();
    }

    /// Splits into the sending half and the event receiver.
    #[must_use]
    pub fn split(self) -> (LinkSender, mpsc::UnboundedReceiver<TransportEvent>) {
        (self.sender, self.events)
    }
}

/// Sending half of a [`Link`].
#[derive(Debug, Clone)]
pub struct LinkSender {
    commands: mpsc::UnboundedSender<TransportCommand>,
}

impl LinkSender {
    /// Queues a text frame. Returns `false` if the transport is gone.
    #[inline]
    pub fn send_text(&self, text: String) -> bool {
        self.commands.send(TransportCommand::Send(text)).is_ok()
    }

    /// Requests close.
    #[inline]
    pub fn close(&self) {
        let _ = self.commands.send(TransportCommand::Close);
    }

    /// Returns `true` once the transport task has dropped its receiver.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_link_round_trip_through_channels() {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut link = Link::new(command_tx, event_rx);

        assert!(link.send_text("hello".into()));
        assert_eq!(
            command_rx.recv().await,
            Some(TransportCommand::Send("hello".into()))
        );

        event_tx.send(TransportEvent::Text("world".into())).unwrap();
        assert_eq!(link.recv().await, Some(TransportEvent::Text("world".into())));

        link.close();
        assert_eq!(command_rx.recv().await, Some(TransportCommand::Close));
    }

    #[test]
    fn test_sender_reports_closed_transport() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (sender, _events) = Link::new(command_tx, event_rx).split();

        drop(command_rx);
        assert!(sender.is_closed());
        assert!(!sender.send_text("late".into()));
    }
}
