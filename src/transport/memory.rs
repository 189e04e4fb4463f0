//! In-process connector with a scriptable fake server.
//!
//! Every [`MemoryConnector::open`] creates a peer task that plays the server:
//! it acknowledges `connect` frames, answers `ping` with `pong`, and records
//! everything else. Knobs let tests refuse connections, reject the
//! handshake, go silent, or drop every live link out of band.
//!
//! # Example
//!
//! ```ignore
//! let connector = MemoryConnector::new();
//! let registry = ConnectionRegistry::builder()
//!     .url("ws://memory.test/ws")
//!     .connector(connector.clone())
//!     .build()?;
//!
//! registry.connect(params).await?;
//! assert_eq!(connector.live(), 1);
//!
//! connector.drop_all(); // registry starts reconnecting
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, Link, TransportCommand, TransportEvent};

// ============================================================================
// Types
// ============================================================================

/// A live fake-server peer.
struct Peer {
    id: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

/// Scriptable server behaviour and counters.
struct MemoryState {
    reachable: bool,
    reject_reason: Option<String>,
    auto_ack: bool,
    auto_pong: bool,
    next_peer_id: u64,
    opened: usize,
    peak_live: usize,
    peers: Vec<Peer>,
    handshakes: Vec<Value>,
    received: Vec<Value>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            reachable: true,
            reject_reason: None,
            auto_ack: true,
            auto_pong: true,
            next_peer_id: 1,
            opened: 0,
            peak_live: 0,
            peers: Vec::new(),
            handshakes: Vec::new(),
            received: Vec::new(),
        }
    }
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector whose server lives in the same process.
///
/// Cloning shares the same fake server.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    /// Creates a reachable server that acks handshakes and answers pings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// MemoryConnector - Controls
// ============================================================================

impl MemoryConnector {
    /// Makes subsequent `open` calls succeed or fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    /// Rejects subsequent handshakes with `reason`, or accepts them on `None`.
    pub fn reject_handshakes(&self, reason: Option<&str>) {
        self.state.lock().reject_reason = reason.map(str::to_string);
    }

    /// Enables or disables the handshake ack.
    pub fn set_auto_ack(&self, enabled: bool) {
        self.state.lock().auto_ack = enabled;
    }

    /// Enables or disables heartbeat replies.
    pub fn set_auto_pong(&self, enabled: bool) {
        self.state.lock().auto_pong = enabled;
    }

    /// Drops every live link as if the network failed.
    ///
    /// Returns the number of links dropped.
    pub fn drop_all(&self) -> usize {
        let peers: Vec<Peer> = self.state.lock().peers.drain(..).collect();
        let count = peers.len();
        for mut peer in peers {
            if let Some(task) = peer.task.take() {
                task.abort();
            }
            let _ = peer.events.send(TransportEvent::Closed {
                reason: Some("dropped by memory server".to_string()),
            });
        }
        debug!(count, "Memory server dropped links");
        count
    }

    /// Sends `frame` to every live link. Returns the number of recipients.
    pub fn push(&self, frame: &Value) -> usize {
        let text = frame.to_string();
        let state = self.state.lock();
        state
            .peers
            .iter()
            .filter(|peer| peer.events.send(TransportEvent::Text(text.clone())).is_ok())
            .count()
    }
}

// ============================================================================
// MemoryConnector - Counters
// ============================================================================

impl MemoryConnector {
    /// Number of links ever opened.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    /// Number of links currently open.
    #[must_use]
    pub fn live(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Highest number of links open at the same time.
    #[must_use]
    pub fn peak_live(&self) -> usize {
        self.state.lock().peak_live
    }

    /// Every `connect` frame received, in order.
    #[must_use]
    pub fn handshakes(&self) -> Vec<Value> {
        self.state.lock().handshakes.clone()
    }

    /// Every non-control frame received, in order.
    #[must_use]
    pub fn received(&self) -> Vec<Value> {
        self.state.lock().received.clone()
    }
}

// ============================================================================
// Connector
// ============================================================================

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &Url) -> Result<Link> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        if !state.reachable {
            return Err(Error::connect_failed(format!("{url} is unreachable")));
        }

        let id = state.next_peer_id;
        state.next_peer_id += 1;
        state.opened += 1;

        let task = tokio::spawn(run_peer(
            Arc::clone(&self.state),
            id,
            command_rx,
            event_tx.clone(),
        ));
        state.peers.push(Peer {
            id,
            events: event_tx,
            task: Some(task),
        });
        state.peak_live = state.peak_live.max(state.peers.len());

        debug!(peer = id, url = %url, "Memory link opened");
        Ok(Link::new(command_tx, event_rx))
    }
}

// ============================================================================
// Peer Loop
// ============================================================================

/// Plays the server side of one link.
async fn run_peer(
    state: Arc<Mutex<MemoryState>>,
    id: u64,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(command) = command_rx.recv().await {
        let TransportCommand::Send(text) = command else {
            break;
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            trace!(peer = id, "Memory server ignored non-JSON frame");
            continue;
        };

        let kind = frame.get("type").and_then(Value::as_str).map(str::to_owned);
        let reply = {
            let mut state = state.lock();
            match kind.as_deref() {
                Some("connect") => {
                    let connection_id = frame.get("connectionId").cloned();
                    state.handshakes.push(frame);
                    match &state.reject_reason {
                        Some(reason) => Some(json!({ "type": "auth_error", "message": reason })),
                        None if state.auto_ack => Some(json!({
                            "type": "connected",
                            "connectionId": connection_id,
                        })),
                        None => None,
                    }
                }
                Some("ping") if state.auto_pong => Some(json!({ "type": "pong" })),
                Some("ping") => None,
                _ => {
                    state.received.push(frame);
                    None
                }
            }
        };

        if let Some(reply) = reply
            && event_tx.send(TransportEvent::Text(reply.to_string())).is_err()
        {
            break;
        }
    }

    state.lock().peers.retain(|peer| peer.id != id);
    debug!(peer = id, "Memory link closed");
}

// ============================================================================
// Tests
// ============================================================================
