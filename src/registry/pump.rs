//! Per-connection read loop and heartbeat.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace, warn};

use crate::dispatch::MessageDispatcher;
use crate::error::Error;
use crate::identifiers::{ConnectionId, epoch_millis};
use crate::protocol::{ClientFrame, Control, InboundMessage};
use crate::transport::{LinkSender, TransportEvent};

use super::RegistryInner;

// ============================================================================
// Pump
// ============================================================================

/// Everything the read loop needs for one live connection.
pub(super) struct Pump {
    pub(super) registry: Weak<RegistryInner>,
    pub(super) connection_id: ConnectionId,
    pub(super) sender: LinkSender,
    pub(super) dispatcher: MessageDispatcher,
    pub(super) heartbeat_interval: Duration,
    pub(super) heartbeat_max_missed: u32,
}

impl Pump {
    /// Reads frames and sends heartbeats until the link dies, then reports
    /// the loss to the registry.
    pub(super) async fn run(self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        let mut heartbeat = interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut missed: u32 = 0;

        let cause = loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(TransportEvent::Text(text)) => {
                            missed = 0;
                            self.handle_text(&text);
                        }
                        Some(TransportEvent::Closed { reason }) => {
                            debug!(connection_id = %self.connection_id, ?reason, "Transport closed");
                            break Error::ConnectionClosed;
                        }
                        None => break Error::ConnectionClosed,
                    }
                }

                _ = heartbeat.tick() => {
                    if missed >= self.heartbeat_max_missed {
                        warn!(connection_id = %self.connection_id, missed, "Heartbeat timeout");
                        self.sender.close();
                        break Error::heartbeat_timeout(missed);
                    }
                    let Ok(ping) = serde_json::to_string(&ClientFrame::Ping { timestamp: epoch_millis() }) else {
                        continue;
                    };
                    if !self.sender.send_text(ping) {
                        break Error::ConnectionClosed;
                    }
                    missed += 1;
                    trace!(connection_id = %self.connection_id, missed, "Heartbeat sent");
                }
            }
        };

        if let Some(registry) = self.registry.upgrade() {
            registry.on_connection_lost(&self.connection_id, &cause);
        }
    }

    /// Consumes control frames and dispatches everything else.
    fn handle_text(&self, text: &str) {
        let message = match InboundMessage::from_text(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection_id = %self.connection_id, error = %e, "Dropping unparseable frame");
                return;
            }
        };

        match Control::classify(&message) {
            Some(Control::Pong) => trace!(connection_id = %self.connection_id, "Heartbeat acknowledged"),
            Some(Control::Ack) => debug!(connection_id = %self.connection_id, "Duplicate handshake ack ignored"),
            Some(Control::Rejected { .. }) | None => {
                let report = self.dispatcher.dispatch(&message);
                trace!(
                    connection_id = %self.connection_id,
                    feature = message.feature(),
                    matched = report.matched,
                    handled = report.handled,
                    failed = report.failed,
                    "Message dispatched"
                );
            }
        }
    }
}
