//! The shared connection registry.
//!
//! One [`ConnectionRegistry`] owns at most one live transport and multiplexes
//! it across every page controller that holds a handle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ConnectionRegistry              │
//! │  status ─► listeners (registration order)    │
//! │  retain count (interested controllers)       │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ LiveSession: connection_id + LinkSender │  │
//! │  │ pump task: frames → MessageDispatcher   │  │
//! │  │            heartbeat pings              │  │
//! │  └────────────────────────────────────────┘  │
//! │  reconnect task (backoff)                    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `connect` - `Disconnected → Connecting`, open link, send `connect` frame
//! 2. Server ack - `Connecting → Connected`, pump task starts
//! 3. Link lost or heartbeat timeout - `Connected → Connecting`, backoff retries
//! 4. Retries exhausted - status stays `Error` until `connect` is called again
//! 5. `disconnect` (or last `release`) - close link, cancel timers, `→ Disconnected`
//!
//! No lock is held across an `.await`; every check-then-transition happens
//! inside one critical section.

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect backoff schedule.
pub mod backoff;

/// Fluent registry builder.
pub mod builder;

/// Registry configuration.
pub mod config;

/// Connection status and listeners.
pub mod status;

mod pump;

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::dispatch::MessageDispatcher;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, ListenerId};
use crate::protocol::{ClientFrame, ConnectionParams, Control, InboundMessage};
use crate::session::AuthProvider;
use crate::transport::{Connector, Link, LinkSender, TransportEvent};

use self::pump::Pump;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::BackoffPolicy;
pub use builder::RegistryBuilder;
pub use config::RegistryConfig;
pub use status::{ConnectionStatus, StatusChange, StatusListener};

use status::StatusListeners;

// ============================================================================
// ConnectOutcome
// ============================================================================

/// How a successful [`ConnectionRegistry::connect`] call was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// This call opened the connection.
    Established(ConnectionId),
    /// A connection was already live; nothing was opened.
    AlreadyConnected(ConnectionId),
    /// This call waited for an attempt already in progress.
    Joined(ConnectionId),
}

impl ConnectOutcome {
    /// Returns the id of the live connection.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        match self {
            Self::Established(id) | Self::AlreadyConnected(id) | Self::Joined(id) => id,
        }
    }

    /// Returns `true` if this call opened the connection.
    #[inline]
    #[must_use]
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established(_))
    }
}

// ============================================================================
// Internal State
// ============================================================================

/// The live transport.
struct LiveSession {
    connection_id: ConnectionId,
    sender: LinkSender,
    pump: JoinHandle<()>,
}

impl LiveSession {
    fn shutdown(self) {
        self.pump.abort();
        self.sender.close();
    }
}

/// Mutable registry state (guarded by one mutex).
#[derive(Default)]
struct RegistryState {
    status: ConnectionStatus,
    /// Bumped by explicit `connect`/`disconnect`; stale attempts compare against it.
    epoch: u64,
    /// Most recent params, kept only to drive automatic reconnects.
    params: Option<ConnectionParams>,
    session: Option<LiveSession>,
    reconnect: Option<JoinHandle<()>>,
    retain_count: usize,
    /// Bumped whenever the retain count is reset; tags tracked interests.
    interest_generation: u64,
    /// Transitions awaiting listener delivery, in order.
    pending: VecDeque<StatusChange>,
}

impl RegistryState {
    /// Applies a legal transition and queues its notification.
    fn transition(&mut self, next: ConnectionStatus, status_tx: &watch::Sender<ConnectionStatus>) -> bool {
        let previous = self.status;
        if previous == next {
            return false;
        }
        if !previous.can_transition_to(next) {
            warn!(%previous, %next, "Illegal status transition ignored");
            return false;
        }

        self.status = next;
        self.pending.push_back(StatusChange {
            previous,
            current: next,
        });
        status_tx.send_replace(next);
        debug!(%previous, %next, "Connection status changed");
        true
    }

    fn cancel_reconnect(&mut self) {
        if let Some(task) = self.reconnect.take() {
            task.abort();
        }
    }

    /// Tears down everything and moves to `Disconnected`.
    fn reset(&mut self, status_tx: &watch::Sender<ConnectionStatus>) -> Option<LiveSession> {
        self.cancel_reconnect();
        self.epoch += 1;
        self.params = None;
        self.retain_count = 0;
        self.interest_generation += 1;
        let session = self.session.take();
        self.transition(ConnectionStatus::Disconnected, status_tx);
        session
    }
}

/// Shared registry internals.
pub(crate) struct RegistryInner {
    config: RegistryConfig,
    url: Url,
    connector: Arc<dyn Connector>,
    dispatcher: MessageDispatcher,
    /// Re-asked for a token before each background retry.
    auth: Option<Arc<dyn AuthProvider>>,
    state: Mutex<RegistryState>,
    listeners: StatusListeners,
    flushing: AtomicBool,
    status_tx: watch::Sender<ConnectionStatus>,
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Owner of the single shared realtime connection.
///
/// Cloning is cheap and every clone refers to the same connection, so the
/// registry is handed to each page controller rather than reached through a
/// global.
///
/// # Example
///
/// ```ignore
/// let registry = ConnectionRegistry::builder()
///     .url("wss://consult.example.com/ws")
///     .build()?;
///
/// registry.add_connection_status_listener(|change| {
///     println!("{} -> {}", change.previous, change.current);
/// });
///
/// registry.connect(params).await?;
/// registry.send_message(&serde_json::json!({ "type": "typing", "feature": "typing_indicator" }));
/// ```
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionRegistry")
            .field("url", &self.inner.url.as_str())
            .field("status", &state.status)
            .field(
                "connection_id",
                &state.session.as_ref().map(|s| s.connection_id.as_str()),
            )
            .field("retain_count", &state.retain_count)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionRegistry - Constructor
// ============================================================================

impl ConnectionRegistry {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn new(
        config: RegistryConfig,
        url: Url,
        connector: Arc<dyn Connector>,
        dispatcher: MessageDispatcher,
        auth: Option<Arc<dyn AuthProvider>>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            inner: Arc::new(RegistryInner {
                config,
                url,
                connector,
                dispatcher,
                auth,
                state: Mutex::new(RegistryState::default()),
                listeners: StatusListeners::default(),
                flushing: AtomicBool::new(false),
                status_tx,
            }),
        }
    }
}

// ============================================================================
// ConnectionRegistry - Accessors
// ============================================================================

impl ConnectionRegistry {
    /// Returns `true` if the status is [`ConnectionStatus::Connected`].
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_status() == ConnectionStatus::Connected
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    /// Returns the id of the live connection.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|s| s.connection_id.clone())
    }

    /// Returns the number of controllers holding an interest.
    #[inline]
    #[must_use]
    pub fn retain_count(&self) -> usize {
        self.inner.state.lock().retain_count
    }

    /// Returns the dispatcher inbound messages are routed through.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.inner.dispatcher
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Subscribes to status values, e.g. to await a state.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }
}

// ============================================================================
// ConnectionRegistry - Listeners
// ============================================================================

impl ConnectionRegistry {
    /// Registers a listener called on every status transition.
    ///
    /// Listeners run in registration order, outside the registry lock.
    pub fn add_connection_status_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(StatusChange) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_connection_status_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

// ============================================================================
// ConnectionRegistry - Lifecycle
// ============================================================================

impl ConnectionRegistry {
    /// Connects with `params`.
    ///
    /// Calling this while connected is a no-op that reports
    /// [`ConnectOutcome::AlreadyConnected`]; the existing session keeps its
    /// identity. Calling it while an attempt is in progress waits for that
    /// attempt.
    ///
    /// A failed attempt leaves the status at `Error` and starts background
    /// reconnection with the same identity.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectFailed`] if the link cannot be opened, the server
    ///   rejects the handshake, or the attempt was cancelled by `disconnect`
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    pub async fn connect(&self, params: ConnectionParams) -> Result<ConnectOutcome> {
        let epoch = {
            let mut state = self.inner.state.lock();
            match (state.status, state.session.as_ref()) {
                (ConnectionStatus::Connected, Some(session)) => {
                    debug!(connection_id = %session.connection_id, "Already connected; connect is a no-op");
                    return Ok(ConnectOutcome::AlreadyConnected(session.connection_id.clone()));
                }
                (ConnectionStatus::Connecting, _) => None,
                _ => {
                    state.cancel_reconnect();
                    state.epoch += 1;
                    state.params = Some(params.clone());
                    state.transition(ConnectionStatus::Connecting, &self.inner.status_tx);
                    Some(state.epoch)
                }
            }
        };
        self.inner.flush_status_events();

        let Some(epoch) = epoch else {
            return self.join_in_flight().await;
        };

        debug!(connection_id = %params.connection_id, url = %self.inner.url, "Connecting");

        match self.inner.establish(&params).await {
            Ok(link) => {
                if self.inner.install(epoch, params.connection_id.clone(), link) {
                    Ok(ConnectOutcome::Established(params.connection_id))
                } else {
                    Err(Error::connect_failed("connect attempt was cancelled"))
                }
            }
            Err(e) => {
                warn!(connection_id = %params.connection_id, error = %e, "Connect failed");
                self.inner.fail_attempt(epoch, &e);
                Err(e)
            }
        }
    }

    /// Waits for the attempt in progress to settle.
    async fn join_in_flight(&self) -> Result<ConnectOutcome> {
        let mut status_rx = self.subscribe_status();
        let bound = self.inner.config.connect_timeout + self.inner.config.backoff.max_delay;

        let settled = timeout(bound, status_rx.wait_for(|s| *s != ConnectionStatus::Connecting))
            .await
            .map_err(|_| Error::connection_timeout(duration_millis(bound)))?
            .map(|s| *s)
            .map_err(|_| Error::ConnectionClosed)?;

        match (settled, self.connection_id()) {
            (ConnectionStatus::Connected, Some(id)) => Ok(ConnectOutcome::Joined(id)),
            _ => Err(Error::connect_failed("in-flight connect attempt failed")),
        }
    }

    /// Closes the connection and cancels reconnect timers.
    ///
    /// Safe to call at any time; a no-op when already disconnected.
    pub fn disconnect(&self) {
        let session = self.inner.state.lock().reset(&self.inner.status_tx);
        if let Some(session) = session {
            info!(connection_id = %session.connection_id, "Realtime connection closed");
            session.shutdown();
        }
        self.inner.flush_status_events();
    }

    /// Records one more interested controller. Returns the new count.
    pub fn retain(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.retain_count += 1;
        trace!(count = state.retain_count, "Connection retained");
        state.retain_count
    }

    /// Drops one interest. Releasing the last one disconnects.
    ///
    /// Returns the remaining count.
    pub fn release(&self) -> usize {
        self.release_where(None).unwrap_or(0)
    }

    /// Retains and returns the generation the interest belongs to.
    pub(crate) fn retain_tracked(&self) -> u64 {
        let mut state = self.inner.state.lock();
        state.retain_count += 1;
        trace!(count = state.retain_count, "Connection retained");
        state.interest_generation
    }

    /// Releases an interest taken with [`Self::retain_tracked`].
    ///
    /// Returns `None` if the count was reset since, in which case nothing
    /// is decremented.
    pub(crate) fn release_tracked(&self, generation: u64) -> Option<usize> {
        self.release_where(Some(generation))
    }

    /// Returns `true` if an interest of `generation` is still counted.
    pub(crate) fn interest_is_current(&self, generation: u64) -> bool {
        self.inner.state.lock().interest_generation == generation
    }

    fn release_where(&self, generation: Option<u64>) -> Option<usize> {
        let session = {
            let mut state = self.inner.state.lock();
            if generation.is_some_and(|g| g != state.interest_generation) {
                return None;
            }
            if state.retain_count == 0 {
                return Some(0);
            }
            state.retain_count -= 1;
            trace!(count = state.retain_count, "Connection released");
            if state.retain_count > 0 {
                return Some(state.retain_count);
            }
            state.reset(&self.inner.status_tx)
        };

        if let Some(session) = session {
            info!(connection_id = %session.connection_id, "Last interest released; connection closed");
            session.shutdown();
        }
        self.inner.flush_status_events();
        Some(0)
    }
}

// ============================================================================
// ConnectionRegistry - Messaging
// ============================================================================

impl ConnectionRegistry {
    /// Serializes and sends `payload`.
    ///
    /// Returns `false` without any I/O unless the status is `Connected`.
    /// Nothing is queued for later delivery.
    pub fn send_message<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        let state = self.inner.state.lock();
        let session = match (state.status, state.session.as_ref()) {
            (ConnectionStatus::Connected, Some(session)) => session,
            (status, _) => {
                warn!(error = %Error::send_while_disconnected(status), "Message not sent");
                return false;
            }
        };

        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Message not sent: serialization failed");
                return false;
            }
        };

        let sent = session.sender.send_text(text);
        trace!(connection_id = %session.connection_id, sent, "Message queued");
        sent
    }
}

// ============================================================================
// RegistryInner - Attempts
// ============================================================================

impl RegistryInner {
    /// Opens a link and completes the identification handshake.
    async fn establish(&self, params: &ConnectionParams) -> Result<Link> {
        let attempt = async {
            let mut link = self.connector.open(&self.url).await?;

            let frame = serde_json::to_string(&ClientFrame::Connect(params))?;
            if !link.send_text(frame) {
                return Err(Error::connect_failed("transport closed before handshake"));
            }

            loop {
                match link.recv().await {
                    Some(TransportEvent::Text(text)) => {
                        let message = match InboundMessage::from_text(&text) {
                            Ok(message) => message,
                            Err(e) => {
                                warn!(error = %e, "Ignoring unparseable frame during handshake");
                                continue;
                            }
                        };
                        match Control::classify(&message) {
                            Some(Control::Ack) => return Ok(link),
                            Some(Control::Rejected { reason }) => {
                                link.close();
                                return Err(Error::connect_failed(format!(
                                    "server rejected identification: {reason}"
                                )));
                            }
                            Some(Control::Pong) | None => {
                                trace!(feature = message.feature(), "Frame before handshake ack dropped");
                            }
                        }
                    }
                    Some(TransportEvent::Closed { reason }) => {
                        return Err(Error::connect_failed(format!(
                            "transport closed during handshake: {}",
                            reason.as_deref().unwrap_or("no reason")
                        )));
                    }
                    None => return Err(Error::ConnectionClosed),
                }
            }
        };

        timeout(self.config.connect_timeout, attempt)
            .await
            .map_err(|_| Error::connection_timeout(duration_millis(self.config.connect_timeout)))?
    }

    /// Installs an established link if the attempt is still current.
    fn install(self: &Arc<Self>, epoch: u64, connection_id: ConnectionId, link: Link) -> bool {
        let (sender, events) = link.split();

        {
            let mut state = self.state.lock();
            if state.epoch != epoch || state.session.is_some() {
                drop(state);
                debug!(%connection_id, "Discarding superseded connection");
                sender.close();
                return false;
            }

            let pump = Pump {
                registry: Arc::downgrade(self),
                connection_id: connection_id.clone(),
                sender: sender.clone(),
                dispatcher: self.dispatcher.clone(),
                heartbeat_interval: self.config.heartbeat_interval,
                heartbeat_max_missed: self.config.heartbeat_max_missed,
            };
            state.session = Some(LiveSession {
                connection_id: connection_id.clone(),
                sender,
                pump: tokio::spawn(pump.run(events)),
            });
            state.transition(ConnectionStatus::Connected, &self.status_tx);
        }

        info!(%connection_id, "Realtime connection established");
        self.flush_status_events();
        true
    }

    /// Records a failed explicit attempt and schedules retries.
    fn fail_attempt(self: &Arc<Self>, epoch: u64, error: &Error) {
        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return;
            }
            state.transition(ConnectionStatus::Error, &self.status_tx);
            if error.is_recoverable() && state.params.is_some() {
                state.reconnect = Some(tokio::spawn(reconnect_loop(Arc::downgrade(self), epoch)));
            }
        }
        self.flush_status_events();
    }

    /// Handles a link that died under a live session.
    fn on_connection_lost(self: &Arc<Self>, connection_id: &ConnectionId, cause: &Error) {
        let session = {
            let mut state = self.state.lock();
            let is_current = state
                .session
                .as_ref()
                .is_some_and(|s| &s.connection_id == connection_id);
            if !is_current {
                return;
            }

            let session = state.session.take();
            state.transition(ConnectionStatus::Connecting, &self.status_tx);
            state.cancel_reconnect();
            if state.params.is_some() {
                state.reconnect = Some(tokio::spawn(reconnect_loop(Arc::downgrade(self), state.epoch)));
            } else {
                state.transition(ConnectionStatus::Error, &self.status_tx);
            }
            session
        };

        warn!(%connection_id, error = %cause, "Realtime connection lost; reconnecting");
        if let Some(session) = session {
            // The pump calling us is the one being dropped; it exits on return.
            session.sender.close();
        }
        self.flush_status_events();
    }

    /// Delivers queued transitions to listeners, in order, from one caller at a time.
    fn flush_status_events(&self) {
        loop {
            if self.flushing.swap(true, Ordering::AcqRel) {
                return;
            }
            loop {
                let next = self.state.lock().pending.pop_front();
                let Some(change) = next else {
                    break;
                };
                self.listeners.notify(change);
            }
            self.flushing.store(false, Ordering::Release);
            if self.state.lock().pending.is_empty() {
                return;
            }
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_reconnect();
        if let Some(session) = state.session.take() {
            session.shutdown();
        }
    }
}

// ============================================================================
// Reconnect Loop
// ============================================================================

/// Retries with backoff until connected, superseded, or out of attempts.
async fn reconnect_loop(registry: Weak<RegistryInner>, epoch: u64) {
    let Some(policy) = registry.upgrade().map(|inner| inner.config.backoff.clone()) else {
        return;
    };

    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_for(attempt);
        debug!(attempt, delay_ms = duration_millis(delay), "Reconnect scheduled");
        sleep(delay).await;

        let Some(inner) = registry.upgrade() else {
            return;
        };

        let refreshed = match &inner.auth {
            Some(auth) => auth.valid_token().await,
            None => None,
        };

        let params = {
            let mut state = inner.state.lock();
            if state.epoch != epoch || state.session.is_some() {
                return;
            }
            let Some(mut params) = state.params.as_ref().map(ConnectionParams::for_retry) else {
                return;
            };
            if refreshed.is_some() {
                params.token = refreshed;
            }
            state.params = Some(params.clone());
            state.transition(ConnectionStatus::Connecting, &inner.status_tx);
            params
        };
        inner.flush_status_events();

        match inner.establish(&params).await {
            Ok(link) => {
                if inner.install(epoch, params.connection_id.clone(), link) {
                    info!(attempt, connection_id = %params.connection_id, "Reconnected");
                }
                return;
            }
            Err(e) => {
                warn!(attempt, connection_id = %params.connection_id, error = %e, "Reconnect attempt failed");
                {
                    let mut state = inner.state.lock();
                    if state.epoch != epoch {
                        return;
                    }
                    state.transition(ConnectionStatus::Error, &inner.status_tx);
                }
                inner.flush_status_events();
                if !e.is_recoverable() {
                    return;
                }
            }
        }
    }

    warn!(
        attempts = policy.max_attempts,
        "Reconnect attempts exhausted; waiting for an explicit connect"
    );
}

/// Converts a duration to whole milliseconds for logs and errors.
fn duration_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::protocol::UserType;
    use crate::session::{CurrentUser, StaticSession};
    use crate::transport::MemoryConnector;

    fn registry(connector: &MemoryConnector) -> ConnectionRegistry {
        ConnectionRegistry::builder()
            .url("ws://memory.test/ws")
            .connector(connector.clone())
            .connect_timeout(Duration::from_millis(200))
            .heartbeat(Duration::from_secs(60), 2)
            .backoff(BackoffPolicy::fixed(
                Duration::from_millis(10),
                Duration::from_millis(40),
                3,
            ))
            .build()
            .unwrap()
    }

    fn params() -> ConnectionParams {
        ConnectionParams::new(
            "42",
            Some("token".into()),
            UserType::Consultant,
            ConnectionId::generate("chat", "/chat"),
        )
    }

    #[tokio::test]
    async fn test_connect_establishes() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);

        let outcome = registry.connect(params()).await.unwrap();

        assert!(outcome.is_established());
        assert!(registry.is_connected());
        assert_eq!(registry.connection_id().as_ref(), Some(outcome.connection_id()));
        assert_eq!(connector.handshakes().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let first = registry.connect(params()).await.unwrap();

        let second = registry.connect(params()).await.unwrap();

        assert_eq!(
            second,
            ConnectOutcome::AlreadyConnected(first.connection_id().clone())
        );
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_rejected_handshake_sets_error() {
        let connector = MemoryConnector::new();
        connector.reject_handshakes(Some("token expired"));
        let registry = registry(&connector);

        let err = registry.connect(params()).await.unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::ConnectFailed);
        assert!(err.to_string().contains("token expired"));
        assert_eq!(registry.connection_status(), ConnectionStatus::Error);
        registry.disconnect();
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let connector = MemoryConnector::new();
        connector.set_auto_ack(false);
        let registry = registry(&connector);

        let err = registry.connect(params()).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(registry.connection_status(), ConnectionStatus::Error);
        registry.disconnect();
        assert_eq!(registry.connection_status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);

        registry.disconnect();
        registry.disconnect();
        assert_eq!(registry.connection_status(), ConnectionStatus::Disconnected);

        registry.connect(params()).await.unwrap();
        registry.disconnect();
        registry.disconnect();
        assert_eq!(registry.connection_status(), ConnectionStatus::Disconnected);
        assert!(registry.connection_id().is_none());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let payload = serde_json::json!({ "type": "chat_message" });

        assert!(!registry.send_message(&payload));

        registry.connect(params()).await.unwrap();
        assert!(registry.send_message(&payload));
    }

    #[tokio::test]
    async fn test_release_last_interest_disconnects() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        registry.connect(params()).await.unwrap();

        assert_eq!(registry.retain(), 1);
        assert_eq!(registry.retain(), 2);
        assert_eq!(registry.release(), 1);
        assert!(registry.is_connected());
        assert_eq!(registry.release(), 0);
        assert_eq!(registry.connection_status(), ConnectionStatus::Disconnected);
        assert_eq!(registry.release(), 0);
    }

    #[tokio::test]
    async fn test_listener_sees_ordered_transitions() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.add_connection_status_listener(move |change| sink.lock().push(change.current));

        registry.connect(params()).await.unwrap();
        registry.disconnect();

        assert_eq!(
            *seen.lock(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnected
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_refreshes_token() {
        let connector = MemoryConnector::new();
        connector.reject_handshakes(Some("expired"));
        let session = Arc::new(StaticSession::signed_in(
            CurrentUser::new("42", "consultant"),
            "stale",
        ));
        let registry = ConnectionRegistry::builder()
            .url("ws://memory.test/ws")
            .connector(connector.clone())
            .connect_timeout(Duration::from_millis(200))
            .heartbeat(Duration::from_secs(60), 2)
            .backoff(BackoffPolicy::fixed(
                Duration::from_millis(10),
                Duration::from_millis(40),
                3,
            ))
            .auth(session.clone())
            .build()
            .unwrap();

        assert!(registry.connect(params()).await.is_err());
        session.set_token(Some("fresh".into()));
        connector.reject_handshakes(None);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !registry.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let handshakes = connector.handshakes();
        assert_eq!(handshakes[0]["token"], "token");
        assert_eq!(handshakes.last().unwrap()["token"], "fresh");
    }
}
