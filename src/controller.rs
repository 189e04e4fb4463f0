//! Per-page connection orchestration.
//!
//! A [`PageConnectionController`] is created when a page mounts. It resolves
//! the page's policy, decides whether the shared connection should exist,
//! and mirrors the registry's status for the page.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──evaluate──► Evaluating ─┬─► Connecting ──► Connected
//!                                ├─► AlreadyConnected (adopted)
//!                                └─► Disconnecting ──► Idle
//! any ──unmount──► Unmounted
//! ```
//!
//! Interest in the connection is counted by the registry. A controller
//! retains before it connects or adopts, and releases when its policy or
//! auth no longer allows a connection, or when it unmounts. The transport
//! closes only when the last interest is released.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatch::FeatureFilter;
use crate::error::{Error, ErrorKind, Result};
use crate::identifiers::{ConnectionId, HandlerId, ListenerId};
use crate::policy::{PageWebSocketConfig, PolicyTable};
use crate::protocol::{ConnectionParams, InboundMessage, OutboundEnvelope, UserType};
use crate::registry::{ConnectionRegistry, ConnectionStatus, StatusChange};
use crate::session::{AuthProvider, CurrentUser, DeviceProvider};

// ============================================================================
// ConnectionDecision
// ============================================================================

/// Whether a page should hold the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionDecision {
    /// The page wants a live connection.
    pub should_connect: bool,
    /// The page must not hold the connection.
    pub should_disconnect: bool,
}

impl ConnectionDecision {
    /// Derives the decision from policy and auth state.
    #[must_use]
    pub fn evaluate(config: &PageWebSocketConfig, has_user: bool, has_token: bool) -> Self {
        let authed = has_user && has_token;
        Self {
            should_connect: config.enabled
                && config.auto_connect
                && (!config.require_auth || authed),
            should_disconnect: !config.enabled
                || !config.auto_connect
                || (config.require_auth && !authed),
        }
    }
}

// ============================================================================
// ControllerPhase / Evaluation
// ============================================================================

/// What the controller last did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerPhase {
    /// Policy resolved, no action taken.
    #[default]
    Idle,
    /// Re-deriving the decision.
    Evaluating,
    /// Waiting for `connect` to finish.
    Connecting,
    /// Using a connection another page opened.
    AlreadyConnected,
    /// Holding a connection this controller connected.
    Connected,
    /// Releasing its interest.
    Disconnecting,
    /// Torn down.
    Unmounted,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Holding a live connection.
    Connected(ConnectionId),
    /// Started using a live connection opened elsewhere.
    Adopted(ConnectionId),
    /// Another evaluation on this controller is already connecting.
    InFlight,
    /// Interest released; `remaining` controllers still hold it.
    Released {
        /// Interests left after the release.
        remaining: usize,
    },
    /// Nothing to do.
    Idle,
    /// The connect attempt failed; the registry retries in the background.
    Failed(ErrorKind),
    /// A newer navigation replaced this evaluation.
    Superseded,
    /// The controller has been unmounted.
    Unmounted,
}

// ============================================================================
// PageState
// ============================================================================

/// Page-local state shared with the handler and listener closures.
#[derive(Debug)]
struct PageState {
    path: String,
    config: PageWebSocketConfig,
    phase: ControllerPhase,
    status: ConnectionStatus,
    last_message: Option<InboundMessage>,
    /// Set while this controller awaits `connect`.
    connecting: bool,
    /// Generation of the interest held in the registry.
    interest: Option<u64>,
    /// Id of the connection this controller opened.
    initiated: Option<ConnectionId>,
    /// Bumped on navigation so stale evaluations stop.
    revision: u64,
    unmounted: bool,
}

// ============================================================================
// PageConnectionController
// ============================================================================

/// Keeps the shared connection in line with one page's policy.
///
/// # Example
///
/// ```ignore
/// let controller = PageConnectionController::new(
///     registry.clone(),
///     Arc::new(PolicyTable::consultation()),
///     session.clone(),
///     Arc::new(device),
///     "/chat/12",
/// );
/// controller.evaluate().await;
/// controller.send_message(json!({ "type": "chat_message", "content": "hi" }));
/// ```
pub struct PageConnectionController {
    registry: ConnectionRegistry,
    policies: Arc<PolicyTable>,
    auth: Arc<dyn AuthProvider>,
    device: Arc<dyn DeviceProvider>,
    state: Arc<Mutex<PageState>>,
    handler_id: HandlerId,
    listener_id: ListenerId,
}

impl fmt::Debug for PageConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PageConnectionController")
            .field("path", &state.path)
            .field("phase", &state.phase)
            .field("status", &state.status)
            .field("handler_id", &self.handler_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PageConnectionController - Constructor
// ============================================================================

impl PageConnectionController {
    /// Mounts a controller for `path`.
    ///
    /// Registers a wildcard handler feeding [`Self::last_message`] and a
    /// status listener feeding [`Self::connection_status`]. No connection is
    /// attempted until [`Self::evaluate`] runs.
    pub fn new(
        registry: ConnectionRegistry,
        policies: Arc<PolicyTable>,
        auth: Arc<dyn AuthProvider>,
        device: Arc<dyn DeviceProvider>,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let config = policies.resolve(&path).clone();
        let handler_id = HandlerId::unique(&format!("page_{}", config.connection_type));

        let state = Arc::new(Mutex::new(PageState {
            path,
            config,
            phase: ControllerPhase::Idle,
            status: registry.connection_status(),
            last_message: None,
            connecting: false,
            interest: None,
            initiated: None,
            revision: 0,
            unmounted: false,
        }));

        let weak = Arc::downgrade(&state);
        registry.dispatcher().register_handler(
            handler_id.clone(),
            FeatureFilter::All,
            move |message| {
                if let Some(state) = weak.upgrade() {
                    state.lock().last_message = Some(message.clone());
                }
                Ok(true)
            },
        );

        let weak: Weak<Mutex<PageState>> = Arc::downgrade(&state);
        let listener_id = registry.add_connection_status_listener(move |change: StatusChange| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.lock();
            state.status = change.current;
            if change.current == ConnectionStatus::Disconnected && !state.unmounted && !state.connecting {
                state.phase = ControllerPhase::Idle;
                state.initiated = None;
            }
        });

        debug!(%handler_id, "Page controller mounted");

        Self {
            registry,
            policies,
            auth,
            device,
            state,
            handler_id,
            listener_id,
        }
    }
}

// ============================================================================
// PageConnectionController - Inputs
// ============================================================================

impl PageConnectionController {
    /// Switches to `path` and re-evaluates.
    pub async fn navigate(&self, path: impl Into<String>) -> Evaluation {
        {
            let mut state = self.state.lock();
            if state.unmounted {
                return Evaluation::Unmounted;
            }
            state.path = path.into();
            state.config = self.policies.resolve(&state.path).clone();
            state.revision += 1;
            debug!(path = %state.path, connection_type = %state.config.connection_type, "Page navigated");
        }
        self.evaluate().await
    }

    /// Re-evaluates after sign-in, sign-out, or token refresh.
    pub async fn auth_changed(&self) -> Evaluation {
        self.evaluate().await
    }

    /// Re-derives the decision and acts on it.
    ///
    /// Never returns an error; connect failures surface as
    /// [`Evaluation::Failed`] and status `Error`.
    pub async fn evaluate(&self) -> Evaluation {
        let (config, revision) = {
            let mut state = self.state.lock();
            if state.unmounted {
                return Evaluation::Unmounted;
            }
            state.phase = ControllerPhase::Evaluating;
            (state.config.clone(), state.revision)
        };

        let user = self.auth.current_user();
        let token = if config.enabled && config.auto_connect && user.is_some() {
            self.auth.valid_token().await
        } else {
            None
        };

        let decision = ConnectionDecision::evaluate(&config, user.is_some(), token.is_some());
        if decision.should_connect {
            match self.ensure_connected(revision, user, token).await {
                Ok(evaluation) => evaluation,
                Err(e) => Evaluation::Failed(e.kind()),
            }
        } else {
            if config.require_auth && user.is_none() {
                debug!(error = %Error::AuthUnavailable, "Not connecting");
            }
            self.release_interest()
        }
    }
}

// ============================================================================
// PageConnectionController - Manual Control
// ============================================================================

impl PageConnectionController {
    /// Connects regardless of `auto_connect`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the page's policy is disabled
    /// - [`Error::AuthUnavailable`] if auth is required and missing
    /// - the registry's connect error if the attempt fails
    pub async fn connect(&self) -> Result<Evaluation> {
        let (config, revision) = {
            let state = self.state.lock();
            if state.unmounted {
                return Ok(Evaluation::Unmounted);
            }
            (state.config.clone(), state.revision)
        };

        if !config.enabled {
            return Err(Error::config(format!(
                "realtime is disabled for connection type {:?}",
                config.connection_type
            )));
        }

        let user = self.auth.current_user();
        let token = match user {
            Some(_) => self.auth.valid_token().await,
            None => None,
        };
        if config.require_auth && (user.is_none() || token.is_none()) {
            return Err(Error::AuthUnavailable);
        }

        self.ensure_connected(revision, user, token).await
    }

    /// Releases this page's interest in the connection.
    ///
    /// The transport stays open while another controller holds it.
    pub fn disconnect(&self) -> Evaluation {
        self.release_interest()
    }

    /// Wraps `payload` with page metadata and sends it.
    ///
    /// Returns `false` with a warning unless connected.
    pub fn send_message(&self, payload: Value) -> bool {
        let envelope = {
            let state = self.state.lock();
            OutboundEnvelope::new(
                payload,
                state.path.clone(),
                state.config.connection_type.clone(),
                state.config.features.clone(),
            )
        };
        self.registry.send_message(&envelope)
    }

    /// Unregisters the handler and listener and releases any interest.
    ///
    /// Idempotent; also runs on drop.
    pub fn unmount(&self) {
        let interest = {
            let mut state = self.state.lock();
            if state.unmounted {
                return;
            }
            state.unmounted = true;
            state.phase = ControllerPhase::Unmounted;
            state.initiated = None;
            state.interest.take()
        };

        self.registry.dispatcher().unregister_handler(&self.handler_id);
        self.registry.remove_connection_status_listener(self.listener_id);
        if let Some(generation) = interest {
            let remaining = self.registry.release_tracked(generation);
            debug!(handler_id = %self.handler_id, ?remaining, "Page controller unmounted");
        }
    }
}

// ============================================================================
// PageConnectionController - Internals
// ============================================================================

impl PageConnectionController {
    /// Adopts the live connection or opens one.
    async fn ensure_connected(
        &self,
        revision: u64,
        user: Option<CurrentUser>,
        token: Option<String>,
    ) -> Result<Evaluation> {
        let params = {
            let mut state = self.state.lock();
            if state.unmounted {
                return Ok(Evaluation::Unmounted);
            }
            if state.revision != revision {
                return Ok(Evaluation::Superseded);
            }
            if state
                .interest
                .is_some_and(|g| !self.registry.interest_is_current(g))
            {
                state.interest = None;
                state.initiated = None;
            }
            if state.connecting {
                return Ok(Evaluation::InFlight);
            }

            if self.registry.is_connected()
                && let Some(id) = self.registry.connection_id()
            {
                state.status = ConnectionStatus::Connected;
                if state.interest.is_some() {
                    return Ok(Evaluation::Connected(id));
                }
                state.interest = Some(self.registry.retain_tracked());
                state.phase = ControllerPhase::AlreadyConnected;
                debug!(connection_id = %id, path = %state.path, "Adopted shared connection");
                return Ok(Evaluation::Adopted(id));
            }

            state.connecting = true;
            state.phase = ControllerPhase::Connecting;
            if state.interest.is_none() {
                state.interest = Some(self.registry.retain_tracked());
            }

            let (user_id, user_type) = user.map_or_else(
                || ("anonymous".to_string(), UserType::User),
                |u| {
                    let user_type = u.user_type();
                    (u.id, user_type)
                },
            );
            ConnectionParams::new(
                user_id,
                token,
                user_type,
                ConnectionId::generate(&state.config.connection_type, &state.path),
            )
            .with_device(&self.device.device_info())
        };

        let result = self.registry.connect(params).await;

        let mut state = self.state.lock();
        state.connecting = false;
        if state.unmounted {
            return Ok(Evaluation::Unmounted);
        }

        match result {
            Ok(outcome) => {
                let id = outcome.connection_id().clone();
                if outcome.is_established() {
                    state.initiated = Some(id.clone());
                    state.phase = ControllerPhase::Connected;
                } else {
                    state.phase = ControllerPhase::AlreadyConnected;
                }
                state.status = self.registry.connection_status();
                info!(connection_id = %id, path = %state.path, "Page connected");
                Ok(Evaluation::Connected(id))
            }
            Err(e) => {
                state.phase = ControllerPhase::Idle;
                state.status = self.registry.connection_status();
                warn!(path = %state.path, error = %e, "Page connect failed; registry will retry");
                Err(e)
            }
        }
    }

    /// Drops this page's interest, if it holds one.
    fn release_interest(&self) -> Evaluation {
        let interest = {
            let mut state = self.state.lock();
            if state.unmounted {
                return Evaluation::Unmounted;
            }
            state.initiated = None;
            match state.interest.take() {
                Some(generation) => {
                    state.phase = ControllerPhase::Disconnecting;
                    generation
                }
                None => {
                    state.phase = ControllerPhase::Idle;
                    return Evaluation::Idle;
                }
            }
        };

        let remaining = self.registry.release_tracked(interest);

        let mut state = self.state.lock();
        if !state.unmounted {
            state.phase = ControllerPhase::Idle;
        }
        match remaining {
            Some(remaining) => {
                debug!(path = %state.path, remaining, "Released connection interest");
                Evaluation::Released { remaining }
            }
            None => Evaluation::Idle,
        }
    }
}

// ============================================================================
// PageConnectionController - Accessors
// ============================================================================

impl PageConnectionController {
    /// Returns `true` if the mirrored status is `Connected`.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_status() == ConnectionStatus::Connected
    }

    /// Returns the mirrored status.
    #[inline]
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    /// Returns whether the page's policy enables realtime.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().config.enabled
    }

    /// Returns the page's connection type label.
    #[must_use]
    pub fn connection_type(&self) -> String {
        self.state.lock().config.connection_type.clone()
    }

    /// Returns the features the page handles.
    #[must_use]
    pub fn supported_features(&self) -> Vec<String> {
        self.state.lock().config.features.clone()
    }

    /// Returns the last message delivered to this page.
    #[must_use]
    pub fn last_message(&self) -> Option<InboundMessage> {
        self.state.lock().last_message.clone()
    }

    /// Returns the current route.
    #[must_use]
    pub fn path(&self) -> String {
        self.state.lock().path.clone()
    }

    /// Returns what the controller last did.
    #[must_use]
    pub fn phase(&self) -> ControllerPhase {
        self.state.lock().phase
    }

    /// Returns the id of the connection this controller opened, if any.
    #[must_use]
    pub fn initiated_connection_id(&self) -> Option<ConnectionId> {
        self.state.lock().initiated.clone()
    }

    /// Returns `true` if the live connection was opened by this controller.
    #[must_use]
    pub fn owns_connection(&self) -> bool {
        let initiated = self.initiated_connection_id();
        initiated.is_some() && initiated == self.registry.connection_id()
    }

    /// Returns `true` if this controller is counted by the registry.
    #[must_use]
    pub fn holds_interest(&self) -> bool {
        self.state
            .lock()
            .interest
            .is_some_and(|g| self.registry.interest_is_current(g))
    }

    /// Returns the handler id registered for this page.
    #[inline]
    #[must_use]
    pub fn handler_id(&self) -> &HandlerId {
        &self.handler_id
    }
}

impl Drop for PageConnectionController {
    fn drop(&mut self) {
        self.unmount();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::protocol::DeviceInfo;
    use crate::registry::BackoffPolicy;
    use crate::session::StaticSession;
    use crate::transport::MemoryConnector;

    fn registry(connector: &MemoryConnector) -> ConnectionRegistry {
        ConnectionRegistry::builder()
            .url("ws://memory.test/ws")
            .connector(connector.clone())
            .connect_timeout(Duration::from_millis(200))
            .backoff(BackoffPolicy::fixed(
                Duration::from_millis(10),
                Duration::from_millis(40),
                2,
            ))
            .build()
            .unwrap()
    }

    fn controller(
        registry: &ConnectionRegistry,
        session: &Arc<StaticSession>,
        path: &str,
    ) -> PageConnectionController {
        PageConnectionController::new(
            registry.clone(),
            Arc::new(PolicyTable::consultation()),
            session.clone(),
            Arc::new(DeviceInfo::default()),
            path,
        )
    }

    fn signed_in() -> Arc<StaticSession> {
        Arc::new(StaticSession::signed_in(
            CurrentUser::new("42", "consultant"),
            "token",
        ))
    }

    #[test]
    fn test_decision_table() {
        let chat = PageWebSocketConfig::new("chat");
        let d = ConnectionDecision::evaluate(&chat, true, true);
        assert!(d.should_connect && !d.should_disconnect);

        let d = ConnectionDecision::evaluate(&chat, true, false);
        assert!(!d.should_connect && d.should_disconnect);

        let open = PageWebSocketConfig::new("tasks").with_require_auth(false);
        assert!(ConnectionDecision::evaluate(&open, false, false).should_connect);

        let manual = PageWebSocketConfig::new("admin").with_auto_connect(false);
        assert!(ConnectionDecision::evaluate(&manual, true, true).should_disconnect);

        let off = PageWebSocketConfig::disabled();
        assert!(ConnectionDecision::evaluate(&off, true, true).should_disconnect);
    }

    #[tokio::test]
    async fn test_evaluate_connects_and_retains() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let page = controller(&registry, &signed_in(), "/chat/1");

        let evaluation = page.evaluate().await;

        assert!(matches!(evaluation, Evaluation::Connected(_)));
        assert!(page.is_connected());
        assert!(page.owns_connection());
        assert_eq!(page.phase(), ControllerPhase::Connected);
        assert_eq!(registry.retain_count(), 1);

        let handshake = &connector.handshakes()[0];
        assert_eq!(handshake["userType"], "consultant");
        let id = handshake["connectionId"].as_str().unwrap();
        assert!(id.starts_with("chat_chat_1_"));
    }

    #[tokio::test]
    async fn test_unauthenticated_page_stays_idle() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let page = controller(&registry, &Arc::new(StaticSession::new()), "/chat");

        assert_eq!(page.evaluate().await, Evaluation::Idle);
        assert_eq!(page.connection_status(), ConnectionStatus::Disconnected);
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_second_page_adopts() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let session = signed_in();
        let a = controller(&registry, &session, "/chat");
        let b = controller(&registry, &session, "/consultant/queue");

        let Evaluation::Connected(id) = a.evaluate().await else {
            panic!("page A did not connect");
        };
        assert_eq!(b.evaluate().await, Evaluation::Adopted(id));
        assert!(b.is_connected());
        assert!(!b.owns_connection());
        assert_eq!(b.phase(), ControllerPhase::AlreadyConnected);
        assert_eq!(connector.opened(), 1);
        assert_eq!(registry.retain_count(), 2);
    }

    #[tokio::test]
    async fn test_unmount_keeps_connection_for_other_page() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let session = signed_in();
        let a = controller(&registry, &session, "/chat");
        let b = controller(&registry, &session, "/chat/2");
        a.evaluate().await;
        b.evaluate().await;

        drop(a);
        assert!(registry.is_connected());
        assert_eq!(registry.retain_count(), 1);

        b.unmount();
        b.unmount();
        assert_eq!(registry.connection_status(), ConnectionStatus::Disconnected);
        assert_eq!(registry.dispatcher().handler_count(), 0);
    }

    #[tokio::test]
    async fn test_navigate_to_disabled_route_releases() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let page = controller(&registry, &signed_in(), "/chat");
        page.evaluate().await;

        let evaluation = page.navigate("/profile").await;

        assert_eq!(evaluation, Evaluation::Released { remaining: 0 });
        assert!(!page.is_enabled());
        assert_eq!(page.connection_type(), "none");
        assert_eq!(page.connection_status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_manual_connect_errors() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);

        let disabled = controller(&registry, &signed_in(), "/login");
        assert!(matches!(disabled.connect().await, Err(Error::Config { .. })));

        let anonymous = controller(&registry, &Arc::new(StaticSession::new()), "/admin");
        assert!(matches!(anonymous.connect().await, Err(Error::AuthUnavailable)));

        let admin = controller(&registry, &signed_in(), "/admin");
        assert_eq!(admin.evaluate().await, Evaluation::Idle);
        assert!(matches!(admin.connect().await, Ok(Evaluation::Connected(_))));
    }

    #[tokio::test]
    async fn test_send_message_wraps_envelope() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let page = controller(&registry, &signed_in(), "/chat/9");

        assert!(!page.send_message(json!({ "type": "typing" })));

        page.evaluate().await;
        assert!(page.send_message(json!({ "type": "typing" })));

        tokio::time::timeout(Duration::from_secs(1), async {
            while connector.received().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let sent = &connector.received()[0];
        assert_eq!(sent["type"], "typing");
        assert_eq!(sent["source_page"], "/chat/9");
        assert_eq!(sent["connection_type"], "chat");
        assert_eq!(sent["features"][0], "messaging");
        assert!(sent["timestamp"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_last_message_mirrors_wildcard_handler() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let page = controller(&registry, &signed_in(), "/chat");
        page.evaluate().await;

        connector.push(&json!({ "type": "new_message", "feature": "messaging", "content": "hi" }));

        tokio::time::timeout(Duration::from_secs(1), async {
            while page.last_message().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let message = page.last_message().unwrap();
        assert_eq!(message.feature(), "messaging");
        assert_eq!(message.get_str("content"), Some("hi"));
    }

    #[tokio::test]
    async fn test_last_message_includes_features_outside_route() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let page = controller(&registry, &signed_in(), "/chat");
        page.evaluate().await;
        assert!(!page.supported_features().iter().any(|f| f == "system_status"));

        connector.push(&json!({ "type": "maintenance", "feature": "system_status" }));

        tokio::time::timeout(Duration::from_secs(1), async {
            while page.last_message().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(page.last_message().unwrap().feature(), "system_status");
    }

    #[tokio::test]
    async fn test_sign_out_releases_interest() {
        let connector = MemoryConnector::new();
        let registry = registry(&connector);
        let session = signed_in();
        let page = controller(&registry, &session, "/chat");
        page.evaluate().await;

        session.sign_out();
        assert_eq!(page.auth_changed().await, Evaluation::Released { remaining: 0 });
        assert!(!page.holds_interest());
        assert!(page.initiated_connection_id().is_none());
    }
}
