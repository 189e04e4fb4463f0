//! Builder pattern for registry configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionRegistry`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use consult_realtime::ConnectionRegistry;
//!
//! # fn example() -> consult_realtime::Result<()> {
//! let registry = ConnectionRegistry::builder()
//!     .url("wss://consult.example.com/ws")
//!     .connect_timeout(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::MessageDispatcher;
use crate::error::Result;
use crate::session::AuthProvider;
use crate::transport::{Connector, WsConnector};

use super::ConnectionRegistry;
use super::backoff::BackoffPolicy;
use super::config::RegistryConfig;

// ============================================================================
// RegistryBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionRegistry`].
///
/// Use [`ConnectionRegistry::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct RegistryBuilder {
    /// Accumulated settings.
    config: RegistryConfig,
    /// Transport factory; defaults to [`WsConnector`].
    connector: Option<Arc<dyn Connector>>,
    /// Shared dispatcher; a fresh one is created when unset.
    dispatcher: Option<MessageDispatcher>,
    /// Token source for background retries.
    auth: Option<Arc<dyn AuthProvider>>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("config", &self.config)
            .field("custom_connector", &self.connector.is_some())
            .field("token_refresh", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RegistryBuilder Implementation
// ============================================================================

impl RegistryBuilder {
    /// Creates a builder with default settings and no URL.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all settings at once, e.g. with a loaded [`RegistryConfig`].
    #[inline]
    #[must_use]
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the WebSocket endpoint.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Sets the bound on one connect attempt.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the heartbeat period and the unanswered-ping tolerance.
    #[inline]
    #[must_use]
    pub fn heartbeat(mut self, interval: Duration, max_missed: u32) -> Self {
        self.config.heartbeat_interval = interval;
        self.config.heartbeat_max_missed = max_missed;
        self
    }

    /// Sets the reconnect schedule.
    #[inline]
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Sets the transport factory.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Uses an existing dispatcher instead of creating one.
    #[inline]
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: MessageDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Refreshes the handshake token from `auth` before each background retry.
    ///
    /// Without it, retries resend the token of the last explicit connect.
    #[inline]
    #[must_use]
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Builds the registry with validation.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Config`] if the URL is missing, not `ws`/`wss`, or a limit is zero
    /// - [`crate::Error::Url`] if the URL does not parse
    pub fn build(self) -> Result<ConnectionRegistry> {
        let url = self.config.validate()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector));
        let dispatcher = self.dispatcher.unwrap_or_default();

        Ok(ConnectionRegistry::new(
            self.config,
            url,
            connector,
            dispatcher,
            self.auth,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
