//! Registry configuration.
//!
//! Durations are (de)serialized as integer milliseconds:
//!
//! ```json
//! {
//!   "url": "wss://consult.example.com/ws",
//!   "connect_timeout_ms": 10000,
//!   "heartbeat_interval_ms": 25000,
//!   "heartbeat_max_missed": 2,
//!   "backoff": { "base_delay_ms": 1000, "max_delay_ms": 30000, "max_attempts": 5, "jitter": true }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

use super::backoff::BackoffPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default bound on one connect attempt (open + handshake).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default heartbeat period.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Default number of unanswered pings tolerated.
const DEFAULT_HEARTBEAT_MAX_MISSED: u32 = 2;

// ============================================================================
// RegistryConfig
// ============================================================================

/// Settings for a [`super::ConnectionRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Bound on one connect attempt.
    #[serde(with = "duration_ms", rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,
    /// Period between heartbeat pings.
    #[serde(with = "duration_ms", rename = "heartbeat_interval_ms")]
    pub heartbeat_interval: Duration,
    /// Unanswered pings tolerated before the link is declared dead.
    pub heartbeat_max_missed: u32,
    /// Reconnect schedule.
    pub backoff: BackoffPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_max_missed: DEFAULT_HEARTBEAT_MAX_MISSED,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Checks the configuration and returns the parsed endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL is missing, not `ws`/`wss`, or a limit is zero
    /// - [`Error::Url`] if the URL does not parse
    pub fn validate(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(Error::config(
                "Realtime endpoint URL is required. Use .url() to set it.\n\
                 Example: ConnectionRegistry::builder().url(\"wss://consult.example.com/ws\")",
            ));
        }

        let url = Url::parse(self.url.trim())?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Realtime endpoint must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("heartbeat_interval must be greater than zero"));
        }
        if self.heartbeat_max_missed == 0 {
            return Err(Error::config("heartbeat_max_missed must be at least 1"));
        }
        if self.backoff.max_delay < self.backoff.base_delay {
            return Err(Error::config("backoff max_delay must not be below base_delay"));
        }

        Ok(url)
    }
}

// ============================================================================
// Duration Serde
// ============================================================================

/// Serializes a [`Duration`] as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
