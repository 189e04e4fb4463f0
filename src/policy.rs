//! Route-to-connection policy.
//!
//! A [`PolicyTable`] maps route prefixes to [`PageWebSocketConfig`] values
//! with an explicit default. Resolution is pure:
//!
//! 1. exact match on the normalized path
//! 2. longest prefix that ends on a `/` segment boundary
//! 3. the default
//!
//! # Example
//!
//! ```
//! use consult_realtime::PolicyTable;
//!
//! let table = PolicyTable::consultation();
//! assert!(table.resolve("/chat/room-9?tab=files").enabled);
//! assert!(!table.resolve("/profile").enabled);
//! assert!(!table.resolve("/chatter").enabled);
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Key of the fallback entry in a JSON policy document.
const DEFAULT_KEY: &str = "default";

// ============================================================================
// PageWebSocketConfig
// ============================================================================

/// Connection policy for one route prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWebSocketConfig {
    /// Whether the page uses realtime at all.
    pub enabled: bool,
    /// Whether a user and token are required.
    #[serde(default)]
    pub require_auth: bool,
    /// Whether the controller connects without a manual `connect()`.
    #[serde(default)]
    pub auto_connect: bool,
    /// Label sent with outbound messages and used in connection ids.
    pub connection_type: String,
    /// Features the page handles.
    #[serde(default)]
    pub features: Vec<String>,
}

impl PageWebSocketConfig {
    /// A policy that never connects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            require_auth: false,
            auto_connect: false,
            connection_type: "none".to_string(),
            features: Vec::new(),
        }
    }

    /// An enabled, authenticated, auto-connecting policy with no features.
    #[must_use]
    pub fn new(connection_type: impl Into<String>) -> Self {
        Self {
            enabled: true,
            require_auth: true,
            auto_connect: true,
            connection_type: connection_type.into(),
            features: Vec::new(),
        }
    }

    /// Sets the feature list.
    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Sets `auto_connect`.
    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Sets `require_auth`.
    #[must_use]
    pub fn with_require_auth(mut self, require_auth: bool) -> Self {
        self.require_auth = require_auth;
        self
    }

    /// Disables the policy, keeping its label.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for PageWebSocketConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

// ============================================================================
// PolicyTable
// ============================================================================

/// Ordered route prefixes with an explicit fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyTable {
    routes: Vec<(String, PageWebSocketConfig)>,
    default: PageWebSocketConfig,
}

impl PolicyTable {
    /// Creates an empty table with `default` as the fallback.
    #[must_use]
    pub fn new(default: PageWebSocketConfig) -> Self {
        Self {
            routes: Vec::new(),
            default,
        }
    }

    /// Starts a table builder with a disabled fallback.
    #[inline]
    #[must_use]
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// Adds or replaces the entry for `prefix`.
    #[must_use]
    pub fn with_route(mut self, prefix: &str, config: PageWebSocketConfig) -> Self {
        self.insert(prefix, config);
        self
    }

    fn insert(&mut self, prefix: &str, config: PageWebSocketConfig) {
        let prefix = normalize(prefix).to_string();
        match self.routes.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = config,
            None => self.routes.push((prefix, config)),
        }
    }

    /// The consultation platform's routes.
    #[must_use]
    pub fn consultation() -> Self {
        let chat = PageWebSocketConfig::new("chat").with_features([
            "messaging",
            "typing_indicator",
            "read_receipt",
            "online_status",
            "file_transfer",
        ]);
        let live = ["messaging", "typing_indicator", "online_status", "notifications"];

        Self::new(PageWebSocketConfig::disabled())
            .with_route("/chat", chat)
            .with_route(
                "/consultant",
                PageWebSocketConfig::new("consultant").with_features(live),
            )
            .with_route(
                "/doctor",
                PageWebSocketConfig::new("doctor").with_features(live),
            )
            .with_route(
                "/admin",
                PageWebSocketConfig::new("admin")
                    .with_auto_connect(false)
                    .with_features(["notifications", "system_status"]),
            )
            .with_route(
                "/tasks",
                PageWebSocketConfig::new("tasks").with_features(["notifications", "task_update"]),
            )
            .with_route(
                "/plans",
                PageWebSocketConfig::new("plans")
                    .with_auto_connect(false)
                    .with_features(["notifications"]),
            )
            .with_route("/profile", PageWebSocketConfig::disabled())
            .with_route("/login", PageWebSocketConfig::disabled())
            .with_route("/register", PageWebSocketConfig::disabled())
    }

    /// Parses an object keyed by route prefix, with an optional `default` entry.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document or an entry is malformed
    /// - [`Error::Config`] if the document is not an object or a key is not a path
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Map<String, Value> = match serde_json::from_str(json)? {
            Value::Object(map) => map,
            _ => return Err(Error::config("policy table must be a JSON object")),
        };

        let mut table = Self::default();
        for (key, value) in document {
            let config: PageWebSocketConfig = serde_json::from_value(value)?;
            if key == DEFAULT_KEY {
                table.default = config;
            } else if key.starts_with('/') {
                table.insert(&key, config);
            } else {
                return Err(Error::config(format!(
                    "policy key {key:?} must start with '/' or be \"default\""
                )));
            }
        }
        Ok(table)
    }

    /// Resolves the policy for `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> &PageWebSocketConfig {
        let path = normalize(path);

        if let Some((_, config)) = self.routes.iter().find(|(prefix, _)| prefix == path) {
            return config;
        }

        self.routes
            .iter()
            .filter(|(prefix, _)| is_segment_prefix(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(&self.default, |(_, config)| config)
    }

    /// Returns the prefixed entries in insertion order.
    #[inline]
    pub fn routes(&self) -> impl Iterator<Item = (&str, &PageWebSocketConfig)> {
        self.routes.iter().map(|(p, c)| (p.as_str(), c))
    }

    /// Returns the fallback entry.
    #[inline]
    #[must_use]
    pub fn default_config(&self) -> &PageWebSocketConfig {
        &self.default
    }
}

// ============================================================================
// PolicyTableBuilder
// ============================================================================

/// Builder for a [`PolicyTable`].
#[derive(Debug, Clone, Default)]
pub struct PolicyTableBuilder {
    table: PolicyTable,
}

impl PolicyTableBuilder {
    /// Adds or replaces a route.
    #[must_use]
    pub fn route(mut self, prefix: &str, config: PageWebSocketConfig) -> Self {
        self.table.insert(prefix, config);
        self
    }

    /// Sets the fallback.
    #[must_use]
    pub fn default_config(mut self, config: PageWebSocketConfig) -> Self {
        self.table.default = config;
        self
    }

    /// Finishes the table.
    #[must_use]
    pub fn build(self) -> PolicyTable {
        self.table
    }
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Strips query, fragment, and trailing `/` (except for the root).
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// `prefix` matches `path` whole segments at a time.
fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/chat/"), "/chat");
        assert_eq!(normalize("/chat/12?x=1#top"), "/chat/12");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//"), "/");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_exact_match() {
        let table = PolicyTable::consultation();
        let config = table.resolve("/chat");
        assert!(config.enabled && config.require_auth && config.auto_connect);
        assert_eq!(config.connection_type, "chat");
        assert_eq!(config.features.len(), 5);
    }

    #[test]
    fn test_prefix_match_on_segment_boundary() {
        let table = PolicyTable::consultation();
        assert_eq!(table.resolve("/chat/room-1").connection_type, "chat");
        assert_eq!(table.resolve("/chatroom").connection_type, "none");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = PolicyTable::builder()
            .route("/tasks", PageWebSocketConfig::new("tasks"))
            .route("/tasks/archive", PageWebSocketConfig::disabled())
            .build();
        assert!(table.resolve("/tasks/12").enabled);
        assert!(!table.resolve("/tasks/archive/3").enabled);
    }

    #[test]
    fn test_disabled_routes_and_default() {
        let table = PolicyTable::consultation();
        for path in ["/profile", "/login", "/register", "/unknown", "/"] {
            assert!(!table.resolve(path).enabled, "{path}");
        }
        assert!(!table.resolve("/admin").auto_connect);
        assert!(!table.resolve("/plans/3").auto_connect);
    }

    #[test]
    fn test_with_route_replaces_same_prefix() {
        let table = PolicyTable::new(PageWebSocketConfig::disabled())
            .with_route("/chat", PageWebSocketConfig::new("a"))
            .with_route("/chat/", PageWebSocketConfig::new("b"));
        assert_eq!(table.routes().count(), 1);
        assert_eq!(table.resolve("/chat").connection_type, "b");
    }

    #[test]
    fn test_from_json() {
        let table = PolicyTable::from_json(
            r#"{
                "/chat": {"enabled": true, "requireAuth": true, "autoConnect": true,
                          "connectionType": "chat", "features": ["messaging"]},
                "default": {"enabled": false, "connectionType": "none"}
            }"#,
        )
        .unwrap();
        assert_eq!(table.resolve("/chat/1").features, vec!["messaging".to_string()]);
        assert_eq!(table.default_config(), &PageWebSocketConfig::disabled());
    }

    #[test]
    fn test_from_json_rejects_bad_key() {
        let err = PolicyTable::from_json(r#"{"chat": {"enabled": true, "connectionType": "chat"}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(PolicyTable::from_json("[]").is_err());
    }

    proptest! {
        #[test]
        fn prop_resolve_is_deterministic(path in "(/[a-z]{0,8}){0,4}(\\?[a-z=]{0,6})?") {
            let table = PolicyTable::consultation();
            let first = table.resolve(&path).clone();
            prop_assert_eq!(&first, table.resolve(&path));
            let fresh = PolicyTable::consultation();
            prop_assert_eq!(&first, fresh.resolve(&path));
        }
    }
}
