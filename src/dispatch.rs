//! Feature-based routing of inbound messages.
//!
//! Every handler whose filter accepts a message's feature runs; there is no
//! first-match short circuit. A failing handler is logged and counted but
//! never stops the others.
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = MessageDispatcher::new();
//! dispatcher.register_handler(
//!     "chat_list",
//!     FeatureFilter::only(["messaging", "read_receipt"]),
//!     |msg| {
//!         println!("{}", msg.feature());
//!         Ok(true)
//!     },
//! );
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::HandlerId;
use crate::protocol::InboundMessage;

// ============================================================================
// Types
// ============================================================================

/// Wildcard feature accepting every message.
pub const WILDCARD: &str = "*";

/// Handler callback.
///
/// `Ok(true)` means the handler consumed the message; it is reported for
/// diagnostics only and does not stop propagation.
pub type HandlerFn = dyn Fn(&InboundMessage) -> Result<bool> + Send + Sync;

// ============================================================================
// FeatureFilter
// ============================================================================

/// Which features a handler accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureFilter {
    /// Every message.
    All,
    /// Messages whose feature is in the set.
    Only(FxHashSet<String>),
}

impl FeatureFilter {
    /// Builds a filter from feature names; any `"*"` yields [`FeatureFilter::All`].
    #[must_use]
    pub fn only<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: FxHashSet<String> = features.into_iter().map(Into::into).collect();
        if set.contains(WILDCARD) {
            Self::All
        } else {
            Self::Only(set)
        }
    }

    /// Returns `true` if `feature` passes this filter.
    #[inline]
    #[must_use]
    pub fn accepts(&self, feature: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(feature),
        }
    }
}

// ============================================================================
// DispatchReport
// ============================================================================

/// Outcome of dispatching one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers whose filter matched.
    pub matched: usize,
    /// Matched handlers that returned `Ok(true)`.
    pub handled: usize,
    /// Matched handlers that returned `Err` or panicked.
    pub failed: usize,
}

// ============================================================================
// MessageDispatcher
// ============================================================================

/// A handler registration.
struct Registration {
    id: HandlerId,
    filter: FeatureFilter,
    callback: Arc<HandlerFn>,
}

/// Routes inbound messages to registered handlers.
///
/// Cloning shares the same handler table.
#[derive(Clone, Default)]
pub struct MessageDispatcher {
    handlers: Arc<RwLock<Vec<Registration>>>,
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl MessageDispatcher {
    /// Creates an empty dispatcher.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any handler with the same id in place.
    ///
    /// Returns `true` if an existing registration was replaced.
    pub fn register_handler<F>(
        &self,
        id: impl Into<HandlerId>,
        filter: FeatureFilter,
        callback: F,
    ) -> bool
    where
        F: Fn(&InboundMessage) -> Result<bool> + Send + Sync + 'static,
    {
        let registration = Registration {
            id: id.into(),
            filter,
            callback: Arc::new(callback),
        };

        let mut handlers = self.handlers.write();
        if let Some(slot) = handlers.iter_mut().find(|r| r.id == registration.id) {
            trace!(handler = %registration.id, "Handler replaced");
            *slot = registration;
            true
        } else {
            trace!(handler = %registration.id, "Handler registered");
            handlers.push(registration);
            false
        }
    }

    /// Removes a handler. Unknown ids are ignored.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unregister_handler(&self, id: &HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|r| &r.id != id);
        before != handlers.len()
    }

    /// Returns `true` if a handler with `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &HandlerId) -> bool {
        self.handlers.read().iter().any(|r| &r.id == id)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Delivers `message` to every matching handler in registration order.
    pub fn dispatch(&self, message: &InboundMessage) -> DispatchReport {
        let feature = message.feature();

        // Snapshot so handlers may (un)register without deadlocking.
        let targets: Vec<(HandlerId, Arc<HandlerFn>)> = self
            .handlers
            .read()
            .iter()
            .filter(|r| r.filter.accepts(feature))
            .map(|r| (r.id.clone(), Arc::clone(&r.callback)))
            .collect();

        let mut report = DispatchReport {
            matched: targets.len(),
            ..DispatchReport::default()
        };

        for (id, callback) in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(Ok(handled)) => {
                    if handled {
                        report.handled += 1;
                    }
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(handler = %id, feature, error = %e, "Message handler failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    let err = Error::handler(id.as_str(), panic_message(panic.as_ref()));
                    warn!(handler = %id, feature, error = %err, "Message handler panicked");
                }
            }
        }

        if report.matched == 0 {
            trace!(feature, "No handler for message");
        }

        report
    }
}

/// Extracts a readable payload from a caught panic.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic".to_string())
}

// ============================================================================
// Tests
// ============================================================================
