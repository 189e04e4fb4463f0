//! Shared utilities for demos.
//!
//! - Command-line argument parsing
//! - Logging initialization
//! - Status and message printing

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use consult_realtime::{ConnectionRegistry, ConnectionStatus, InboundMessage};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    /// Real server endpoint; the in-memory server is used when absent.
    pub url: Option<String>,
    pub user_id: String,
    pub token: String,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            url: value_of("--url"),
            user_id: value_of("--user").unwrap_or_else(|| "42".to_string()),
            token: value_of("--token").unwrap_or_else(|| "demo-token".to_string()),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "consult_realtime=debug"
    } else {
        "consult_realtime=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Print every status transition of `registry`.
pub fn print_status_changes(registry: &ConnectionRegistry) {
    registry.add_connection_status_listener(|change| {
        println!("        [status] {} -> {}", change.previous, change.current);
    });
}

/// Wait until `registry` reports `status`, or give up after `secs`.
pub async fn wait_for_status(registry: &ConnectionRegistry, status: ConnectionStatus, secs: u64) -> bool {
    let mut rx = registry.subscribe_status();
    tokio::time::timeout(
        std::time::Duration::from_secs(secs),
        rx.wait_for(|s| *s == status),
    )
    .await
    .is_ok_and(|r| r.is_ok())
}

/// Print a one-line summary of a message.
pub fn print_message(label: &str, message: &InboundMessage) {
    println!(
        "        [{label}] feature={} type={}",
        message.feature(),
        message.message_type().unwrap_or("?")
    );
}
