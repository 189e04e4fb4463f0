//! Two pages sharing one realtime connection.
//!
//! Demonstrates:
//! - Route-driven connect on the chat page
//! - A second page adopting the live connection
//! - Feature-filtered handlers alongside each page's wildcard handler
//! - Refcounted teardown on unmount
//! - Reconnect after the server drops the socket (in-memory mode)
//!
//! Usage:
//!   cargo run --example chat_session
//!   cargo run --example chat_session -- --debug
//!   cargo run --example chat_session -- --url wss://consult.example.com/ws --token TOKEN

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use common::Args;
use consult_realtime::{
    BackoffPolicy, ConnectionRegistry, ConnectionStatus, CurrentUser, DeviceInfo, FeatureFilter,
    MemoryConnector, PageConnectionController, PolicyTable, Result, StaticSession,
};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Chat Session ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    println!("[Setup] Creating registry...");

    let session = Arc::new(StaticSession::signed_in(
        CurrentUser::new(args.user_id.as_str(), "consultant"),
        args.token.as_str(),
    ));
    let memory = MemoryConnector::new();
    let builder = ConnectionRegistry::builder()
        .backoff(BackoffPolicy {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            ..BackoffPolicy::default()
        })
        .auth(session.clone());
    let registry = match &args.url {
        Some(url) => builder.url(url.as_str()).build()?,
        None => builder
            .url("ws://memory.local/ws")
            .connector(memory.clone())
            .build()?,
    };
    common::print_status_changes(&registry);
    println!("        ✓ Registry ready ({})\n", args.url.as_deref().unwrap_or("in-memory server"));

    let policies = Arc::new(PolicyTable::consultation());
    let device = Arc::new(DeviceInfo {
        device_id: "demo-device".into(),
        device_type: "desktop".into(),
        user_agent: "consult-realtime-demo".into(),
        platform: std::env::consts::OS.into(),
        screen_width: 1920,
        screen_height: 1080,
        ..DeviceInfo::default()
    });

    registry.dispatcher().register_handler(
        "typing_banner",
        FeatureFilter::only(["typing_indicator"]),
        |message| {
            common::print_message("typing", message);
            Ok(true)
        },
    );

    // ========================================================================
    // Page A: chat
    // ========================================================================

    println!("[1] Mounting /chat/room-7...");
    let chat = PageConnectionController::new(
        registry.clone(),
        Arc::clone(&policies),
        session.clone(),
        device.clone(),
        "/chat/room-7",
    );
    let evaluation = chat.evaluate().await;
    println!("    Evaluation: {evaluation:?}");
    println!("    Features: {:?}\n", chat.supported_features());

    // ========================================================================
    // Page B: consultant queue
    // ========================================================================

    println!("[2] Mounting /consultant/queue...");
    let queue = PageConnectionController::new(
        registry.clone(),
        Arc::clone(&policies),
        session.clone(),
        device.clone(),
        "/consultant/queue",
    );
    let evaluation = queue.evaluate().await;
    println!("    Evaluation: {evaluation:?}");
    println!("    Interests held: {}\n", registry.retain_count());

    // ========================================================================
    // Traffic
    // ========================================================================

    println!("[3] Sending and receiving...");
    let sent = chat.send_message(json!({ "type": "chat_message", "content": "Hello doctor" }));
    println!("    Sent: {sent}");

    if args.url.is_none() {
        memory.push(&json!({ "type": "typing", "feature": "typing_indicator", "userId": "7" }));
        memory.push(&json!({ "type": "new_message", "feature": "messaging", "content": "Hi!" }));
        sleep(Duration::from_millis(100)).await;
        if let Some(message) = queue.last_message() {
            common::print_message("queue page", &message);
        }
    }
    println!();

    // ========================================================================
    // Reconnect
    // ========================================================================

    if args.url.is_none() {
        println!("[4] Dropping the socket server-side...");
        memory.drop_all();
        let back = common::wait_for_status(&registry, ConnectionStatus::Connected, 5).await;
        println!(
            "    Reconnected: {back} (id={})\n",
            registry.connection_id().map(|id| id.to_string()).unwrap_or_default()
        );
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    println!("[5] Unmounting pages...");
    chat.unmount();
    println!("    After chat: status={} interests={}", registry.connection_status(), registry.retain_count());
    queue.unmount();
    println!("    After queue: status={} interests={}", registry.connection_status(), registry.retain_count());

    println!("\n=== Done ===");
    Ok(())
}
