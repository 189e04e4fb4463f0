//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use consult_realtime::{
    BackoffPolicy, ConnectionId, ConnectionParams, ConnectionRegistry, ConnectionStatus,
    CurrentUser, DeviceInfo, MemoryConnector, PageConnectionController, PolicyTable,
    StaticSession, UserType,
};
use parking_lot::Mutex;

/// Upper bound for any wait in these tests.
pub const WAIT: Duration = Duration::from_secs(3);

/// Registry on `connector` with millisecond-scale timers.
pub fn registry(connector: &MemoryConnector) -> ConnectionRegistry {
    registry_with_heartbeat(connector, Duration::from_secs(60))
}

pub fn registry_with_heartbeat(connector: &MemoryConnector, heartbeat: Duration) -> ConnectionRegistry {
    ConnectionRegistry::builder()
        .url("ws://memory.test/ws")
        .connector(connector.clone())
        .connect_timeout(Duration::from_millis(250))
        .heartbeat(heartbeat, 2)
        .backoff(BackoffPolicy {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_attempts: 3,
            jitter: true,
        })
        .build()
        .expect("valid test config")
}

pub fn params(path: &str) -> ConnectionParams {
    ConnectionParams::new(
        "42",
        Some("token".into()),
        UserType::Customer,
        ConnectionId::generate("chat", path),
    )
}

pub fn signed_in() -> Arc<StaticSession> {
    Arc::new(StaticSession::signed_in(
        CurrentUser::new("42", "customer"),
        "token",
    ))
}

pub fn page(
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

/// Records every status the registry reports, in order.
pub fn record_statuses(registry: &ConnectionRegistry) -> Arc<Mutex<Vec<ConnectionStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    registry.add_connection_status_listener(move |change| sink.lock().push(change.current));
    seen
}

/// Waits until the registry reports `status`.
pub async fn wait_for_status(registry: &ConnectionRegistry, status: ConnectionStatus) {
    let mut rx = registry.subscribe_status();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == status))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {status}"))
        .expect("registry alive");
}

/// Polls `condition` until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Opt-in log output: `RUST_LOG=consult_realtime=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
