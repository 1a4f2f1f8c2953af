//! Shared test utilities for runner-server integration tests

pub mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use runner_core::{
    ImmediatePreparer, MemoryCredentialStore, PortPool, RenderConfig, SessionCoordinator,
    SessionTable, StartResponse, WebSocketDialer,
};
use runner_server::{AppState, RunnerServer, ServerConfig};
use serde_json::json;
use tokio::net::TcpListener;

pub const INSTANCE_ID: &str = "render-test";
pub const DOMAIN: &str = "example.com";

/// Creates a test server whose pool holds one port per echo worker
#[allow(dead_code)]
pub async fn create_test_server(workers: usize) -> (Arc<AppState>, SocketAddr) {
    create_test_server_with(workers, RenderConfig::default()).await
}

/// Creates a test server with custom render settings
///
/// `ports`, `fan_out` and `worker_host` are overridden to fit the spawned workers.
#[allow(dead_code)]
pub async fn create_test_server_with(
    workers: usize,
    render: RenderConfig,
) -> (Arc<AppState>, SocketAddr) {
    let mut ports = Vec::with_capacity(workers);
    for _ in 0..workers {
        ports.push(worker::spawn_echo_worker().await);
    }

    let render = RenderConfig {
        fan_out: workers.max(1),
        worker_host: "127.0.0.1".to_string(),
        handshake_timeout_secs: 2,
        ..render
    };
    let coordinator = SessionCoordinator::spawn(
        render.coordinator_config(INSTANCE_ID),
        Arc::new(PortPool::new(ports)),
        Arc::new(SessionTable::new()),
        Arc::new(ImmediatePreparer),
    );
    let dialer = Arc::new(WebSocketDialer::new(
        render.worker_host.clone(),
        render.worker_path.clone(),
    ));
    let state = Arc::new(AppState::with_components(
        coordinator,
        dialer,
        Arc::new(MemoryCredentialStore::new()),
    ));

    let server = RunnerServer::with_state(ServerConfig::new("127.0.0.1", 0), Arc::clone(&state));
    let addr = spawn_server(server).await;

    (state, addr)
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: RunnerServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;

    addr
}

/// Registers a credential and starts a batch, returning the issued URLs
#[allow(dead_code)]
pub async fn start_batch(addr: SocketAddr, work_item_id: &str) -> StartResponse {
    let client = reqwest::Client::new();
    client
        .post(format!("http://{}/api/register", addr))
        .json(&json!({ "domain": DOMAIN, "access_token": "secret" }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    client
        .post(format!("http://{}/api/start", addr))
        .json(&json!({
            "work_item_id": work_item_id,
            "domain": DOMAIN,
            "base_ws_link": format!("ws://{}/", addr),
        }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap()
}
