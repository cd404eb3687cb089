//! Shared helpers: start a gateway on a free port and wait until it answers.

#![allow(dead_code)]

use pbcast::config::Config;
use pbcast::gateway::{self, Health};
use std::time::Duration;

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Spawn the gateway with default settings on a free loopback port; returns the port.
/// The server task is left running when the test ends.
pub async fn start_gateway() -> u16 {
    start_gateway_with(|_| {}).await
}

pub async fn start_gateway_with(configure: impl FnOnce(&mut Config)) -> u16 {
    let port = free_port();
    let mut config = Config::default();
    configure(&mut config);
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });
    wait_for_health(port, |_| true).await;
    port
}

/// Poll `GET /` until `ready` accepts the health payload (5s budget).
pub async fn wait_for_health(port: u16, ready: impl Fn(&Health) -> bool) -> Health {
    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let health: Health = resp.json().await.expect("parse health JSON");
                if ready(&health) {
                    return health;
                }
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {} did not become ready within 5s; last error: {:?}",
        url, last_err
    );
}

/// Serve `router(state)` on a free loopback port; returns the port. Unlike
/// [`start_gateway`], the caller keeps the state (registry, shutdown sender).
pub async fn serve_state(state: gateway::GatewayState) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    let app = gateway::router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    wait_for_health(port, |_| true).await;
    port
}
