//! Gateway HTTP + WebSocket server (single port).

use crate::config::{self, Config};
use crate::dispatch::{DeliveryPolicy, Dispatcher};
use crate::gateway::error::GatewayError;
use crate::gateway::ingress;
use crate::gateway::protocol::{Health, Route, SubscribeParams};
use crate::gateway::session::{self, SessionSettings};
use crate::subscribers::SubscriberRegistry;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, DefaultBodyLimit, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const PROTOCOL_VERSION: u32 = 1;

/// Shared state for the gateway (config, registry, dispatcher).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    /// Fires once on shutdown; every WebSocket session closes its socket.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl GatewayState {
    /// Build state around an injected registry.
    pub fn new(config: Config, registry: Arc<SubscriberRegistry>) -> Self {
        let policy = DeliveryPolicy::from(&config.broadcast);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            dispatcher: Dispatcher::new(registry, policy),
            shutdown_tx,
        }
    }

    fn session_settings(&self) -> SessionSettings {
        let b = &self.config.broadcast;
        SessionSettings {
            queue: b.subscriber_queue,
            heartbeat_interval: Duration::from_secs(b.heartbeat_interval_secs.max(1)),
            client_timeout: Duration::from_secs(b.client_timeout_secs.max(1)),
        }
    }
}

/// All gateway routes.
pub fn router(state: GatewayState) -> Router {
    let max_body = state.config.gateway.max_body_bytes;
    Router::new()
        .route("/", get(health_http))
        .route("/ws", get(ws_handler))
        .route("/ws/", get(ws_handler))
        .route("/ws/:inbound/:outbound/:topic", post(ingress_http))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        log::warn!(
            "binding gateway to non-loopback address {}; ingress is unauthenticated",
            bind
        );
    }
    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let state = GatewayState::new(config, Arc::new(SubscriberRegistry::new()));
    let shutdown_tx = state.shutdown_tx.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Tells WebSocket sessions to close so graceful shutdown can drain.
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, closing subscriber sessions");
    let _ = shutdown_tx.send(());
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<Health> {
    Json(Health {
        runtime: "running".to_string(),
        protocol: PROTOCOL_VERSION,
        port: state.config.gateway.port,
        subscribers: state.dispatcher.registry().len().await,
    })
}

/// GET /ws upgrades to a subscriber WebSocket; `?codec=pb` prefers binary frames.
async fn ws_handler(
    State(state): State<GatewayState>,
    Query(params): Query<SubscribeParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, GatewayError> {
    let preferred = params.preferred()?;
    let settings = state.session_settings();
    let shutdown_rx = state.shutdown_tx.subscribe();
    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| {
        session::run_session(socket, dispatcher, preferred, settings, shutdown_rx)
    }))
}

/// POST /ws/{inbound}/{outbound}/{topic}: decode, broadcast, echo in the outbound codec.
async fn ingress_http(
    State(state): State<GatewayState>,
    Path((inbound, outbound, topic)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let route = Route::parse(&inbound, &outbound, &topic)?;
    let header = match headers.get(CONTENT_TYPE) {
        Some(v) => Some(v.to_str().map_err(|_| {
            GatewayError::UnsupportedContentType("non-ASCII content-type header".to_string())
        })?),
        None => None,
    };
    let ingested = ingress::ingest(&state.dispatcher, &route, header, &body)?;
    let response = ingested.response;
    Ok(([(CONTENT_TYPE, response.content_type.mime())], response.payload).into_response())
}
