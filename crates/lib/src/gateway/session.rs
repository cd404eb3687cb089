//! WebSocket subscriber session.
//!
//! The session registers a [`ChannelSink`] and then multiplexes: queued frames
//! out to the socket, heartbeat pings, shutdown, and inbound client frames
//! (decoded and rebroadcast in each subscriber's preferred codec).

use crate::codec::{self, ContentType};
use crate::dispatch::Dispatcher;
use crate::subscribers::{ChannelSink, Frame, Subscriber};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionSettings {
    pub queue: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

fn to_ws_message(frame: Frame) -> Message {
    match frame.content_type {
        ContentType::StructuredText => match String::from_utf8(frame.payload.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        },
        ContentType::CompactBinary => Message::Binary(frame.payload.to_vec()),
    }
}

/// Decode a client frame and rebroadcast it. Undecodable frames are dropped.
fn rebroadcast(dispatcher: &Dispatcher, payload: &[u8], content_type: ContentType) {
    match codec::decode(payload, content_type) {
        Ok(message) => {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let report = dispatcher.broadcast_preferred(&message).await;
                log::debug!(
                    "client rebroadcast: {}/{} delivered",
                    report.delivered,
                    report.attempted
                );
            });
        }
        Err(e) => log::debug!("dropping client frame: {}", e),
    }
}

pub(crate) async fn run_session(
    mut socket: WebSocket,
    dispatcher: Dispatcher,
    preferred: ContentType,
    settings: SessionSettings,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (tx, mut rx) = mpsc::channel::<Frame>(settings.queue.max(1));
    let subscriber = dispatcher
        .registry()
        .register(Subscriber::new(preferred, Arc::new(ChannelSink::new(tx))))
        .await;

    let mut heartbeat = tokio::time::interval(settings.heartbeat_interval);
    heartbeat.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Heartbeat is polled before the outbound queue.
            biased;

            _ = shutdown_rx.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            _ = heartbeat.tick() => {
                if subscriber.is_detached() {
                    log::debug!("subscriber {} was evicted, closing", subscriber.id());
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                if last_seen.elapsed() > settings.client_timeout {
                    log::debug!("subscriber {} timed out", subscriber.id());
                    break;
                }
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if socket.send(to_ws_message(frame)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                last_seen = Instant::now();
                match msg {
                    Message::Text(text) => {
                        rebroadcast(&dispatcher, text.as_bytes(), ContentType::StructuredText)
                    }
                    Message::Binary(bytes) => {
                        rebroadcast(&dispatcher, &bytes, ContentType::CompactBinary)
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }

    dispatcher.registry().unregister(&subscriber).await;
}
