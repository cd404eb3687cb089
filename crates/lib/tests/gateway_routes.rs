//! Integration tests for the ingress routes and WebSocket broadcast.

mod common;

use futures_util::StreamExt;
use pbcast::codec::{self, ContentType, Message};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn subscribe(port: u16, codec: &str, expected_subscribers: usize) -> Socket {
    let url = format!("ws://127.0.0.1:{}/ws?codec={}", port, codec);
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("websocket connect");
    common::wait_for_health(port, |h| h.subscribers >= expected_subscribers).await;
    ws
}

/// Next text or binary frame, skipping control frames.
async fn next_data_frame(ws: &mut Socket) -> WsMessage {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, ws.next())
            .await
            .expect("timed out waiting for broadcast")
            .expect("socket closed")
            .expect("socket error");
        match msg {
            WsMessage::Text(_) | WsMessage::Binary(_) => return msg,
            _ => continue,
        }
    }
}

fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", port, path)
}

#[tokio::test]
async fn json_to_json_echoes_and_broadcasts_text() {
    let port = common::start_gateway().await;
    let mut ws = subscribe(port, "json", 1).await;

    let resp = reqwest::Client::new()
        .post(url(port, "/ws/json/json/stuff"))
        .json(&serde_json::json!({"name": "Jennifer", "number": 288000111}))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let echoed: Message = resp.json().await.unwrap();
    assert_eq!(echoed, Message::new("Jennifer", 288000111));

    match next_data_frame(&mut ws).await {
        WsMessage::Text(text) => {
            let m = codec::decode(text.as_bytes(), ContentType::StructuredText).unwrap();
            assert_eq!(m, Message::new("Jennifer", 288000111));
        }
        other => panic!("expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn pb_to_pb_returns_protobuf() {
    let port = common::start_gateway().await;
    let sent = Message::new("Alicia", 433678990);

    let resp = reqwest::Client::new()
        .post(url(port, "/ws/pb/pb/stuff"))
        .header("content-type", "application/protobuf")
        .body(codec::encode(&sent, ContentType::CompactBinary).to_vec())
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/protobuf"
    );
    let body = resp.bytes().await.unwrap();
    assert_eq!(codec::decode(&body, ContentType::CompactBinary).unwrap(), sent);
}

#[tokio::test]
async fn json_to_pb_broadcasts_binary_to_every_subscriber() {
    let port = common::start_gateway().await;
    let mut json_sub = subscribe(port, "json", 1).await;
    let mut pb_sub = subscribe(port, "pb", 2).await;

    let resp = reqwest::Client::new()
        .post(url(port, "/ws/json/pb/stuff"))
        .json(&serde_json::json!({"name": "Belle", "number": 422222222}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // The route decides the broadcast codec, not the subscriber preference.
    for ws in [&mut json_sub, &mut pb_sub] {
        match next_data_frame(ws).await {
            WsMessage::Binary(bytes) => {
                let m = codec::decode(&bytes, ContentType::CompactBinary).unwrap();
                assert_eq!(m, Message::new("Belle", 422222222));
            }
            other => panic!("expected binary frame, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn client_frames_are_rebroadcast_in_preferred_codec() {
    use futures_util::SinkExt;

    let port = common::start_gateway().await;
    let mut sender = subscribe(port, "json", 1).await;
    let mut pb_sub = subscribe(port, "pb", 2).await;

    sender
        .send(WsMessage::Text(r#"{"name":"Jade","number":5}"#.to_string()))
        .await
        .unwrap();

    match next_data_frame(&mut pb_sub).await {
        WsMessage::Binary(bytes) => {
            let m = codec::decode(&bytes, ContentType::CompactBinary).unwrap();
            assert_eq!(m, Message::new("Jade", 5));
        }
        other => panic!("expected binary frame, got {:?}", other),
    }
}

#[tokio::test]
async fn rejects_bad_requests_with_4xx() {
    let port = common::start_gateway().await;
    let client = reqwest::Client::new();

    let malformed = client
        .post(url(port, "/ws/json/json/stuff"))
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);
    let body: serde_json::Value = malformed.json().await.unwrap();
    assert_eq!(body["error"], "malformedPayload");

    let mismatch = client
        .post(url(port, "/ws/pb/pb/stuff"))
        .header("content-type", "application/protobuf")
        .body(vec![0x18, 0x01])
        .send()
        .await
        .unwrap();
    assert_eq!(mismatch.status(), 400);
    let body: serde_json::Value = mismatch.json().await.unwrap();
    assert_eq!(body["error"], "schemaMismatch");

    let unknown_codec = client
        .post(url(port, "/ws/xml/pb/stuff"))
        .body("<x/>")
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_codec.status(), 415);

    let unknown_header = client
        .post(url(port, "/ws/json/json/stuff"))
        .header("content-type", "text/csv")
        .body("a,b")
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_header.status(), 415);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let port = common::start_gateway_with(|c| c.gateway.max_body_bytes = 16).await;

    let resp = reqwest::Client::new()
        .post(url(port, "/ws/json/json/stuff"))
        .json(&serde_json::json!({"name": "a name that is too long", "number": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
}

#[tokio::test]
async fn rejects_unknown_subscriber_codec() {
    let port = common::start_gateway().await;
    let url = format!("ws://127.0.0.1:{}/ws?codec=cbor", port);
    assert!(tokio_tungstenite::connect_async(&url).await.is_err());
}
