//! pbcast core library: dual-codec (JSON / Protobuf) message gateway with
//! WebSocket broadcast, used by the `pbcast` CLI.

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod subscribers;
