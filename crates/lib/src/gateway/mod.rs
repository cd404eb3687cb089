//! Gateway: HTTP ingress + WebSocket subscribers on a single port.
//!
//! `POST /ws/{inbound}/{outbound}/{topic}` takes a JSON or Protobuf body, echoes
//! it in the outbound codec and broadcasts it to every `GET /ws` subscriber.

mod error;
pub mod ingress;
mod protocol;
mod server;
mod session;

pub use error::GatewayError;
pub use ingress::{ingest, Ingested};
pub use protocol::{ErrorBody, Health, Route, SubscribeParams};
pub use server::{router, run_gateway, GatewayState};
