//! Ingress: decode an inbound message, start its broadcast, build the acknowledgment.

use crate::codec::{self, ContentType, Message};
use crate::dispatch::{DeliveryReport, Dispatcher};
use crate::gateway::error::GatewayError;
use crate::gateway::protocol::Route;
use crate::subscribers::Frame;
use tokio::task::JoinHandle;

/// Result of a successful ingest.
pub struct Ingested {
    pub message: Message,
    /// Acknowledgment body, encoded in the route's outbound codec.
    pub response: Frame,
    /// Detached broadcast; dropping it does not cancel delivery.
    pub broadcast: JoinHandle<DeliveryReport>,
}

/// Resolve the declared body codec from a `content-type` header. Absent means JSON.
pub fn declared_content_type(header: Option<&str>) -> Result<ContentType, GatewayError> {
    match header {
        None => Ok(ContentType::StructuredText),
        Some(value) => ContentType::from_mime(value)
            .ok_or_else(|| GatewayError::UnsupportedContentType(value.to_string())),
    }
}

/// Decode `body` for `route` and hand it to the dispatcher. Nothing is broadcast
/// unless decoding succeeds.
pub fn ingest(
    dispatcher: &Dispatcher,
    route: &Route,
    content_type_header: Option<&str>,
    body: &[u8],
) -> Result<Ingested, GatewayError> {
    let declared = declared_content_type(content_type_header)?;
    if declared != route.inbound {
        return Err(GatewayError::UnsupportedContentType(format!(
            "body declared as {} but route expects {}",
            declared.mime(),
            route.inbound.mime()
        )));
    }

    let message = codec::decode(body, declared)?;
    log::debug!(
        "ingress {}->{} topic {:?}: {:?}",
        route.inbound.segment(),
        route.outbound.segment(),
        route.topic,
        message
    );

    let broadcast = dispatcher.spawn_broadcast(message.clone(), route.outbound);
    let response = Frame::new(route.outbound, codec::encode(&message, route.outbound));
    Ok(Ingested {
        message,
        response,
        broadcast,
    })
}
