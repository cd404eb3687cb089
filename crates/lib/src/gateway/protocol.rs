//! Gateway wire types (ingress route, subscribe query, error and health bodies).

use crate::codec::ContentType;
use crate::gateway::error::GatewayError;
use serde::{Deserialize, Serialize};

/// Ingress route from `/ws/{inbound}/{outbound}/{topic}`: inbound body codec,
/// then broadcast/response codec. Computed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub inbound: ContentType,
    pub outbound: ContentType,
    pub topic: String,
}

impl Route {
    pub fn new(inbound: ContentType, outbound: ContentType, topic: impl Into<String>) -> Self {
        Self {
            inbound,
            outbound,
            topic: topic.into(),
        }
    }

    pub fn parse(inbound: &str, outbound: &str, topic: &str) -> Result<Self, GatewayError> {
        let segment = |s: &str| {
            ContentType::from_segment(s).ok_or_else(|| {
                GatewayError::UnsupportedContentType(format!("unknown route codec {:?}", s))
            })
        };
        Ok(Self::new(segment(inbound)?, segment(outbound)?, topic))
    }
}

/// Query for `GET /ws`: `?codec=json|pb` sets the subscriber's preferred codec.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeParams {
    #[serde(default)]
    pub codec: Option<String>,
}

impl SubscribeParams {
    pub fn preferred(&self) -> Result<ContentType, GatewayError> {
        match self.codec.as_deref() {
            None => Ok(ContentType::StructuredText),
            Some(s) => ContentType::from_segment(s).ok_or_else(|| {
                GatewayError::UnsupportedContentType(format!("unknown subscriber codec {:?}", s))
            }),
        }
    }
}

/// JSON error body: `{ "error": kind, "message": detail }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// `GET /` health payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub runtime: String,
    pub protocol: u32,
    pub port: u16,
    pub subscribers: usize,
}
