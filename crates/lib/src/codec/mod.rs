//! Codec layer: raw payload + content type <-> canonical [`Message`].
//!
//! Two wire formats are supported: structured-text (JSON, self-describing) and
//! compact-binary (Protocol Buffers, positional/tagged). Both carry the full
//! `i64` range of `number`.

mod binary;
mod content_type;
mod json;

pub use content_type::ContentType;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Canonical in-memory message. Field order here is the JSON field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub name: String,
    pub number: i64,
}

impl Message {
    pub fn new(name: impl Into<String>, number: i64) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Bytes do not parse under the declared codec's grammar.
    #[error("malformed {0} payload: {1}")]
    MalformedPayload(ContentType, String),
    /// Bytes parse but do not match the message schema.
    #[error("{0} payload does not match message schema: {1}")]
    SchemaMismatch(ContentType, String),
}

/// Decode `bytes` under `content_type`.
pub fn decode(bytes: &[u8], content_type: ContentType) -> Result<Message, CodecError> {
    match content_type {
        ContentType::StructuredText => json::decode(bytes),
        ContentType::CompactBinary => binary::decode(bytes),
    }
}

/// Encode `message` as `content_type`. Encoding is deterministic.
pub fn encode(message: &Message, content_type: ContentType) -> Bytes {
    match content_type {
        ContentType::StructuredText => json::encode(message),
        ContentType::CompactBinary => binary::encode(message),
    }
}
