//! Compact-binary codec (Protocol Buffers).
//!
//! Schema, wire-compatible with `message MyObj { int32 number = 1; string name = 2; }`
//! for every value in the `int32` range:
//!
//! ```text
//! message Message {
//!   int64  number = 1;
//!   string name   = 2;
//! }
//! ```
//!
//! Unlike a plain prost decode, unknown tags and wrong wire types are rejected
//! as [`CodecError::SchemaMismatch`] instead of being skipped.

use super::{CodecError, ContentType, Message};
use bytes::{Buf, Bytes};
use prost::encoding::{decode_key, decode_varint, WireType};
use prost::Message as _;

const NUMBER_TAG: u32 = 1;
const NAME_TAG: u32 = 2;

#[derive(Clone, PartialEq, prost::Message)]
struct WireMessage {
    #[prost(int64, tag = "1")]
    number: i64,
    #[prost(string, tag = "2")]
    name: String,
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        Self {
            number: m.number,
            name: m.name.clone(),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(w: WireMessage) -> Self {
        Self {
            name: w.name,
            number: w.number,
        }
    }
}

fn malformed(detail: impl ToString) -> CodecError {
    CodecError::MalformedPayload(ContentType::CompactBinary, detail.to_string())
}

fn mismatch(detail: impl ToString) -> CodecError {
    CodecError::SchemaMismatch(ContentType::CompactBinary, detail.to_string())
}

/// Walk every field key and check it against the schema without materializing values.
fn check_schema(mut buf: &[u8]) -> Result<(), CodecError> {
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf).map_err(malformed)?;
        match (tag, wire_type) {
            (NUMBER_TAG, WireType::Varint) => {
                decode_varint(&mut buf).map_err(malformed)?;
            }
            (NAME_TAG, WireType::LengthDelimited) => {
                let len = decode_varint(&mut buf).map_err(malformed)?;
                if len > buf.remaining() as u64 {
                    return Err(malformed(format!(
                        "name field declares {} bytes, {} remain",
                        len,
                        buf.remaining()
                    )));
                }
                buf.advance(len as usize);
            }
            (NUMBER_TAG | NAME_TAG, wire_type) => {
                return Err(mismatch(format!(
                    "field {} has wire type {:?}",
                    tag, wire_type
                )));
            }
            (tag, _) => return Err(mismatch(format!("unexpected field tag {}", tag))),
        }
    }
    Ok(())
}

pub(super) fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    check_schema(bytes)?;
    WireMessage::decode(bytes).map(Message::from).map_err(malformed)
}

pub(super) fn encode(message: &Message) -> Bytes {
    Bytes::from(WireMessage::from(message).encode_to_vec())
}
