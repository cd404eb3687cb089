//! Structured-text codec (compact JSON, `name` then `number`).

use super::{CodecError, ContentType, Message};
use bytes::Bytes;
use serde_json::error::Category;

pub(super) fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(classify)?;
    // The derived deserializer would also take a positional array.
    if !value.is_object() {
        return Err(CodecError::SchemaMismatch(
            ContentType::StructuredText,
            "expected a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(classify)
}

fn classify(e: serde_json::Error) -> CodecError {
    match e.classify() {
        Category::Data => CodecError::SchemaMismatch(ContentType::StructuredText, e.to_string()),
        Category::Syntax | Category::Eof | Category::Io => {
            CodecError::MalformedPayload(ContentType::StructuredText, e.to_string())
        }
    }
}

pub(super) fn encode(message: &Message) -> Bytes {
    // Serializing a struct of a String and an i64 cannot fail.
    Bytes::from(serde_json::to_vec(message).unwrap_or_default())
}
