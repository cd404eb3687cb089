//! Request-scoped gateway errors and their HTTP mapping.

use crate::codec::CodecError;
use crate::gateway::protocol::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Unknown codec in the route or header, or a header that contradicts the route.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Codec(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Codec(CodecError::MalformedPayload(..)) => "malformedPayload",
            GatewayError::Codec(CodecError::SchemaMismatch(..)) => "schemaMismatch",
            GatewayError::UnsupportedContentType(_) => "unsupportedContentType",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ContentType;

    #[test]
    fn maps_kinds_to_status() {
        let malformed = GatewayError::from(CodecError::MalformedPayload(
            ContentType::CompactBinary,
            "truncated".into(),
        ));
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(malformed.kind(), "malformedPayload");

        let mismatch = GatewayError::from(CodecError::SchemaMismatch(
            ContentType::StructuredText,
            "missing field".into(),
        ));
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mismatch.kind(), "schemaMismatch");

        let unsupported = GatewayError::UnsupportedContentType("text/xml".into());
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
