use serde::{Deserialize, Serialize};
use std::fmt;

pub const JSON_MIME: &str = "application/json";
pub const PROTOBUF_MIME: &str = "application/protobuf";

/// Wire codec tag. Closed set; anything else is rejected by the parsers below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// JSON.
    #[serde(rename = "json")]
    StructuredText,
    /// Protocol Buffers.
    #[serde(rename = "pb")]
    CompactBinary,
}

impl ContentType {
    /// Route segment form: `json` or `pb`.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "json" => Some(Self::StructuredText),
            "pb" => Some(Self::CompactBinary),
            _ => None,
        }
    }

    /// `content-type` header form. Parameters (`; charset=...`) are ignored.
    pub fn from_mime(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            JSON_MIME => Some(Self::StructuredText),
            PROTOBUF_MIME | "application/x-protobuf" => Some(Self::CompactBinary),
            _ => None,
        }
    }

    pub fn segment(self) -> &'static str {
        match self {
            Self::StructuredText => "json",
            Self::CompactBinary => "pb",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::StructuredText => JSON_MIME,
            Self::CompactBinary => PROTOBUF_MIME,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StructuredText => "structured-text",
            Self::CompactBinary => "compact-binary",
        })
    }
}
