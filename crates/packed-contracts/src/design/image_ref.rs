use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRefError {
    #[error("image reference is not a data URI")]
    MissingDataPrefix,
    #[error("image reference is not base64 encoded")]
    NotBase64,
    #[error("image reference has an empty payload")]
    EmptyPayload,
    #[error("image payload failed to decode: {0}")]
    Decode(String),
}

/// Self-contained image reference: a base64 bitmap wrapped in a data URI.
///
/// The payload is kept as the exact base64 text received so that
/// stripping and re-wrapping the prefix never re-encodes the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    mime_type: String,
    data: String,
}

impl ImageRef {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: normalize_mime(mime_type),
            data: BASE64.encode(bytes),
        }
    }

    /// Wraps an already base64-encoded payload, as returned inline by the service.
    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self, ImageRefError> {
        let data = data.trim();
        if data.is_empty() {
            return Err(ImageRefError::EmptyPayload);
        }
        BASE64
            .decode(data.as_bytes())
            .map_err(|err| ImageRefError::Decode(err.to_string()))?;
        Ok(Self {
            mime_type: normalize_mime(mime_type),
            data: data.to_string(),
        })
    }

    pub fn parse(data_uri: &str) -> Result<Self, ImageRefError> {
        let rest = data_uri
            .trim()
            .strip_prefix("data:")
            .ok_or(ImageRefError::MissingDataPrefix)?;
        let (header, payload) = rest.split_once(',').ok_or(ImageRefError::NotBase64)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(ImageRefError::NotBase64)?;
        Self::from_base64(mime_type, payload)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload with the data-URI prefix stripped.
    pub fn payload(&self) -> &str {
        &self.data
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, ImageRefError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| ImageRefError::Decode(err.to_string()))
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

fn normalize_mime(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        DEFAULT_IMAGE_MIME.to_string()
    } else {
        trimmed
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl FromStr for ImageRef {
    type Err = ImageRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
