use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BufferFormatError;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Shortest buffer that can carry any supported header (the PNG signature).
pub const MIN_HEADER_BYTES: usize = PNG_SIGNATURE.len();

pub const DEFAULT_MIME_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMimeType::Png => "image/png",
            ImageMimeType::Jpeg => "image/jpeg",
            ImageMimeType::Webp => "image/webp",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "image/png" => Some(ImageMimeType::Png),
            "image/jpeg" => Some(ImageMimeType::Jpeg),
            "image/webp" => Some(ImageMimeType::Webp),
            _ => None,
        }
    }

    /// Checks the magic bytes for this format at the start of `buffer`.
    pub fn check_header(&self, buffer: &[u8]) -> Result<(), BufferFormatError> {
        match self {
            ImageMimeType::Png if buffer.starts_with(&PNG_SIGNATURE) => Ok(()),
            ImageMimeType::Png => Err(BufferFormatError::InvalidPngHeader),
            ImageMimeType::Jpeg if buffer.starts_with(&JPEG_SOI) => Ok(()),
            ImageMimeType::Jpeg => Err(BufferFormatError::InvalidJpegHeader),
            ImageMimeType::Webp
                if buffer.starts_with(b"RIFF") && buffer.get(8..12) == Some(&b"WEBP"[..]) =>
            {
                Ok(())
            }
            ImageMimeType::Webp => Err(BufferFormatError::InvalidWebpHeader),
        }
    }
}

impl fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SafetyDetail {
    pub filtered: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageResultMetadata {
    pub model: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<u64>,
    pub safety: Option<SafetyDetail>,
}

/// Outcome of one generator invocation. `buffer` is set iff `success`, `error` iff not.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageResult {
    pub success: bool,
    #[serde(default, with = "base64_buffer", skip_serializing_if = "Option::is_none")]
    pub buffer: Option<Vec<u8>>,
    pub error: Option<String>,
    pub metadata: Option<ImageResultMetadata>,
}

impl ImageResult {
    pub fn success(buffer: Vec<u8>) -> Self {
        Self {
            success: true,
            buffer: Some(buffer),
            error: None,
            metadata: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            buffer: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ImageResultMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// Image payloads run to megabytes; only their size goes to logs.
impl fmt::Debug for ImageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageResult")
            .field("success", &self.success)
            .field("buffer_len", &self.buffer.as_ref().map(Vec::len))
            .field("error", &self.error)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginalImageInfo {
    pub buffer_size: usize,
    pub mime_type: String,
}

/// Image bytes travel as standard base64 in JSON, the same encoding Titan uses.
mod base64_buffer {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        buffer: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match buffer {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(de::Error::custom))
            .transpose()
    }
}

#[derive(Serialize, Deserialize)]
pub struct TitanImageResponse {
    #[serde(default)]
    pub images: Vec<String>,
    pub error: Option<String>,
}
