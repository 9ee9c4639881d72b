use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an edit source buffer is rejected before the generator is called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferFormatError {
    #[error("Invalid image buffer: buffer is empty")]
    Empty,

    #[error("Image buffer too small to contain valid image headers")]
    TooSmall,

    #[error("Image too large: {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported MIME type: {0}. Supported types: image/png, image/jpeg, image/webp")]
    UnsupportedMimeType(String),

    #[error("Buffer does not contain a valid PNG header")]
    InvalidPngHeader,

    #[error("Buffer does not contain a valid JPEG header")]
    InvalidJpegHeader,

    #[error("Buffer does not contain a valid WebP header")]
    InvalidWebpHeader,
}

#[derive(Error, Debug)]
pub enum PixelforgeError {
    #[error("Request validation failed: {}", .0.join(", "))]
    ValidationError(Vec<String>),

    #[error("Image generation service is not available")]
    ServiceUnavailable,

    #[error(transparent)]
    BufferFormat(#[from] BufferFormatError),

    /// The generator answered with a structured failure.
    #[error("{0}")]
    GenerationFailure(String),

    /// The generator raised; the prefix names the operation that was running.
    #[error("{prefix}: {message}")]
    Unexpected { prefix: &'static str, message: String },

    #[error("Maximum retry attempts exceeded ({allowed} attempts allowed)")]
    RetriesExhausted { allowed: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Response error: {0}")]
    ResponseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("AWS error: {0}")]
    AwsError(String),

    #[error("AWS service error: {0}")]
    AwsServiceError(String),
}

/// Coarse classification of a use-case failure, reported next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    ServiceUnavailable,
    BufferFormat,
    GenerationFailure,
    Unexpected,
    RetriesExhausted,
    Configuration,
}

impl PixelforgeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PixelforgeError::ValidationError(_) => FailureKind::Validation,
            PixelforgeError::ServiceUnavailable => FailureKind::ServiceUnavailable,
            PixelforgeError::BufferFormat(_) => FailureKind::BufferFormat,
            PixelforgeError::GenerationFailure(_) => FailureKind::GenerationFailure,
            PixelforgeError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            PixelforgeError::ConfigError(_) => FailureKind::Configuration,
            PixelforgeError::Unexpected { .. }
            | PixelforgeError::ResponseError(_)
            | PixelforgeError::SerializationError(_)
            | PixelforgeError::AwsError(_)
            | PixelforgeError::AwsServiceError(_) => FailureKind::Unexpected,
        }
    }
}

pub type Result<T> = std::result::Result<T, PixelforgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_reasons() {
        let err = PixelforgeError::ValidationError(vec![
            "Prompt cannot be empty".to_string(),
            "Invalid requester ID format".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Request validation failed: Prompt cannot be empty, Invalid requester ID format"
        );
        assert_eq!(err.kind(), FailureKind::Validation);
    }

    #[test]
    fn buffer_errors_keep_their_literal_messages() {
        let err: PixelforgeError = BufferFormatError::TooSmall.into();
        assert_eq!(
            err.to_string(),
            "Image buffer too small to contain valid image headers"
        );
        assert_eq!(err.kind(), FailureKind::BufferFormat);

        let too_large = BufferFormatError::TooLarge { size: 30, max: 20 }.to_string();
        assert!(too_large.contains("Image too large"));

        let mime = BufferFormatError::UnsupportedMimeType("image/gif".into()).to_string();
        assert!(mime.contains("Unsupported MIME type: image/gif"));
    }

    #[test]
    fn unexpected_error_is_prefixed() {
        let err = PixelforgeError::Unexpected {
            prefix: "Image generation failed",
            message: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "Image generation failed: connection reset");
        assert_eq!(err.kind(), FailureKind::Unexpected);
    }
}
