use crate::{
    config::{EditConfig, ValidationConfig},
    error::{BufferFormatError, FailureKind, PixelforgeError},
    generator::SharedGenerator,
    logger,
    models::{
        GeneratorInfo, ImageMimeType, ImageRequest, ImageResult, MetadataUpdate,
        OriginalImageInfo, RequestKind, ValidationResult, DEFAULT_MIME_TYPE, MIN_HEADER_BYTES,
        SANITIZED_PROMPT_EMPTY,
    },
    usecases::{settle_reply, RAISED_PREFIX, REFUSAL_DEFAULT},
};
use std::fmt;

#[derive(Clone)]
pub struct EditImageInput {
    pub request: ImageRequest,
    pub buffer: Vec<u8>,
    pub mime_type: Option<String>,
}

impl EditImageInput {
    pub fn new(request: ImageRequest, buffer: Vec<u8>) -> Self {
        Self {
            request,
            buffer,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

impl fmt::Debug for EditImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditImageInput")
            .field("request", &self.request)
            .field("buffer_len", &self.buffer.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub success: bool,
    pub image_result: Option<ImageResult>,
    pub validation_result: ValidationResult,
    pub processed_request: ImageRequest,
    pub original_image_info: Option<OriginalImageInfo>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl EditOutcome {
    fn failed(
        error: PixelforgeError,
        validation_result: ValidationResult,
        processed_request: ImageRequest,
        original_image_info: Option<OriginalImageInfo>,
        image_result: Option<ImageResult>,
    ) -> Self {
        Self {
            success: false,
            image_result,
            validation_result,
            processed_request,
            original_image_info,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}

/// Checks an edit source buffer, first failing check wins. A missing MIME type
/// means `image/png`.
pub fn validate_image_buffer(
    buffer: &[u8],
    mime_type: Option<&str>,
    max_bytes: usize,
) -> Result<ImageMimeType, BufferFormatError> {
    if buffer.is_empty() {
        return Err(BufferFormatError::Empty);
    }
    if buffer.len() < MIN_HEADER_BYTES {
        return Err(BufferFormatError::TooSmall);
    }
    if buffer.len() > max_bytes {
        return Err(BufferFormatError::TooLarge {
            size: buffer.len(),
            max: max_bytes,
        });
    }

    let declared = mime_type.unwrap_or(DEFAULT_MIME_TYPE);
    let mime = ImageMimeType::parse(declared)
        .ok_or_else(|| BufferFormatError::UnsupportedMimeType(declared.to_string()))?;

    mime.check_header(buffer)?;
    Ok(mime)
}

/// Validates a request plus its source image, then runs a single edit.
#[derive(Clone)]
pub struct EditImageUseCase {
    generator: SharedGenerator,
    validation: ValidationConfig,
    limits: EditConfig,
}

impl EditImageUseCase {
    pub fn new(generator: SharedGenerator) -> Self {
        Self {
            generator,
            validation: ValidationConfig::default(),
            limits: EditConfig::default(),
        }
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_limits(mut self, limits: EditConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_available()
    }

    pub fn generator_info(&self) -> GeneratorInfo {
        self.generator.info()
    }

    pub async fn execute(&self, input: &EditImageInput) -> EditOutcome {
        let timer = logger::timer("edit");
        let request = &input.request;

        let validation_result = request.validate_with(&self.validation);
        if !validation_result.is_valid {
            let error = PixelforgeError::ValidationError(validation_result.errors.clone());
            log::warn!("Rejected edit request {}: {}", request, error);
            return EditOutcome::failed(error, validation_result, request.clone(), None, None);
        }

        let mime = match validate_image_buffer(
            &input.buffer,
            input.mime_type.as_deref(),
            self.limits.max_image_bytes,
        ) {
            Ok(mime) => mime,
            Err(e) => {
                log::warn!(
                    "Rejected {} byte source image for {}: {}",
                    input.buffer.len(),
                    request,
                    e
                );
                return EditOutcome::failed(e.into(), validation_result, request.clone(), None, None);
            }
        };
        let original_image_info = OriginalImageInfo {
            buffer_size: input.buffer.len(),
            mime_type: mime.as_str().to_string(),
        };

        if !self.generator.is_available() {
            log::error!("Generator '{}' is not available", self.generator.info().name);
            return EditOutcome::failed(
                PixelforgeError::ServiceUnavailable,
                validation_result,
                request.clone(),
                Some(original_image_info),
                None,
            );
        }

        let processed_request = request
            .with_sanitized_prompt_with(&self.validation)
            .with_metadata(MetadataUpdate::kind(RequestKind::Edit));

        if processed_request.prompt().is_empty() {
            let validation_result = validation_result.with_error(SANITIZED_PROMPT_EMPTY);
            let error = PixelforgeError::ValidationError(validation_result.errors.clone());
            log::warn!("Rejected edit request {}: {}", request, error);
            return EditOutcome::failed(
                error,
                validation_result,
                processed_request,
                Some(original_image_info),
                None,
            );
        }

        log::info!(
            "Editing {} image ({} bytes) for {}",
            mime,
            input.buffer.len(),
            processed_request
        );
        let reply = self
            .generator
            .edit_image(processed_request.prompt(), &input.buffer, Some(mime.as_str()))
            .await;

        match settle_reply(reply, RAISED_PREFIX, REFUSAL_DEFAULT) {
            Ok(image_result) => {
                log::info!("Image edited in {}ms", timer.elapsed_ms());
                EditOutcome {
                    success: true,
                    image_result: Some(image_result),
                    validation_result,
                    processed_request,
                    original_image_info: Some(original_image_info),
                    error: None,
                    error_kind: None,
                }
            }
            Err(failure) => {
                log::warn!("Image edit did not succeed: {}", failure.error);
                EditOutcome::failed(
                    failure.error,
                    validation_result,
                    processed_request,
                    Some(original_image_info),
                    failure.image_result,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{Reply, ScriptedGenerator};
    use crate::models::{JPEG_SOI, PNG_SIGNATURE};
    use std::sync::Arc;

    const REQUESTER: &str = "123456789012345678";
    const MAX: usize = 25 * 1024 * 1024;

    fn png(len: usize) -> Vec<u8> {
        let mut buffer = PNG_SIGNATURE.to_vec();
        buffer.resize(len.max(PNG_SIGNATURE.len()), 0);
        buffer
    }

    fn request() -> ImageRequest {
        ImageRequest::new("make the sky purple", REQUESTER)
    }

    fn buffer_error(buffer: &[u8], mime: Option<&str>) -> String {
        validate_image_buffer(buffer, mime, MAX)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn png_within_limits_passes() {
        assert_eq!(validate_image_buffer(&png(8), None, MAX), Ok(ImageMimeType::Png));
        assert_eq!(
            validate_image_buffer(&png(MAX), Some("image/png"), MAX),
            Ok(ImageMimeType::Png)
        );
    }

    #[test]
    fn each_deviation_yields_its_own_message() {
        assert_eq!(buffer_error(&[], None), "Invalid image buffer: buffer is empty");
        assert_eq!(
            buffer_error(&PNG_SIGNATURE[..7], None),
            "Image buffer too small to contain valid image headers"
        );
        assert!(buffer_error(&png(MAX + 1), None).contains("Image too large"));
        assert!(buffer_error(&png(16), Some("image/gif"))
            .contains("Unsupported MIME type: image/gif"));

        let mut corrupted = png(16);
        corrupted[7] = 0x00;
        assert_eq!(
            buffer_error(&corrupted, None),
            "Buffer does not contain a valid PNG header"
        );
        assert_eq!(
            buffer_error(&png(16), Some("image/jpeg")),
            "Buffer does not contain a valid JPEG header"
        );
    }

    #[test]
    fn checks_run_in_order() {
        // Oversized and wrong type: size wins.
        let mut big_gif = vec![0u8; MAX + 1];
        big_gif[0] = b'G';
        assert!(buffer_error(&big_gif, Some("image/gif")).contains("Image too large"));

        // Too small and wrong type: size wins.
        assert_eq!(
            buffer_error(&[1, 2, 3], Some("text/plain")),
            "Image buffer too small to contain valid image headers"
        );
    }

    #[test]
    fn jpeg_and_webp_are_sniffed() {
        let mut jpeg = JPEG_SOI.to_vec();
        jpeg.resize(32, 0xAB);
        assert_eq!(
            validate_image_buffer(&jpeg, Some("IMAGE/JPEG"), MAX),
            Ok(ImageMimeType::Jpeg)
        );

        let mut webp = vec![0u8; 32];
        webp[0..4].copy_from_slice(b"RIFF");
        webp[8..12].copy_from_slice(b"WEBP");
        assert_eq!(
            validate_image_buffer(&webp, Some("image/webp"), MAX),
            Ok(ImageMimeType::Webp)
        );
        assert_eq!(
            buffer_error(&png(32), Some("image/webp")),
            "Buffer does not contain a valid WebP header"
        );
    }

    #[tokio::test]
    async fn four_byte_buffer_is_too_small() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image]));
        let use_case = EditImageUseCase::new(generator.clone());

        let outcome = use_case
            .execute(&EditImageInput::new(request(), vec![0x89, 0x50, 0x4E, 0x47]))
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Image buffer too small to contain valid image headers")
        );
        assert_eq!(outcome.error_kind, Some(FailureKind::BufferFormat));
        assert!(outcome.original_image_info.is_none());
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn valid_edit_calls_generator_with_sanitized_prompt() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image]));
        let use_case = EditImageUseCase::new(generator.clone());
        let input = EditImageInput::new(
            ImageRequest::new("  make the <em>sky</em>  purple ", REQUESTER),
            png(64),
        );

        let outcome = use_case.execute(&input).await;

        assert!(outcome.success, "edit failed: {:?}", outcome.error);
        assert_eq!(
            outcome.original_image_info,
            Some(OriginalImageInfo {
                buffer_size: 64,
                mime_type: "image/png".to_string(),
            })
        );
        assert_eq!(
            outcome.processed_request.metadata().unwrap().parsed_kind(),
            Some(RequestKind::Edit)
        );

        let edits = generator.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].prompt, "make the sky purple");
        assert_eq!(edits[0].buffer_len, 64);
        assert_eq!(edits[0].mime_type.as_deref(), Some("image/png"));
        assert_eq!(generator.generate_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_request_is_checked_before_buffer() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image]));
        let outcome = EditImageUseCase::new(generator.clone())
            .execute(&EditImageInput::new(ImageRequest::new("", REQUESTER), Vec::new()))
            .await;

        assert_eq!(outcome.error_kind, Some(FailureKind::Validation));
        assert!(outcome
            .error
            .unwrap()
            .starts_with("Request validation failed: "));
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn size_limit_comes_from_config() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image]));
        let use_case =
            EditImageUseCase::new(generator.clone()).with_limits(EditConfig::new().with_max_image_bytes(32));

        let outcome = use_case.execute(&EditImageInput::new(request(), png(33))).await;
        assert!(outcome.error.unwrap().contains("Image too large"));
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn markup_only_prompt_never_reaches_generator() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image, Reply::Image]));
        let use_case = EditImageUseCase::new(generator.clone());
        let input = EditImageInput::new(ImageRequest::new("<i></i><b></b>", REQUESTER), png(16));

        let outcome = use_case.execute(&input).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Request validation failed: Prompt is empty after sanitization")
        );
        assert_eq!(outcome.error_kind, Some(FailureKind::Validation));
        assert_eq!(outcome.original_image_info.unwrap().buffer_size, 16);
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn generator_failures_keep_image_info() {
        let generator = Arc::new(ScriptedGenerator::new([
            Reply::Raise("request timeout"),
            Reply::RefuseWithoutMessage,
        ]));
        let use_case = EditImageUseCase::new(generator.clone());
        let input = EditImageInput::new(request(), png(16)).with_mime_type("image/png");

        let raised = use_case.execute(&input).await;
        assert_eq!(
            raised.error.as_deref(),
            Some("Image generation failed: AWS error: request timeout")
        );
        assert!(raised.original_image_info.is_some());

        let refused = use_case.execute(&input).await;
        assert_eq!(refused.error.as_deref(), Some("Failed to generate image"));
        assert_eq!(refused.error_kind, Some(FailureKind::GenerationFailure));
    }

    #[tokio::test]
    async fn unavailable_generator_is_checked_after_buffer() {
        let generator = Arc::new(ScriptedGenerator::unavailable());
        let use_case = EditImageUseCase::new(generator.clone());

        let bad_buffer = use_case.execute(&EditImageInput::new(request(), vec![1])).await;
        assert_eq!(bad_buffer.error_kind, Some(FailureKind::BufferFormat));

        let good_buffer = use_case.execute(&EditImageInput::new(request(), png(16))).await;
        assert_eq!(
            good_buffer.error.as_deref(),
            Some("Image generation service is not available")
        );
        assert_eq!(generator.total_calls(), 0);
    }
}
