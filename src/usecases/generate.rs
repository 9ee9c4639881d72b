use crate::{
    config::ValidationConfig,
    error::{FailureKind, PixelforgeError},
    generator::SharedGenerator,
    logger,
    models::{
        GeneratorInfo, ImageRequest, ImageResult, MetadataUpdate, RequestKind, ValidationResult,
        SANITIZED_PROMPT_EMPTY,
    },
    usecases::{settle_reply, RAISED_PREFIX, REFUSAL_DEFAULT},
};

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub success: bool,
    pub image_result: Option<ImageResult>,
    pub validation_result: ValidationResult,
    pub processed_request: ImageRequest,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl GenerateOutcome {
    fn failed(
        error: PixelforgeError,
        validation_result: ValidationResult,
        processed_request: ImageRequest,
        image_result: Option<ImageResult>,
    ) -> Self {
        Self {
            success: false,
            image_result,
            validation_result,
            processed_request,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}

/// Validates, sanitizes and runs a single text-to-image generation.
#[derive(Clone)]
pub struct GenerateImageUseCase {
    generator: SharedGenerator,
    validation: ValidationConfig,
}

impl GenerateImageUseCase {
    pub fn new(generator: SharedGenerator) -> Self {
        Self {
            generator,
            validation: ValidationConfig::default(),
        }
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_available()
    }

    pub fn generator_info(&self) -> GeneratorInfo {
        self.generator.info()
    }

    pub async fn execute(&self, request: &ImageRequest) -> GenerateOutcome {
        let timer = logger::timer("generate");

        let validation_result = request.validate_with(&self.validation);
        for warning in &validation_result.warnings {
            log::debug!("Generate request warning for {}: {}", request, warning);
        }
        if !validation_result.is_valid {
            let error = PixelforgeError::ValidationError(validation_result.errors.clone());
            log::warn!("Rejected generate request {}: {}", request, error);
            return GenerateOutcome::failed(error, validation_result, request.clone(), None);
        }

        if !self.generator.is_available() {
            log::error!("Generator '{}' is not available", self.generator.info().name);
            return GenerateOutcome::failed(
                PixelforgeError::ServiceUnavailable,
                validation_result,
                request.clone(),
                None,
            );
        }

        let processed_request = request
            .with_sanitized_prompt_with(&self.validation)
            .with_metadata(MetadataUpdate::kind(RequestKind::Generate));

        if processed_request.prompt().is_empty() {
            let validation_result = validation_result.with_error(SANITIZED_PROMPT_EMPTY);
            let error = PixelforgeError::ValidationError(validation_result.errors.clone());
            log::warn!("Rejected generate request {}: {}", request, error);
            return GenerateOutcome::failed(error, validation_result, processed_request, None);
        }

        log::info!("Generating image for {}", processed_request);
        let reply = self.generator.generate_image(processed_request.prompt()).await;

        match settle_reply(reply, RAISED_PREFIX, REFUSAL_DEFAULT) {
            Ok(image_result) => {
                log::info!("Image generated in {}ms", timer.elapsed_ms());
                GenerateOutcome {
                    success: true,
                    image_result: Some(image_result),
                    validation_result,
                    processed_request,
                    error: None,
                    error_kind: None,
                }
            }
            Err(failure) => {
                log::warn!("Image generation did not succeed: {}", failure.error);
                GenerateOutcome::failed(
                    failure.error,
                    validation_result,
                    processed_request,
                    failure.image_result,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{Reply, ScriptedGenerator, FAKE_IMAGE};
    use crate::models::RequestSource;
    use std::sync::Arc;

    const REQUESTER: &str = "123456789012345678";

    fn use_case(generator: &Arc<ScriptedGenerator>) -> GenerateImageUseCase {
        GenerateImageUseCase::new(generator.clone())
    }

    #[tokio::test]
    async fn cute_robot_is_generated() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image]));
        let request = ImageRequest::new("a cute robot", REQUESTER);

        let outcome = use_case(&generator).execute(&request).await;

        assert!(outcome.success);
        assert!(outcome.error.is_none());
        let image = outcome.image_result.unwrap();
        assert!(image.success);
        assert_eq!(image.buffer.as_deref(), Some(FAKE_IMAGE));
        assert_eq!(
            outcome.processed_request.metadata().unwrap().parsed_kind(),
            Some(RequestKind::Generate)
        );
        assert_eq!(generator.generate_calls(), 1);
    }

    #[tokio::test]
    async fn empty_prompt_never_reaches_generator() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image, Reply::Image]));
        let request = ImageRequest::new("", REQUESTER);

        let outcome = use_case(&generator).execute(&request).await;

        assert!(!outcome.success);
        assert!(!outcome.validation_result.is_valid);
        assert!(outcome
            .validation_result
            .errors
            .contains(&"Prompt cannot be empty".to_string()));
        assert_eq!(
            outcome.error.as_deref(),
            Some("Request validation failed: Prompt cannot be empty")
        );
        assert_eq!(outcome.error_kind, Some(FailureKind::Validation));
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_generator_is_reported() {
        let generator = Arc::new(ScriptedGenerator::unavailable());
        let outcome = use_case(&generator)
            .execute(&ImageRequest::new("a cute robot", REQUESTER))
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Image generation service is not available")
        );
        assert_eq!(outcome.error_kind, Some(FailureKind::ServiceUnavailable));
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn sanitized_prompt_is_sent_and_source_preserved() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image]));
        let request = ImageRequest::new("  a <b>shiny</b>   robot  ", REQUESTER).with_metadata(
            MetadataUpdate::default()
                .with_source(RequestSource::Button)
                .with_origin("111111111111111111", "222222222222222222"),
        );

        let outcome = use_case(&generator).execute(&request).await;

        assert!(outcome.success);
        assert_eq!(generator.prompts(), vec!["a shiny robot".to_string()]);
        assert_eq!(outcome.processed_request.prompt(), "a shiny robot");
        let meta = outcome.processed_request.metadata().unwrap();
        assert_eq!(meta.parsed_source(), Some(RequestSource::Button));
        assert_eq!(meta.message_id.as_deref(), Some("111111111111111111"));
        assert_eq!(request.prompt(), "  a <b>shiny</b>   robot  ");
    }

    #[tokio::test]
    async fn raised_errors_are_wrapped() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Raise("socket hang up")]));
        let outcome = use_case(&generator)
            .execute(&ImageRequest::new("a cute robot", REQUESTER))
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Image generation failed: AWS error: socket hang up")
        );
        assert_eq!(outcome.error_kind, Some(FailureKind::Unexpected));
        assert!(outcome.image_result.is_none());
    }

    #[tokio::test]
    async fn structured_failures_are_propagated() {
        let generator = Arc::new(ScriptedGenerator::new([
            Reply::Refuse("Model overloaded"),
            Reply::RefuseWithoutMessage,
        ]));
        let use_case = use_case(&generator);
        let request = ImageRequest::new("a cute robot", REQUESTER);

        let first = use_case.execute(&request).await;
        assert!(!first.success);
        assert_eq!(first.error.as_deref(), Some("Model overloaded"));
        assert_eq!(first.error_kind, Some(FailureKind::GenerationFailure));
        assert!(!first.image_result.unwrap().success);

        let second = use_case.execute(&request).await;
        assert_eq!(second.error.as_deref(), Some("Failed to generate image"));
        assert!(second.image_result.is_some());
    }

    #[tokio::test]
    async fn markup_only_prompt_never_reaches_generator() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image, Reply::Image]));
        let request = ImageRequest::new("<b></b>", REQUESTER);

        let outcome = use_case(&generator).execute(&request).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Request validation failed: Prompt is empty after sanitization")
        );
        assert_eq!(outcome.error_kind, Some(FailureKind::Validation));
        assert!(!outcome.validation_result.is_valid);
        assert_eq!(outcome.processed_request.prompt(), "");
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn pass_through_accessors() {
        let generator = Arc::new(ScriptedGenerator::new([Reply::Image, Reply::Image]));
        let use_case = use_case(&generator);
        assert!(use_case.is_available());
        assert_eq!(use_case.generator_info().name, "scripted");
    }
}
