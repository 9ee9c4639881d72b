use crate::{
    config::{EditConfig, RegenerateConfig, ValidationConfig},
    error::{FailureKind, PixelforgeError},
    generator::SharedGenerator,
    models::{GeneratorInfo, ImageRequest, ImageResult, OperationKind, OriginalImageInfo, ValidationResult},
    usecases::{
        classify_failure, EditImageInput, EditImageUseCase, EditOutcome, FailureClass,
        GenerateImageUseCase, GenerateOutcome,
    },
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerationState {
    Initial,
    Attempting,
    RetryScheduled,
    Succeeded,
    Exhausted,
    Blocked,
}

impl RegenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegenerationState::Succeeded | RegenerationState::Exhausted | RegenerationState::Blocked
        )
    }
}

impl fmt::Display for RegenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegenerationState::Initial => "INITIAL",
            RegenerationState::Attempting => "ATTEMPTING",
            RegenerationState::RetryScheduled => "RETRY_SCHEDULED",
            RegenerationState::Succeeded => "SUCCEEDED",
            RegenerationState::Exhausted => "EXHAUSTED",
            RegenerationState::Blocked => "BLOCKED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegenerationTrigger {
    User,
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationMetadata {
    pub trigger: RegenerationTrigger,
    pub original_image_info: Option<OriginalImageInfo>,
}

#[derive(Clone)]
pub struct RegenerateInput {
    pub operation: OperationKind,
    pub request: ImageRequest,
    pub buffer: Option<Vec<u8>>,
    pub mime_type: Option<String>,
    pub attempt_number: u32,
    pub previous_attempts: Vec<String>,
}

impl RegenerateInput {
    pub fn generate(request: ImageRequest) -> Self {
        Self {
            operation: OperationKind::Generate,
            request,
            buffer: None,
            mime_type: None,
            attempt_number: 1,
            previous_attempts: Vec::new(),
        }
    }

    pub fn edit(request: ImageRequest, buffer: Vec<u8>) -> Self {
        Self {
            operation: OperationKind::Edit,
            buffer: Some(buffer),
            ..Self::generate(request)
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Continues a chain that already used `attempt_number - 1` attempts.
    pub fn resume_from(mut self, attempt_number: u32, previous_attempts: Vec<String>) -> Self {
        self.attempt_number = attempt_number;
        self.previous_attempts = previous_attempts;
        self
    }
}

impl fmt::Debug for RegenerateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegenerateInput")
            .field("operation", &self.operation)
            .field("request", &self.request)
            .field("buffer_len", &self.buffer.as_ref().map(Vec::len))
            .field("mime_type", &self.mime_type)
            .field("attempt_number", &self.attempt_number)
            .field("previous_attempts", &self.previous_attempts)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RegenerateOutcome {
    pub success: bool,
    pub operation_kind: OperationKind,
    pub attempt_number: u32,
    pub previous_attempts: Vec<String>,
    pub state: RegenerationState,
    pub image_result: Option<ImageResult>,
    pub validation_result: Option<ValidationResult>,
    pub processed_request: Option<ImageRequest>,
    pub original_image_info: Option<OriginalImageInfo>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub regeneration_metadata: Option<RegenerationMetadata>,
}

/// Uniform view over one generate or edit attempt.
struct Attempt {
    success: bool,
    image_result: Option<ImageResult>,
    validation_result: ValidationResult,
    processed_request: ImageRequest,
    original_image_info: Option<OriginalImageInfo>,
    error: Option<String>,
    error_kind: Option<FailureKind>,
}

impl From<GenerateOutcome> for Attempt {
    fn from(outcome: GenerateOutcome) -> Self {
        Self {
            success: outcome.success,
            image_result: outcome.image_result,
            validation_result: outcome.validation_result,
            processed_request: outcome.processed_request,
            original_image_info: None,
            error: outcome.error,
            error_kind: outcome.error_kind,
        }
    }
}

impl From<EditOutcome> for Attempt {
    fn from(outcome: EditOutcome) -> Self {
        Self {
            success: outcome.success,
            image_result: outcome.image_result,
            validation_result: outcome.validation_result,
            processed_request: outcome.processed_request,
            original_image_info: outcome.original_image_info,
            error: outcome.error,
            error_kind: outcome.error_kind,
        }
    }
}

/// Repeats a generate or edit operation under the configured retry policy.
///
/// Each attempt delegates exactly once to the generate or edit use case. A
/// failure is retried only when its message is classified retriable, auto
/// retry is on, and `attempt_number <= max_retries`; the wait between
/// attempts is `retry_delay_ms`. Attempts within one call never overlap.
#[derive(Clone)]
pub struct RegenerateImageUseCase {
    generate: GenerateImageUseCase,
    edit: EditImageUseCase,
    config: RegenerateConfig,
}

impl RegenerateImageUseCase {
    pub fn new(generator: SharedGenerator, config: RegenerateConfig) -> Self {
        Self {
            generate: GenerateImageUseCase::new(generator.clone()),
            edit: EditImageUseCase::new(generator),
            config,
        }
    }

    pub fn from_use_cases(
        generate: GenerateImageUseCase,
        edit: EditImageUseCase,
        config: RegenerateConfig,
    ) -> Self {
        Self {
            generate,
            edit,
            config,
        }
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.generate = self.generate.with_validation(validation.clone());
        self.edit = self.edit.with_validation(validation);
        self
    }

    pub fn with_edit_limits(mut self, limits: EditConfig) -> Self {
        self.edit = self.edit.with_limits(limits);
        self
    }

    pub fn config(&self) -> &RegenerateConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        self.generate.is_available()
    }

    pub fn generator_info(&self) -> GeneratorInfo {
        self.generate.generator_info()
    }

    pub async fn execute(&self, input: RegenerateInput) -> RegenerateOutcome {
        let RegenerateInput {
            operation,
            request,
            buffer,
            mime_type,
            attempt_number,
            mut previous_attempts,
        } = input;

        let mut attempt_number = attempt_number.max(1);
        let allowed = self.config.max_retries.saturating_add(1);

        if attempt_number > allowed {
            let error = PixelforgeError::RetriesExhausted { allowed };
            log::warn!(
                "Regenerate {} refused at attempt {}: {}",
                operation.as_str(),
                attempt_number,
                error
            );
            return RegenerateOutcome {
                success: false,
                operation_kind: operation,
                attempt_number,
                previous_attempts,
                state: RegenerationState::Exhausted,
                image_result: None,
                validation_result: None,
                processed_request: None,
                original_image_info: None,
                error: Some(error.to_string()),
                error_kind: Some(error.kind()),
                regeneration_metadata: None,
            };
        }

        let edit_input = match operation {
            OperationKind::Edit => Some(EditImageInput {
                request: request.clone(),
                buffer: buffer.unwrap_or_default(),
                mime_type,
            }),
            OperationKind::Generate => None,
        };

        let mut state = RegenerationState::Initial;
        loop {
            state = self.transition(state, RegenerationState::Attempting, attempt_number);

            let attempt: Attempt = match &edit_input {
                Some(edit_input) => self.edit.execute(edit_input).await.into(),
                None => self.generate.execute(&request).await.into(),
            };

            if attempt.success {
                state = self.transition(state, RegenerationState::Succeeded, attempt_number);
                let trigger = if attempt_number == 1 {
                    RegenerationTrigger::User
                } else {
                    RegenerationTrigger::Automatic
                };
                return RegenerateOutcome {
                    success: true,
                    operation_kind: operation,
                    attempt_number,
                    previous_attempts,
                    state,
                    image_result: attempt.image_result,
                    validation_result: Some(attempt.validation_result),
                    processed_request: Some(attempt.processed_request),
                    original_image_info: attempt.original_image_info.clone(),
                    error: None,
                    error_kind: None,
                    regeneration_metadata: Some(RegenerationMetadata {
                        trigger,
                        original_image_info: attempt.original_image_info,
                    }),
                };
            }

            let message = attempt
                .error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            let class = classify_failure(&message, &self.config.auto_retry_error_types);
            let may_retry = class.is_retriable()
                && self.config.enable_auto_retry
                && attempt_number <= self.config.max_retries;

            previous_attempts.push(message.clone());

            if !may_retry {
                if class == FailureClass::Blocked {
                    log::warn!("Regeneration blocked by safety marker: {}", message);
                }
                state = self.transition(state, RegenerationState::Blocked, attempt_number);
                return RegenerateOutcome {
                    success: false,
                    operation_kind: operation,
                    attempt_number,
                    previous_attempts,
                    state,
                    image_result: attempt.image_result,
                    validation_result: Some(attempt.validation_result),
                    processed_request: Some(attempt.processed_request),
                    original_image_info: attempt.original_image_info,
                    error: Some(message),
                    error_kind: attempt.error_kind,
                    regeneration_metadata: None,
                };
            }

            state = self.transition(state, RegenerationState::RetryScheduled, attempt_number);
            log::info!(
                "Attempt {} of {} failed ({}), retrying in {}ms",
                attempt_number,
                allowed,
                message,
                self.config.retry_delay_ms
            );
            if self.config.retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
            attempt_number += 1;
        }
    }

    fn transition(
        &self,
        from: RegenerationState,
        to: RegenerationState,
        attempt_number: u32,
    ) -> RegenerationState {
        log::debug!("Regeneration {} -> {} (attempt {})", from, to, attempt_number);
        to
    }
}
