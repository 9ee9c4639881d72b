pub mod edit;
pub mod generate;
pub mod regenerate;
pub mod retry;

pub use edit::{validate_image_buffer, EditImageInput, EditImageUseCase, EditOutcome};
pub use generate::{GenerateImageUseCase, GenerateOutcome};
pub use regenerate::{
    RegenerateImageUseCase, RegenerateInput, RegenerateOutcome, RegenerationMetadata,
    RegenerationState, RegenerationTrigger,
};
pub use retry::{classify_failure, FailureClass, NON_RETRIABLE_MARKERS};

use crate::{
    error::{PixelforgeError, Result},
    models::ImageResult,
};

/// Prefix for errors raised by the generator, shared by generate and edit.
pub(crate) const RAISED_PREFIX: &str = "Image generation failed";
/// Message for a structured refusal that carries no text of its own.
pub(crate) const REFUSAL_DEFAULT: &str = "Failed to generate image";

/// A generator reply that did not produce an image.
pub(crate) struct AttemptFailure {
    pub error: PixelforgeError,
    pub image_result: Option<ImageResult>,
}

/// Normalizes a generator reply: a raised error gets `raised_prefix`, a
/// structured refusal without a message gets `refusal_default`.
pub(crate) fn settle_reply(
    reply: Result<ImageResult>,
    raised_prefix: &'static str,
    refusal_default: &str,
) -> std::result::Result<ImageResult, AttemptFailure> {
    match reply {
        Ok(result) if result.success => Ok(result),
        Ok(result) => {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| refusal_default.to_string());
            Err(AttemptFailure {
                error: PixelforgeError::GenerationFailure(message),
                image_result: Some(result),
            })
        }
        Err(e) => Err(AttemptFailure {
            error: PixelforgeError::Unexpected {
                prefix: raised_prefix,
                message: e.to_string(),
            },
            image_result: None,
        }),
    }
}
