use crate::{
    error::Result,
    models::{GeneratorInfo, ImageResult},
};
use async_trait::async_trait;

/// Capability to create or edit images from a text prompt.
///
/// Implementations are shared between concurrent callers and must be safe to
/// invoke from several tasks at once. An `Err` means the generator raised; a
/// structured refusal is an `Ok` result with `success == false`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn is_available(&self) -> bool;

    async fn generate_image(&self, prompt: &str) -> Result<ImageResult>;

    async fn edit_image(
        &self,
        prompt: &str,
        buffer: &[u8],
        mime_type: Option<&str>,
    ) -> Result<ImageResult>;

    fn info(&self) -> GeneratorInfo;
}
