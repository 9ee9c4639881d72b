pub mod image_client;

use crate::{
    config::BedrockConfig,
    error::{PixelforgeError, Result},
    generator::ImageGenerator,
    models::{GeneratorInfo, ImageMimeType, ImageResult, DEFAULT_MIME_TYPE},
};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::{config::BehaviorVersion, Client};

pub use image_client::{ImageClient, TITAN_MAX_PROMPT_CHARS};

const TITAN_SOURCE_FORMATS: [ImageMimeType; 2] = [ImageMimeType::Png, ImageMimeType::Jpeg];

/// `ImageGenerator` backed by an Amazon Titan image model on Bedrock.
#[derive(Clone)]
pub struct BedrockImageGenerator {
    image_client: ImageClient,
}

impl BedrockImageGenerator {
    pub async fn new(bedrock_config: BedrockConfig) -> Result<Self> {
        check_model(&bedrock_config.model_id)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &bedrock_config.region {
            loader = loader.region(aws_sdk_bedrockruntime::config::Region::new(region.clone()));
        }
        if let (Some(access_key), Some(secret_key)) =
            (&bedrock_config.access_key, &bedrock_config.secret_key)
        {
            loader = loader.credentials_provider(aws_sdk_bedrockruntime::config::Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "pixelforge",
            ));
        }
        let aws_config = loader.load().await;

        log::info!(
            "Bedrock image generator ready (model: {})",
            bedrock_config.model_id
        );
        Ok(Self::from_client(Client::new(&aws_config), bedrock_config))
    }

    /// Wraps an already configured SDK client. The model id is not checked.
    pub fn from_client(client: Client, bedrock_config: BedrockConfig) -> Self {
        Self {
            image_client: ImageClient::new(client, bedrock_config),
        }
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }
}

fn check_model(model_id: &str) -> Result<()> {
    if ImageClient::is_supported_model(model_id) {
        return Ok(());
    }
    let supported: Vec<&str> = ImageClient::supported_models()
        .iter()
        .map(|(id, _, _)| *id)
        .collect();
    Err(PixelforgeError::ConfigError(format!(
        "Unsupported image model '{}'. Supported models: {}",
        model_id,
        supported.join(", ")
    )))
}

#[async_trait]
impl ImageGenerator for BedrockImageGenerator {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageResult> {
        self.image_client.generate(prompt).await
    }

    async fn edit_image(
        &self,
        prompt: &str,
        buffer: &[u8],
        mime_type: Option<&str>,
    ) -> Result<ImageResult> {
        let mime = mime_type.unwrap_or(DEFAULT_MIME_TYPE);
        match ImageMimeType::parse(mime) {
            Some(format) if TITAN_SOURCE_FORMATS.contains(&format) => {
                self.image_client.vary(prompt, buffer).await
            }
            _ => Ok(ImageResult::failure(format!(
                "Titan image variation does not accept {} source images",
                mime
            ))),
        }
    }

    fn info(&self) -> GeneratorInfo {
        GeneratorInfo::new(self.image_client.model_id())
            .with_version("bedrock")
            .with_supported_formats(TITAN_SOURCE_FORMATS.iter().map(|f| f.as_str()))
            .with_max_prompt_length(TITAN_MAX_PROMPT_CHARS)
    }
}
