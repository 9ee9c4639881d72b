use crate::{
    config::BedrockConfig,
    error::{PixelforgeError, Result},
    models::{ImageResult, ImageResultMetadata, SafetyDetail, TitanImageResponse},
};
use aws_sdk_bedrockruntime::{error::ProvideErrorMetadata, primitives::Blob, Client};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;

pub const TITAN_MAX_PROMPT_CHARS: usize = 512;

const CONTENT_FILTER_MARKERS: &[&str] = &["content filter", "blocked by our content"];

/// Thin wrapper around Bedrock `InvokeModel` for the Titan image models.
#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    config: BedrockConfig,
}

impl ImageClient {
    pub fn new(client: Client, config: BedrockConfig) -> Self {
        Self { client, config }
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    pub fn supported_models() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            (
                "amazon.titan-image-generator-v1",
                "Titan Image Generator G1",
                "Amazon",
            ),
            (
                "amazon.titan-image-generator-v2:0",
                "Titan Image Generator G1 v2",
                "Amazon",
            ),
        ]
    }

    pub fn is_supported_model(model_id: &str) -> bool {
        Self::supported_models()
            .iter()
            .any(|(id, _, _)| *id == model_id)
    }

    pub async fn generate(&self, prompt: &str) -> Result<ImageResult> {
        let payload = text_to_image_payload(&truncate_prompt(prompt), &self.config);
        self.invoke(payload).await
    }

    pub async fn vary(&self, prompt: &str, source: &[u8]) -> Result<ImageResult> {
        let payload = image_variation_payload(&truncate_prompt(prompt), source, &self.config);
        self.invoke(payload).await
    }

    async fn invoke(&self, payload: Value) -> Result<ImageResult> {
        let model_id = self.config.model_id.as_str();
        let request_json = serde_json::to_string(&payload)
            .map_err(|e| PixelforgeError::SerializationError(e.to_string()))?;

        log::info!("Invoking image model: {}", model_id);
        let started = Instant::now();

        let response = match self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request_json.into_bytes()))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::error!("AWS SDK image invocation error details: {:?}", e);

                if let Some(service_error) = e.as_service_error() {
                    let message = service_error.message().unwrap_or("no message");
                    if is_content_filter_message(message) {
                        return Ok(content_filtered_result(message, model_id));
                    }
                    return Err(PixelforgeError::AwsServiceError(format!(
                        "Bedrock service error: {} - {}",
                        service_error.code().unwrap_or("unknown"),
                        message
                    )));
                }
                return Err(PixelforgeError::AwsError(format!("AWS SDK error: {}", e)));
            }
        };

        let response_bytes = response.body.into_inner();
        let titan_response: TitanImageResponse = serde_json::from_slice(&response_bytes)
            .map_err(|e| PixelforgeError::ResponseError(e.to_string()))?;

        image_result_from_response(titan_response, model_id, started.elapsed().as_millis() as u64)
    }
}

fn truncate_prompt(prompt: &str) -> String {
    if prompt.chars().count() <= TITAN_MAX_PROMPT_CHARS {
        return prompt.to_string();
    }
    log::warn!(
        "Prompt exceeds Titan's {} character limit, truncating",
        TITAN_MAX_PROMPT_CHARS
    );
    prompt.chars().take(TITAN_MAX_PROMPT_CHARS).collect()
}

fn generation_config(config: &BedrockConfig) -> Value {
    json!({
        "numberOfImages": 1,
        "quality": "standard",
        "width": config.width,
        "height": config.height,
        "cfgScale": config.cfg_scale
    })
}

pub(crate) fn text_to_image_payload(prompt: &str, config: &BedrockConfig) -> Value {
    json!({
        "taskType": "TEXT_IMAGE",
        "textToImageParams": {
            "text": prompt
        },
        "imageGenerationConfig": generation_config(config)
    })
}

pub(crate) fn image_variation_payload(prompt: &str, source: &[u8], config: &BedrockConfig) -> Value {
    json!({
        "taskType": "IMAGE_VARIATION",
        "imageVariationParams": {
            "text": prompt,
            "images": [STANDARD.encode(source)]
        },
        "imageGenerationConfig": generation_config(config)
    })
}

pub(crate) fn is_content_filter_message(message: &str) -> bool {
    let message = message.to_lowercase();
    CONTENT_FILTER_MARKERS.iter().any(|m| message.contains(m))
}

pub(crate) fn content_filtered_result(message: &str, model_id: &str) -> ImageResult {
    ImageResult::failure(format!("Image blocked by content safety filters: {}", message))
        .with_metadata(ImageResultMetadata {
            model: Some(model_id.to_string()),
            generated_at: None,
            processing_time_ms: None,
            safety: Some(SafetyDetail {
                filtered: true,
                reason: Some(message.to_string()),
            }),
        })
}

pub(crate) fn image_result_from_response(
    response: TitanImageResponse,
    model_id: &str,
    elapsed_ms: u64,
) -> Result<ImageResult> {
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        if is_content_filter_message(&error) {
            return Ok(content_filtered_result(&error, model_id));
        }
        return Ok(ImageResult::failure(error));
    }

    let encoded = match response.images.into_iter().next() {
        Some(encoded) => encoded,
        None => return Ok(ImageResult::failure("No images generated")),
    };

    let buffer = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| PixelforgeError::ResponseError(format!("Invalid base64 image data: {}", e)))?;

    Ok(ImageResult::success(buffer).with_metadata(ImageResultMetadata {
        model: Some(model_id.to_string()),
        generated_at: Some(Utc::now()),
        processing_time_ms: Some(elapsed_ms),
        safety: Some(SafetyDetail {
            filtered: false,
            reason: None,
        }),
    }))
}
