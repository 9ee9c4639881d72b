use pixelforge::{
    logger::{self, LogLevel, LoggerConfig},
    BedrockConfig, BedrockImageGenerator, Config, EditImageInput, EditImageUseCase,
    GenerateImageUseCase, ImageRequest, MetadataUpdate, RegenerateImageUseCase, RegenerateInput,
    RequestSource, SharedGenerator,
};
use std::{env, fs, sync::Arc};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded"),
        Err(_) => log::warn!("⚠️  No .env file found"),
    }
    logger::init_with_config(LoggerConfig::development().with_level(LogLevel::Debug))?;

    let config = Config::from_env();
    logger::log_config_info(&config);

    let bedrock_config = config.bedrock.clone().unwrap_or_else(BedrockConfig::from_env);
    let generator: SharedGenerator = Arc::new(BedrockImageGenerator::new(bedrock_config).await?);

    let requester = env::var("PIXELFORGE_DEMO_REQUESTER")
        .unwrap_or_else(|_| "123456789012345678".to_string());
    let request = ImageRequest::new(
        "a cute robot watering plants on a sunny balcony, watercolor",
        requester,
    )
    .with_metadata(MetadataUpdate::default().with_source(RequestSource::Command));

    let generate =
        GenerateImageUseCase::new(generator.clone()).with_validation(config.validation.clone());
    let outcome = generate.execute(&request).await;
    let Some(image) = outcome.image_result.filter(|r| r.success) else {
        log::error!("Generation failed: {}", outcome.error.unwrap_or_default());
        return Ok(());
    };
    let buffer = image.buffer.unwrap_or_default();
    fs::write("robot.png", &buffer)?;
    log::info!("🖼️  Saved robot.png ({} bytes)", buffer.len());

    let edit = EditImageUseCase::new(generator.clone())
        .with_validation(config.validation.clone())
        .with_limits(config.edit.clone());
    let edit_request = ImageRequest::new("same robot, night sky with stars", request.requester_id());
    let edited = edit
        .execute(&EditImageInput::new(edit_request, buffer.clone()).with_mime_type("image/png"))
        .await;
    match edited.image_result.and_then(|r| r.buffer) {
        Some(bytes) => {
            fs::write("robot-night.png", &bytes)?;
            log::info!("🖼️  Saved robot-night.png ({} bytes)", bytes.len());
        }
        None => log::warn!("Edit failed: {}", edited.error.unwrap_or_default()),
    }

    let regenerate = RegenerateImageUseCase::new(generator, config.regenerate.clone())
        .with_validation(config.validation.clone())
        .with_edit_limits(config.edit.clone());
    let regenerated = regenerate.execute(RegenerateInput::generate(request)).await;
    log::info!(
        "Regeneration finished in state {} after attempt {}",
        regenerated.state,
        regenerated.attempt_number
    );
    if let Some(bytes) = regenerated.image_result.and_then(|r| r.buffer) {
        fs::write("robot-regenerated.png", &bytes)?;
    }

    Ok(())
}
