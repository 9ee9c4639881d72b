pub mod bedrock;
pub mod config;
pub mod error;
pub mod generator;
pub mod logger;
pub mod models;
pub mod usecases;

pub use bedrock::BedrockImageGenerator;
pub use config::{BedrockConfig, Config, EditConfig, RegenerateConfig, ValidationConfig};
pub use error::{BufferFormatError, FailureKind, PixelforgeError, Result};
pub use generator::{ImageGenerator, SharedGenerator};
pub use models::*;
pub use usecases::{
    EditImageInput, EditImageUseCase, EditOutcome, GenerateImageUseCase, GenerateOutcome,
    RegenerateImageUseCase, RegenerateInput, RegenerateOutcome, RegenerationState,
};
