use crate::error::{PixelforgeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;

pub const DEFAULT_MIN_PROMPT_LENGTH: usize = 1;
pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 1000;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_TITAN_MODEL: &str = "amazon.titan-image-generator-v1";

const DEFAULT_BANNED_PATTERN_SOURCES: &[&str] = &[
    r"(?is)<script\b[^>]*>.*?</script\s*>",
    r"(?i)</?script\b[^>]*>?",
    r"(?i)javascript\s*:",
    r"(?i)vbscript\s*:",
    r"(?i)\bdata\s*:\s*[a-z]+/[a-z0-9.+-]+",
    r"(?i)\bon[a-z]+\s*=",
];

static DEFAULT_BANNED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_BANNED_PATTERN_SOURCES
        .iter()
        .map(|source| Regex::new(source).expect("built-in banned pattern must compile"))
        .collect()
});

const DEFAULT_AUTO_RETRY_ERROR_TYPES: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "network",
    "temporarily unavailable",
    "service unavailable",
    "internal server error",
    "throttl",
    "econnreset",
    "socket hang up",
];

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub min_prompt_length: usize,
    pub max_prompt_length: usize,
    pub banned_patterns: Vec<Regex>,
    pub allow_direct_messages: bool,
}

#[derive(Debug, Clone)]
pub struct EditConfig {
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RegenerateConfig {
    pub max_retries: u32,
    pub enable_auto_retry: bool,
    pub auto_retry_error_types: Vec<String>,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub model_id: String,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub edit: EditConfig,
    pub regenerate: RegenerateConfig,
    pub bedrock: Option<BedrockConfig>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            min_prompt_length: DEFAULT_MIN_PROMPT_LENGTH,
            max_prompt_length: DEFAULT_MAX_PROMPT_LENGTH,
            banned_patterns: DEFAULT_BANNED_PATTERNS.clone(),
            allow_direct_messages: true,
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let min_prompt_length = env_parse("PIXELFORGE_MIN_PROMPT_LENGTH")
            .unwrap_or(defaults.min_prompt_length);
        let max_prompt_length = env_parse("PIXELFORGE_MAX_PROMPT_LENGTH")
            .unwrap_or(defaults.max_prompt_length);
        let allow_direct_messages =
            env_flag("PIXELFORGE_ALLOW_DMS").unwrap_or(defaults.allow_direct_messages);

        ValidationConfig {
            min_prompt_length,
            max_prompt_length,
            allow_direct_messages,
            ..defaults
        }
    }

    pub fn with_prompt_length(mut self, min: usize, max: usize) -> Self {
        self.min_prompt_length = min;
        self.max_prompt_length = max;
        self
    }

    pub fn with_direct_messages(mut self, allowed: bool) -> Self {
        self.allow_direct_messages = allowed;
        self
    }

    /// Replaces the banned pattern set. Fails on the first pattern that does not compile.
    pub fn with_banned_patterns<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.banned_patterns = patterns
            .into_iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    PixelforgeError::ConfigError(format!(
                        "Invalid banned pattern '{}': {}",
                        p.as_ref(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        EditConfig {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl EditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        EditConfig {
            max_image_bytes: env_parse("PIXELFORGE_MAX_IMAGE_BYTES")
                .unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
        }
    }

    pub fn with_max_image_bytes(mut self, max: usize) -> Self {
        self.max_image_bytes = max;
        self
    }
}

impl Default for RegenerateConfig {
    fn default() -> Self {
        RegenerateConfig {
            max_retries: DEFAULT_MAX_RETRIES,
            enable_auto_retry: true,
            auto_retry_error_types: DEFAULT_AUTO_RETRY_ERROR_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RegenerateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_retries = env_parse("PIXELFORGE_MAX_RETRIES").unwrap_or(defaults.max_retries);
        let enable_auto_retry =
            env_flag("PIXELFORGE_AUTO_RETRY").unwrap_or(defaults.enable_auto_retry);
        let retry_delay_ms =
            env_parse("PIXELFORGE_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms);
        let auto_retry_error_types = env::var("PIXELFORGE_AUTO_RETRY_ERRORS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.auto_retry_error_types);

        RegenerateConfig {
            max_retries,
            enable_auto_retry,
            auto_retry_error_types,
            retry_delay_ms,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_auto_retry(mut self, enabled: bool) -> Self {
        self.enable_auto_retry = enabled;
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_auto_retry_error_types<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auto_retry_error_types = markers.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for BedrockConfig {
    fn default() -> Self {
        BedrockConfig {
            region: None,
            access_key: None,
            secret_key: None,
            model_id: DEFAULT_TITAN_MODEL.to_string(),
            width: 1024,
            height: 1024,
            cfg_scale: 8.0,
        }
    }
}

impl BedrockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let region = env::var("AWS_REGION")
            .or_else(|_| env::var("AWS_DEFAULT_REGION"))
            .ok();
        let access_key = env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let model_id = env::var("PIXELFORGE_BEDROCK_MODEL")
            .unwrap_or_else(|_| DEFAULT_TITAN_MODEL.to_string());

        BedrockConfig {
            region,
            access_key,
            secret_key,
            model_id,
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let use_bedrock = env_flag("USE_BEDROCK").unwrap_or(false);

        Config {
            validation: ValidationConfig::from_env(),
            edit: EditConfig::from_env(),
            regenerate: RegenerateConfig::from_env(),
            bedrock: use_bedrock.then(BedrockConfig::from_env),
        }
    }

    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validation = config;
        self
    }

    pub fn with_edit(mut self, config: EditConfig) -> Self {
        self.edit = config;
        self
    }

    pub fn with_regenerate(mut self, config: RegenerateConfig) -> Self {
        self.regenerate = config;
        self
    }

    pub fn with_bedrock(mut self, config: BedrockConfig) -> Self {
        self.bedrock = Some(config);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|val| matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}
