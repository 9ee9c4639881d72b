use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::ValidationConfig;

const SHORT_PROMPT_WARNING_CHARS: usize = 10;
const LONG_PROMPT_WARNING_CHARS: usize = 500;
const MAX_WORD_REPEATS: usize = 5;
const MAX_FUTURE_SKEW_SECS: i64 = 60;
const MAX_REQUEST_AGE_SECS: i64 = 3600;

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("html tag pattern must compile"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern must compile"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Generate,
    Edit,
    Regenerate,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Generate => "generate",
            RequestKind::Edit => "edit",
            RequestKind::Regenerate => "regenerate",
        }
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(RequestKind::Generate),
            "edit" => Ok(RequestKind::Edit),
            "regenerate" => Ok(RequestKind::Regenerate),
            other => Err(format!("Unknown request kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    Command,
    Button,
    Modal,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::Command => "command",
            RequestSource::Button => "button",
            RequestSource::Modal => "modal",
        }
    }
}

impl FromStr for RequestSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(RequestSource::Command),
            "button" => Ok(RequestSource::Button),
            "modal" => Ok(RequestSource::Modal),
            other => Err(format!("Unknown request source: {}", other)),
        }
    }
}

/// Metadata attached by the presentation layer. `kind` and `source` stay raw so
/// that unexpected values reach validation as warnings instead of parse errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestMetadata {
    pub message_id: Option<String>,
    pub channel_id: Option<String>,
    pub kind: Option<String>,
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl RequestMetadata {
    pub fn parsed_kind(&self) -> Option<RequestKind> {
        self.kind.as_deref().and_then(|k| k.parse().ok())
    }

    pub fn parsed_source(&self) -> Option<RequestSource> {
        self.source.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Partial metadata merged by [`ImageRequest::with_metadata`]. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub message_id: Option<String>,
    pub channel_id: Option<String>,
    pub kind: Option<RequestKind>,
    pub source: Option<RequestSource>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl MetadataUpdate {
    pub fn kind(kind: RequestKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: RequestSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_origin(
        mut self,
        message_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        self.message_id = Some(message_id.into());
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Reported when a prompt that passed validation sanitizes to nothing.
pub const SANITIZED_PROMPT_EMPTY: &str = "Prompt is empty after sanitization";

impl ValidationResult {
    /// Adds a late error found after the initial validation pass.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.is_valid = false;
        self
    }

    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// A user's request to generate or edit an image. Immutable: every update
/// returns a new instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRequest {
    prompt: String,
    requester_id: String,
    group_id: Option<String>,
    requested_at: DateTime<Utc>,
    metadata: Option<RequestMetadata>,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            requester_id: requester_id.into(),
            group_id: None,
            requested_at: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_requested_at(mut self, requested_at: DateTime<Utc>) -> Self {
        self.requested_at = requested_at;
        self
    }

    pub fn with_raw_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn metadata(&self) -> Option<&RequestMetadata> {
        self.metadata.as_ref()
    }

    pub fn validate(&self) -> ValidationResult {
        self.validate_with(&ValidationConfig::default())
    }

    pub fn validate_with(&self, config: &ValidationConfig) -> ValidationResult {
        self.validate_at(config, Utc::now())
    }

    pub(crate) fn validate_at(&self, config: &ValidationConfig, now: DateTime<Utc>) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_prompt(config, &mut errors, &mut warnings);

        if !is_numeric_id(&self.requester_id) {
            errors.push("Invalid requester ID format".to_string());
        }

        match self.group_id.as_deref() {
            Some(group_id) if !is_numeric_id(group_id) => {
                errors.push("Invalid group ID format".to_string());
            }
            Some(_) => {}
            None if config.allow_direct_messages => {
                warnings.push("Request was made in a direct message".to_string());
            }
            None => errors.push("Direct message requests are not allowed".to_string()),
        }

        let ahead = self.requested_at - now;
        if ahead > Duration::seconds(MAX_FUTURE_SKEW_SECS) {
            warnings.push("Request timestamp is in the future (possible clock skew)".to_string());
        } else if -ahead > Duration::seconds(MAX_REQUEST_AGE_SECS) {
            warnings.push("Request timestamp is more than an hour old".to_string());
        }

        if let Some(metadata) = &self.metadata {
            if let Some(Err(reason)) = metadata.kind.as_deref().map(RequestKind::from_str) {
                warnings.push(reason);
            }
            if let Some(Err(reason)) = metadata.source.as_deref().map(RequestSource::from_str) {
                warnings.push(reason);
            }
        }

        ValidationResult::from_findings(errors, warnings)
    }

    fn check_prompt(
        &self,
        config: &ValidationConfig,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let trimmed = self.prompt.trim();
        if trimmed.is_empty() {
            errors.push("Prompt cannot be empty".to_string());
            return;
        }

        let length = trimmed.chars().count();
        if length < config.min_prompt_length {
            errors.push(format!(
                "Prompt must be at least {} characters long",
                config.min_prompt_length
            ));
        }
        if length > config.max_prompt_length {
            errors.push(format!(
                "Prompt must be no more than {} characters long",
                config.max_prompt_length
            ));
        }

        if config.banned_patterns.iter().any(|re| re.is_match(&self.prompt)) {
            errors.push("Prompt contains prohibited content".to_string());
        }

        if length < SHORT_PROMPT_WARNING_CHARS {
            warnings.push("Prompt is very short; more detail usually gives better results".to_string());
        }
        if length > LONG_PROMPT_WARNING_CHARS {
            warnings.push("Prompt is very long and may be truncated by the generator".to_string());
        }

        for (word, count) in repeated_words(trimmed) {
            warnings.push(format!("Word '{}' is repeated {} times", word, count));
        }
    }

    pub fn sanitize_prompt(&self) -> String {
        self.sanitize_prompt_with(&ValidationConfig::default())
    }

    pub fn sanitize_prompt_with(&self, config: &ValidationConfig) -> String {
        sanitize_text(&self.prompt, &config.banned_patterns)
    }

    pub fn with_sanitized_prompt(&self) -> ImageRequest {
        self.with_sanitized_prompt_with(&ValidationConfig::default())
    }

    pub fn with_sanitized_prompt_with(&self, config: &ValidationConfig) -> ImageRequest {
        ImageRequest {
            prompt: self.sanitize_prompt_with(config),
            ..self.clone()
        }
    }

    /// Returns a copy whose metadata has `update` merged over the current values.
    pub fn with_metadata(&self, update: MetadataUpdate) -> ImageRequest {
        let mut metadata = self.metadata.clone().unwrap_or_default();
        if let Some(message_id) = update.message_id {
            metadata.message_id = Some(message_id);
        }
        if let Some(channel_id) = update.channel_id {
            metadata.channel_id = Some(channel_id);
        }
        if let Some(kind) = update.kind {
            metadata.kind = Some(kind.as_str().to_string());
        }
        if let Some(source) = update.source {
            metadata.source = Some(source.as_str().to_string());
        }
        metadata.extra.extend(update.extra);

        ImageRequest {
            metadata: Some(metadata),
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImageRequest(requester={}, group={}, prompt_chars={})",
            self.requester_id,
            self.group_id.as_deref().unwrap_or("dm"),
            self.prompt.chars().count()
        )
    }
}

fn is_numeric_id(id: &str) -> bool {
    (17..=19).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

/// Words occurring more than the allowed number of times, in first-seen order.
fn repeated_words(text: &str) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for raw in text.split_whitespace() {
        let word = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.is_empty() {
            continue;
        }
        let count = counts.entry(word.clone()).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter_map(|word| {
            let count = counts[&word];
            (count > MAX_WORD_REPEATS).then_some((word, count))
        })
        .collect()
}

/// Runs the sanitization pass until it reaches a fixed point, so that removals
/// which expose new matches are cleaned up as well.
pub fn sanitize_text(text: &str, banned_patterns: &[Regex]) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = sanitize_pass(&current, banned_patterns);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_pass(text: &str, banned_patterns: &[Regex]) -> String {
    let mut cleaned = text.to_string();
    for pattern in banned_patterns {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    let cleaned = HTML_TAG.replace_all(&cleaned, "");
    let cleaned: String = cleaned.chars().filter(|c| *c != '<' && *c != '>').collect();
    let cleaned = WHITESPACE_RUN.replace_all(&cleaned, " ");

    cleaned
        .trim()
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}
