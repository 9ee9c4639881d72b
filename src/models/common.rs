use serde::{Deserialize, Serialize};

/// Capability metadata reported by an image generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratorInfo {
    pub name: String,
    pub version: Option<String>,
    pub supported_formats: Option<Vec<String>>,
    pub max_prompt_length: Option<usize>,
}

impl GeneratorInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_supported_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_prompt_length(mut self, max: usize) -> Self {
        self.max_prompt_length = Some(max);
        self
    }
}

/// Which single-shot operation a regeneration repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Generate,
    Edit,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Generate => "generate",
            OperationKind::Edit => "edit",
        }
    }
}
