//! Failure classification for the regenerate loop.
//!
//! Classification works on the human-readable failure text: a message is
//! retriable when it contains one of the configured markers, compared
//! case-insensitively. Messages that mention content-safety blocking are
//! terminal no matter what the configuration says.

use serde::{Deserialize, Serialize};

/// Markers that always end a regeneration chain.
pub const NON_RETRIABLE_MARKERS: &[&str] = &[
    "safety",
    "blocked",
    "content policy",
    "content filter",
    "prohibited",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Matches a configured auto-retry marker.
    Retriable,
    /// Matches nothing; not worth repeating automatically.
    NotRetriable,
    /// Matches a reserved safety marker; never retried.
    Blocked,
}

impl FailureClass {
    pub fn is_retriable(&self) -> bool {
        matches!(self, FailureClass::Retriable)
    }
}

pub fn classify_failure<S: AsRef<str>>(message: &str, retry_markers: &[S]) -> FailureClass {
    let message = message.to_lowercase();

    if NON_RETRIABLE_MARKERS.iter().any(|m| message.contains(m)) {
        return FailureClass::Blocked;
    }

    let retriable = retry_markers
        .iter()
        .map(|m| m.as_ref().trim().to_lowercase())
        .any(|m| !m.is_empty() && message.contains(&m));

    if retriable {
        FailureClass::Retriable
    } else {
        FailureClass::NotRetriable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_match_case_insensitively() {
        let markers = ["Timeout", "rate limit"];
        assert_eq!(
            classify_failure("Image generation failed: request TIMEOUT", &markers),
            FailureClass::Retriable
        );
        assert_eq!(
            classify_failure("Rate Limit exceeded, slow down", &markers),
            FailureClass::Retriable
        );
        assert_eq!(
            classify_failure("Model not found", &markers),
            FailureClass::NotRetriable
        );
    }

    #[test]
    fn safety_markers_override_retry_markers() {
        let markers = ["timeout", "blocked"];
        assert_eq!(
            classify_failure("Image blocked by content safety filters (timeout)", &markers),
            FailureClass::Blocked
        );
        assert!(!FailureClass::Blocked.is_retriable());
    }

    #[test]
    fn empty_markers_never_match() {
        let markers = ["", "   "];
        assert_eq!(
            classify_failure("anything at all", &markers),
            FailureClass::NotRetriable
        );
        let none: [&str; 0] = [];
        assert_eq!(classify_failure("timeout", &none), FailureClass::NotRetriable);
    }
}
