use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Lower-case fragments that mark a provider rejecting the requested output
/// contract rather than failing outright.
pub const CAPABILITY_MISMATCH_MARKERS: &[&str] = &[
    "response_format",
    "json_schema",
    "structured output",
    "not supported",
    "unsupported",
    "invalid schema",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Output contract requested from the generator.
pub enum OutputContract {
    Strict { name: String, schema: Value },
    FreeText,
}

impl OutputContract {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict { .. } => "strict",
            Self::FreeText => "free",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// User payload: prompt text plus external image references.
pub struct UserContent {
    pub text: String,
    #[serde(default)]
    pub image_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Public struct `GenerationRequest` passed to a [`TextGenerator`].
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user: UserContent,
    pub contract: OutputContract,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `GenerationError` values.
pub enum GenerationError {
    #[error("generation unavailable: {0}")]
    Unavailable(String),
    #[error("generation timed out: {0}")]
    Timeout(String),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
        }
    }

    /// True when the failure reads as "this output contract is not supported".
    pub fn is_capability_mismatch(&self) -> bool {
        let Self::Unavailable(detail) = self else {
            return false;
        };
        let normalized = detail.to_ascii_lowercase();
        CAPABILITY_MISMATCH_MARKERS
            .iter()
            .any(|marker| normalized.contains(marker))
    }
}

/// Text generation capability consumed by the extractor.
pub trait TextGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

impl<F> TextGenerator for F
where
    F: Fn(&GenerationRequest) -> Result<String, GenerationError>,
{
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerationError, GenerationRequest, OutputContract, TextGenerator, UserContent};

    #[test]
    fn unit_capability_mismatch_detects_known_markers_only_on_unavailable() {
        let unsupported = GenerationError::Unavailable(
            "status 400: Invalid parameter: 'response_format' of type 'json_schema' is not supported with this model".to_string(),
        );
        assert!(unsupported.is_capability_mismatch());

        let outage = GenerationError::Unavailable("status 503: upstream overloaded".to_string());
        assert!(!outage.is_capability_mismatch());

        let timeout = GenerationError::Timeout("json_schema request exceeded 120s".to_string());
        assert!(!timeout.is_capability_mismatch());
    }

    #[test]
    fn unit_closures_implement_text_generator() {
        let generator = |request: &GenerationRequest| -> Result<String, GenerationError> {
            Ok(format!("{}:{}", request.contract.as_str(), request.user.text))
        };
        let request = GenerationRequest {
            model: "test-model".to_string(),
            system_prompt: "system".to_string(),
            user: UserContent {
                text: "hello".to_string(),
                image_refs: Vec::new(),
            },
            contract: OutputContract::FreeText,
            max_tokens: None,
            temperature: None,
        };
        assert_eq!(
            generator.generate(&request).expect("generated"),
            "free:hello"
        );
    }
}
