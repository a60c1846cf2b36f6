use crate::prompt::DEFAULT_SYSTEM_PROMPT;

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_MAX_ACTION_ITEMS: usize = 20;
pub const DEFAULT_ERROR_SUMMARY: &str = "Error: Could not process AI response.";
pub const DEFAULT_ERROR_SOLUTION: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
/// Tunables injected into an [`crate::Extractor`] at construction.
pub struct ExtractorConfig {
    pub model: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Cap on list items recovered from unstructured free text.
    pub max_action_items: usize,
    pub max_image_refs: usize,
    pub max_content_chars: usize,
    pub schema_name: String,
    pub system_prompt: String,
    pub error_summary: String,
    pub error_solution: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: Some(1_024),
            temperature: Some(0.2),
            max_action_items: DEFAULT_MAX_ACTION_ITEMS,
            max_image_refs: 4,
            max_content_chars: 12_000,
            schema_name: "ticket_summary".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            error_summary: DEFAULT_ERROR_SUMMARY.to_string(),
            error_solution: DEFAULT_ERROR_SOLUTION.to_string(),
        }
    }
}
