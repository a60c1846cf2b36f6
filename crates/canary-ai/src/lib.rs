//! OpenAI-compatible chat completions backend for the summary extractor.

mod openai;
mod retry;

pub use openai::{
    OpenAiGenerator, OpenAiGeneratorConfig, OpenAiSetupError, DEFAULT_OPENAI_API_BASE,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use retry::{next_backoff_ms, should_retry_status, BASE_BACKOFF_MS};
