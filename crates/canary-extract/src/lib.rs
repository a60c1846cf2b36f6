//! Resilient summary extraction for canonical tickets.
//!
//! A ticket is summarized by asking a [`TextGenerator`] for strictly structured
//! output, then degrading through free-text parsing and line heuristics when
//! the generator does not honor that contract. Extraction never fails; the
//! resulting [`Summary::provenance`] records which stage produced it.

pub mod cascade;
pub mod config;
pub mod generator;
pub mod heuristic;
pub mod payload;
pub mod prompt;
pub mod render;
pub mod summary;

pub use cascade::{
    extract_summary, is_valid_strict_summary, CascadeState, Extractor, FailureReason,
    FallbackReason, MODEL_ERROR_PREFIX,
};
pub use config::{
    ExtractorConfig, DEFAULT_ERROR_SOLUTION, DEFAULT_ERROR_SUMMARY, DEFAULT_MAX_ACTION_ITEMS,
    DEFAULT_MODEL,
};
pub use generator::{
    GenerationError, GenerationRequest, OutputContract, TextGenerator, UserContent,
    CAPABILITY_MISMATCH_MARKERS,
};
pub use heuristic::{extract_action_items, strip_list_marker, BULLET_MARKERS};
pub use payload::{
    extract_json_payload, parse_structured_summary, strict_output_schema, StructuredSummary,
    SUMMARY_FIELD_SYNONYMS,
};
pub use prompt::{build_user_content, DEFAULT_SYSTEM_PROMPT};
pub use render::{render_comment_html, render_summary_markdown};
pub use summary::{Provenance, Summary};
