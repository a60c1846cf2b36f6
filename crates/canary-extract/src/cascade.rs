//! Linear extraction cascade from strict structured output down to heuristics.
//!
//! Stages only move forward: `SchemaAttempt` -> `FreeTextAttempt` ->
//! `Heuristic`, with `Failed` reachable from the free-text stage. Every run
//! ends in exactly one terminal summary whose provenance names the stage that
//! produced it.

use canary_ticket::Ticket;

use crate::config::ExtractorConfig;
use crate::generator::{GenerationError, GenerationRequest, OutputContract, TextGenerator, UserContent};
use crate::heuristic::extract_action_items;
use crate::payload::{parse_structured_summary, strict_output_schema, StructuredSummary};
use crate::prompt::build_user_content;
use crate::summary::{Provenance, Summary};

/// Literal prefix that marks a model-authored error instead of a summary.
pub const MODEL_ERROR_PREFIX: &str = "Error";

#[derive(Debug, Clone, PartialEq)]
/// Why the schema-validated stage handed over to the free-text stage.
pub enum FallbackReason {
    ContractUnsupported(GenerationError),
    GenerationFailed(GenerationError),
    InvalidOutput(String),
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContractUnsupported(_) => "contract_unsupported",
            Self::GenerationFailed(_) => "generation_failed",
            Self::InvalidOutput(_) => "invalid_output",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Why the cascade ended in the error summary.
pub enum FailureReason {
    Generation(GenerationError),
    EmptyResponse,
    ModelReportedError(String),
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation(error) => error.kind(),
            Self::EmptyResponse => "empty_response",
            Self::ModelReportedError(_) => "model_reported_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Named cascade states; transitions never move to an earlier state.
pub enum CascadeState {
    SchemaAttempt,
    FreeTextAttempt(FallbackReason),
    Heuristic(String),
    Failed(FailureReason),
    Done(Summary),
}

impl CascadeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaAttempt => "schema_attempt",
            Self::FreeTextAttempt(_) => "free_text_attempt",
            Self::Heuristic(_) => "heuristic",
            Self::Failed(_) => "failed",
            Self::Done(_) => "done",
        }
    }

    /// Position in the cascade; a transition always increases it.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::SchemaAttempt => 0,
            Self::FreeTextAttempt(_) => 1,
            Self::Heuristic(_) | Self::Failed(_) => 2,
            Self::Done(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Resilient summary extractor for canonical tickets.
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Runs the cascade once for `ticket`. Never fails; degradation is
    /// reported through [`Summary::provenance`].
    pub fn extract(&self, ticket: &Ticket, generator: &dyn TextGenerator) -> Summary {
        let user = build_user_content(
            ticket,
            self.config.max_content_chars,
            self.config.max_image_refs,
        );
        let mut state = CascadeState::SchemaAttempt;
        loop {
            let from = state.ordinal();
            let next = match state {
                CascadeState::SchemaAttempt => self.schema_attempt(ticket, &user, generator),
                CascadeState::FreeTextAttempt(reason) => {
                    self.free_text_attempt(ticket, &user, generator, reason)
                }
                CascadeState::Heuristic(text) => CascadeState::Done(self.heuristic_summary(&text)),
                CascadeState::Failed(reason) => {
                    tracing::warn!(
                        ticket_id = ticket.id(),
                        reason = reason.as_str(),
                        detail = ?reason,
                        "summary extraction failed; returning placeholder"
                    );
                    CascadeState::Done(self.error_summary())
                }
                CascadeState::Done(summary) => {
                    tracing::debug!(
                        ticket_id = ticket.id(),
                        provenance = summary.provenance.as_str(),
                        action_items = summary.action_items.len(),
                        "summary extraction finished"
                    );
                    return summary;
                }
            };
            debug_assert!(next.ordinal() > from, "cascade moved backwards");
            state = next;
        }
    }

    fn request(&self, user: &UserContent, contract: OutputContract) -> GenerationRequest {
        GenerationRequest {
            model: self.config.model.clone(),
            system_prompt: self.config.system_prompt.clone(),
            user: user.clone(),
            contract,
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        }
    }

    fn schema_attempt(
        &self,
        ticket: &Ticket,
        user: &UserContent,
        generator: &dyn TextGenerator,
    ) -> CascadeState {
        let contract = OutputContract::Strict {
            name: self.config.schema_name.clone(),
            schema: strict_output_schema(),
        };
        tracing::debug!(ticket_id = ticket.id(), stage = "schema_attempt", "requesting summary");
        let reason = match generator.generate(&self.request(user, contract)) {
            Ok(text) => match parse_structured_summary(&text) {
                Ok(parsed) if is_valid_strict_summary(&parsed) => {
                    return CascadeState::Done(summary_from(parsed, Provenance::SchemaValidated));
                }
                Ok(parsed) => FallbackReason::InvalidOutput(format!(
                    "problem_summary rejected: {:?}",
                    parsed.problem_summary
                )),
                Err(error) => FallbackReason::InvalidOutput(error),
            },
            Err(error) if error.is_capability_mismatch() => {
                FallbackReason::ContractUnsupported(error)
            }
            Err(error) => FallbackReason::GenerationFailed(error),
        };
        tracing::debug!(
            ticket_id = ticket.id(),
            reason = reason.as_str(),
            "strict output rejected; retrying with free text"
        );
        CascadeState::FreeTextAttempt(reason)
    }

    fn free_text_attempt(
        &self,
        ticket: &Ticket,
        user: &UserContent,
        generator: &dyn TextGenerator,
        reason: FallbackReason,
    ) -> CascadeState {
        tracing::debug!(
            ticket_id = ticket.id(),
            stage = "free_text_attempt",
            fallback_reason = reason.as_str(),
            "requesting summary"
        );
        let text = match generator.generate(&self.request(user, OutputContract::FreeText)) {
            Ok(text) => text,
            Err(error) => return CascadeState::Failed(FailureReason::Generation(error)),
        };
        if text.trim().is_empty() {
            return CascadeState::Failed(FailureReason::EmptyResponse);
        }

        match parse_structured_summary(&text) {
            Ok(parsed) if starts_with_model_error(&parsed.problem_summary) => {
                CascadeState::Failed(FailureReason::ModelReportedError(parsed.problem_summary))
            }
            Ok(parsed) => CascadeState::Done(summary_from(parsed, Provenance::FreeTextParsed)),
            Err(error) => {
                tracing::debug!(
                    ticket_id = ticket.id(),
                    error = %error,
                    "free text is not structured; using heuristic extraction"
                );
                CascadeState::Heuristic(text)
            }
        }
    }

    fn heuristic_summary(&self, text: &str) -> Summary {
        Summary {
            problem_summary: text.to_string(),
            suggested_solution: String::new(),
            action_items: extract_action_items(text, self.config.max_action_items),
            provenance: Provenance::FreeTextHeuristic,
        }
    }

    fn error_summary(&self) -> Summary {
        Summary {
            problem_summary: self.config.error_summary.clone(),
            suggested_solution: self.config.error_solution.clone(),
            action_items: Vec::new(),
            provenance: Provenance::Error,
        }
    }
}

/// Extracts with [`ExtractorConfig::default`].
pub fn extract_summary(ticket: &Ticket, generator: &dyn TextGenerator) -> Summary {
    Extractor::default().extract(ticket, generator)
}

/// Strict-stage validity: a non-empty summary that is not a model-authored error.
pub fn is_valid_strict_summary(parsed: &StructuredSummary) -> bool {
    !parsed.problem_summary.is_empty() && !starts_with_model_error(&parsed.problem_summary)
}

fn starts_with_model_error(text: &str) -> bool {
    text.starts_with(MODEL_ERROR_PREFIX)
}

fn summary_from(parsed: StructuredSummary, provenance: Provenance) -> Summary {
    Summary {
        problem_summary: parsed.problem_summary,
        suggested_solution: parsed.suggested_solution,
        action_items: parsed.action_items,
        provenance,
    }
}
