mod bootstrap_helpers;
mod cli_args;
mod local_settings;
mod pipeline;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use canary_ai::{
    OpenAiGenerator, OpenAiGeneratorConfig, DEFAULT_OPENAI_API_BASE, DEFAULT_REQUEST_TIMEOUT_MS,
};
use canary_core::JsonFileProcessedIdStore;
use canary_extract::{Extractor, ExtractorConfig, DEFAULT_MODEL};
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
pub(crate) use crate::cli_args::{Cli, CliCommand, CliOutputFormat, NormalizeArgs, RunArgs};
use crate::local_settings::LocalSettings;
use crate::pipeline::{normalize_payload, read_ticket_payload, run_pipeline, write_normalized};

const DEFAULT_STATE_FILE: &str = "processed_ids.json";

/// Run options after flags, environment and `local.settings.json` are merged.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedRunOptions {
    api_key: String,
    api_base: String,
    model: String,
    timeout_ms: u64,
    board_id: Option<String>,
    state_file: PathBuf,
}

fn resolve_run_options(args: &RunArgs, settings: &LocalSettings) -> Result<ResolvedRunOptions> {
    let api_key = settings
        .fill(args.api_key.clone(), "OPENAI_API_KEY")
        .ok_or_else(|| {
            anyhow!("--api-key (or OPENAI_API_KEY in the environment or local settings) is required")
        })?;
    let timeout_ms = match args.timeout_ms {
        Some(timeout_ms) => timeout_ms,
        None => match settings.get("OPENAI_TIMEOUT_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| anyhow!("OPENAI_TIMEOUT_MS must be a positive integer, got '{raw}'"))?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        },
    };

    Ok(ResolvedRunOptions {
        api_key,
        api_base: settings
            .fill(args.api_base.clone(), "OPENAI_API_BASE")
            .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
        model: settings
            .fill(args.model.clone(), "OPENAI_MODEL")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        timeout_ms,
        board_id: settings.fill(args.board_id.clone(), "CANARY_BOARD_ID"),
        state_file: args
            .state_file
            .clone()
            .or_else(|| settings.get("CANARY_STATE_FILE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
    })
}

fn execute_normalize(args: &NormalizeArgs, settings: &LocalSettings) -> Result<()> {
    let board_id = settings.fill(args.board_id.clone(), "CANARY_BOARD_ID");
    let raw = read_ticket_payload(&args.input)?;
    let tickets = normalize_payload(&raw, board_id.as_deref());
    let mut stdout = std::io::stdout().lock();
    write_normalized(&tickets, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn execute_run(args: &RunArgs, settings: &LocalSettings) -> Result<()> {
    let options = resolve_run_options(args, settings)?;
    let generator = OpenAiGenerator::new(OpenAiGeneratorConfig {
        api_base: options.api_base.clone(),
        api_key: options.api_key.clone(),
        organization: settings.get("OPENAI_ORGANIZATION").map(str::to_string),
        request_timeout_ms: options.timeout_ms,
        max_retries: args.max_retries,
    })
    .context("failed to create OpenAI client")?;
    let extractor = Extractor::new(ExtractorConfig {
        model: options.model.clone(),
        ..ExtractorConfig::default()
    });
    let store = JsonFileProcessedIdStore::new(&options.state_file);

    let raw = read_ticket_payload(&args.input)?;
    let tickets = normalize_payload(&raw, options.board_id.as_deref());
    let mut stdout = std::io::stdout().lock();
    let report = run_pipeline(
        &tickets,
        &store,
        &extractor,
        &generator,
        args.format,
        &mut stdout,
    )?;
    stdout.flush()?;
    tracing::debug!(
        summarized = report.summarized,
        state_file = %options.state_file.display(),
        "ticket run complete"
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = LocalSettings::load(&cli.settings)?;

    match &cli.command {
        CliCommand::Run(args) => execute_run(args, &settings),
        CliCommand::Normalize(args) => execute_normalize(args, &settings),
    }
}
