use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub(crate) const DEFAULT_SETTINGS_PATH: &str = "local.settings.json";

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "ticket-canary",
    about = "Normalize helpdesk tickets and summarize them with an LLM",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_SETTINGS_PATH,
        help = "Functions-style settings file whose \"Values\" fill options not set by flags or environment"
    )]
    pub(crate) settings: PathBuf,

    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Normalize, summarize and print every ticket not processed before.
    Run(RunArgs),
    /// Print normalized tickets without calling the model.
    Normalize(NormalizeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliOutputFormat {
    Json,
    Html,
    Markdown,
}

#[derive(Debug, Args)]
pub(crate) struct NormalizeArgs {
    #[arg(long, help = "JSON file holding one ticket object or an array of tickets")]
    pub(crate) input: PathBuf,

    #[arg(
        long = "board-id",
        env = "CANARY_BOARD_ID",
        help = "Keep only tickets whose lists belong to this board"
    )]
    pub(crate) board_id: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long, help = "JSON file holding one ticket object or an array of tickets")]
    pub(crate) input: PathBuf,

    #[arg(
        long = "board-id",
        env = "CANARY_BOARD_ID",
        help = "Keep only tickets whose lists belong to this board"
    )]
    pub(crate) board_id: Option<String>,

    #[arg(
        long = "state-file",
        env = "CANARY_STATE_FILE",
        help = "JSON array of ticket ids already summarized [default: processed_ids.json]"
    )]
    pub(crate) state_file: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = CliOutputFormat::Json,
        help = "Output rendering for each summarized ticket"
    )]
    pub(crate) format: CliOutputFormat,

    #[arg(
        long = "api-key",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the OpenAI-compatible endpoint"
    )]
    pub(crate) api_key: Option<String>,

    #[arg(
        long,
        env = "OPENAI_MODEL",
        help = "Model used for summaries [default: gpt-4.1-mini]"
    )]
    pub(crate) model: Option<String>,

    #[arg(
        long = "api-base",
        env = "OPENAI_API_BASE",
        help = "Base URL for OpenAI-compatible APIs [default: https://api.openai.com/v1]"
    )]
    pub(crate) api_base: Option<String>,

    #[arg(
        long = "timeout-ms",
        env = "OPENAI_TIMEOUT_MS",
        value_parser = parse_positive_u64,
        help = "Per-request timeout in milliseconds [default: 120000]"
    )]
    pub(crate) timeout_ms: Option<u64>,

    #[arg(
        long = "max-retries",
        default_value_t = 2,
        help = "Retries for retryable HTTP statuses and connect errors"
    )]
    pub(crate) max_retries: usize,
}
