use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "zai-bench")]
#[command(author, version, about = "Benchmark Z.AI coding-plan models for TTFT and generation speed", long_about = None)]
pub struct Cli {
    /// Z.AI API key (or set the ZAI_API_KEY environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Comma-separated list of models to benchmark (default: fetch all from the API)
    #[arg(long)]
    pub models: Option<String>,

    /// List available models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Number of timed runs per model
    #[arg(long, default_value_t = 3)]
    pub runs: usize,

    /// Number of warmup runs per model, discarded from the results
    #[arg(long, default_value_t = 1)]
    pub warmup: usize,

    /// Maximum tokens to generate per request
    #[arg(long, default_value_t = 256)]
    pub max_tokens: u32,

    /// Override the prompt sent to every model
    #[arg(long)]
    pub prompt: Option<String>,

    /// Base URL of the API
    #[arg(long, default_value = crate::config::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout (e.g. "60s", "2m")
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Save results to a JSON file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Splits a comma-separated `--models` value, dropping empty entries.
pub fn parse_model_list(models: &str) -> Vec<String> {
    models
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}
