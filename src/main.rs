use log::LevelFilter;
use ringlog::{LogBuilder, MultiLogBuilder, Output, Stderr};
use std::process::ExitCode;

use zai_bench::cli::parse_model_list;
use zai_bench::config::{self, DEFAULT_PROMPT};
use zai_bench::{
    BenchmarkConfig, BenchmarkRunner, Cli, FALLBACK_MODELS, OutputFormat, ZaiClient, calculate_stats,
    report,
};

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Log to stderr so table/JSON output on stdout stays pipeable
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let output: Box<dyn Output> = Box::new(Stderr::new());
    let base_log = LogBuilder::new()
        .output(output)
        .build()
        .expect("failed to initialize logger");

    let _drain = MultiLogBuilder::new()
        .level_filter(level)
        .default(base_log)
        .build()
        .start();

    let api_key = match config::resolve_api_key(cli.api_key.clone()) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Trials are strictly sequential; a single-threaded runtime keeps the
    // timing path off a contended scheduler.
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to build runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli, api_key))
}

async fn run(cli: Cli, api_key: String) -> ExitCode {
    let client = match ZaiClient::new(&cli.base_url, &api_key, cli.timeout) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.list_models {
        println!("Available models:");
        for model in client.fetch_available_models().await {
            println!("  - {}", model);
        }
        return ExitCode::SUCCESS;
    }

    let models = match &cli.models {
        Some(list) => parse_model_list(list),
        None => client.fetch_available_models().await,
    };

    if models.is_empty() {
        eprintln!("Error: no models found");
        eprintln!("Fallback models: {}", FALLBACK_MODELS.join(", "));
        return ExitCode::FAILURE;
    }

    let config = BenchmarkConfig {
        api_key,
        models,
        runs: cli.runs,
        warmup_runs: cli.warmup,
        max_tokens: cli.max_tokens,
        prompt: cli.prompt.clone().unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        base_url: cli.base_url.clone(),
        timeout: cli.timeout,
    };

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    println!(
        "Benchmarking {} model(s), {} run(s) each",
        config.models.len(),
        config.runs
    );
    println!();

    let model_order = config.models.clone();
    let runner = BenchmarkRunner::new(client, config);
    let results = runner.run().await;

    // Group per model, preserving the configured order
    let all_stats: Vec<_> = model_order
        .iter()
        .map(|model| {
            let trials: Vec<_> = results.iter().filter(|r| &r.model == model).cloned().collect();
            calculate_stats(&trials)
        })
        .collect();

    match cli.output {
        OutputFormat::Table => report::print_table(&all_stats),
        OutputFormat::Json => {
            if let Err(e) = report::print_json(&all_stats) {
                eprintln!("Error: failed to render results: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(path) = &cli.save {
        if let Err(e) = report::save_results(&all_stats, path).await {
            eprintln!("Error: failed to save results: {}", e);
            return ExitCode::FAILURE;
        }
        println!();
        println!("Results saved to {}", path.display());
    }

    ExitCode::SUCCESS
}
