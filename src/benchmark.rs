use log::{debug, info, warn};
use std::time::Instant;

use crate::client::{ChatStream, ClientError, ZaiClient};
use crate::config::BenchmarkConfig;

/// Result of a single timed trial.
///
/// A failed trial keeps its wall-clock latency up to the failure and zeroes
/// every other numeric field; `error` is set if and only if `success` is
/// false.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub model: String,
    pub ttft_ms: f64,
    pub generation_speed: f64,
    pub total_latency_ms: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl BenchmarkResult {
    fn failed(model: &str, total_latency_ms: f64, error: String) -> Self {
        Self {
            model: model.to_string(),
            ttft_ms: 0.0,
            generation_speed: 0.0,
            total_latency_ms,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            success: false,
            error: Some(error),
        }
    }
}

/// Drives warmup and timed trials for every configured model.
///
/// Trials execute strictly sequentially, across models and repeated runs;
/// concurrent requests would share bandwidth and perturb the latencies being
/// measured. One HTTP client is reused for the whole run.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use zai_bench::{BenchmarkConfig, BenchmarkRunner, ZaiClient};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = BenchmarkConfig {
///     api_key: "sk-...".to_string(),
///     models: vec!["glm-4.7".to_string()],
///     runs: 3,
///     warmup_runs: 1,
///     max_tokens: 256,
///     prompt: zai_bench::config::DEFAULT_PROMPT.to_string(),
///     base_url: zai_bench::config::DEFAULT_BASE_URL.to_string(),
///     timeout: Duration::from_secs(60),
/// };
/// let client = ZaiClient::new(&config.base_url, &config.api_key, config.timeout)?;
/// let results = BenchmarkRunner::new(client, config).run().await;
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    client: ZaiClient,
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(client: ZaiClient, config: BenchmarkConfig) -> Self {
        Self { client, config }
    }

    /// Runs warmup plus timed trials for every model, in list order, and
    /// returns one result per timed trial, in trial order. Per-trial
    /// failures are data, never control flow.
    pub async fn run(&self) -> Vec<BenchmarkResult> {
        let mut results = Vec::with_capacity(self.config.models.len() * self.config.runs);

        for model in &self.config.models {
            info!(
                "benchmarking {}: {} warmup run(s), {} timed run(s)",
                model, self.config.warmup_runs, self.config.runs
            );

            self.warmup(model).await;

            for run in 0..self.config.runs {
                let result = self.benchmark_model(model).await;
                match &result.error {
                    Some(error) => {
                        warn!("{} run {}/{} failed: {}", model, run + 1, self.config.runs, error);
                    }
                    None => {
                        debug!(
                            "{} run {}/{}: ttft {:.1}ms, {:.1} tok/s, {:.1}ms total",
                            model,
                            run + 1,
                            self.config.runs,
                            result.ttft_ms,
                            result.generation_speed,
                            result.total_latency_ms
                        );
                    }
                }
                results.push(result);
            }
        }

        results
    }

    /// Primes a model with discarded requests so cold-start effects stay out
    /// of the timed trials. Warmup failures never abort the run.
    async fn warmup(&self, model: &str) {
        for i in 0..self.config.warmup_runs {
            debug!("warmup {}/{} for {}", i + 1, self.config.warmup_runs, model);

            let mut stream = match self.open_stream(model).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("warmup request for {} failed: {}", model, e);
                    continue;
                }
            };

            loop {
                match stream.next_chunk().await {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(e) => {
                        debug!("warmup request for {} failed: {}", model, e);
                        break;
                    }
                }
            }
        }
    }

    /// Executes one timed trial against `model`.
    ///
    /// The clock starts immediately before the request is issued. TTFT is
    /// stamped once, on the first increment with non-empty content, and
    /// collapses to the end timestamp for a stream that produced no content
    /// at all. Usage counters may arrive once, at the end, or progressively;
    /// the last non-zero value wins per field independently.
    pub async fn benchmark_model(&self, model: &str) -> BenchmarkResult {
        let start = Instant::now();

        let mut stream = match self.open_stream(model).await {
            Ok(stream) => stream,
            Err(e) => return BenchmarkResult::failed(model, elapsed_ms(start), e.to_string()),
        };

        let mut ttft: Option<Instant> = None;
        let mut content_chars = 0usize;
        let mut prompt_tokens = 0u64;
        let mut completion_tokens = 0u64;
        let mut total_tokens = 0u64;

        loop {
            match stream.next_chunk().await {
                Ok(Some(chunk)) => {
                    if !chunk.content.is_empty() {
                        if ttft.is_none() {
                            ttft = Some(Instant::now());
                        }
                        content_chars += chunk.content.chars().count();
                    }

                    if chunk.prompt_tokens > 0 {
                        prompt_tokens = chunk.prompt_tokens;
                    }
                    if chunk.completion_tokens > 0 {
                        completion_tokens = chunk.completion_tokens;
                    }
                    if chunk.total_tokens > 0 {
                        total_tokens = chunk.total_tokens;
                    }
                }
                Ok(None) => break,
                Err(e) => return BenchmarkResult::failed(model, elapsed_ms(start), e.to_string()),
            }
        }

        let end = Instant::now();
        let ttft = ttft.unwrap_or(end);

        let completion_tokens = estimate_completion_tokens(completion_tokens, content_chars);
        let generation_secs = end.duration_since(ttft).as_secs_f64();

        BenchmarkResult {
            model: model.to_string(),
            ttft_ms: ttft.duration_since(start).as_secs_f64() * 1000.0,
            generation_speed: generation_speed(completion_tokens, generation_secs),
            total_latency_ms: end.duration_since(start).as_secs_f64() * 1000.0,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            success: true,
            error: None,
        }
    }

    async fn open_stream(&self, model: &str) -> Result<ChatStream, ClientError> {
        self.client
            .chat_completion_stream(model, &self.config.prompt, self.config.max_tokens)
            .await
    }
}

/// Estimates completion tokens at ~4 characters per token when the API never
/// reported a count. An approximation by policy, not a tokenizer.
fn estimate_completion_tokens(reported: u64, content_chars: usize) -> u64 {
    if reported > 0 {
        reported
    } else if content_chars > 0 {
        ((content_chars / 4) as u64).max(1)
    } else {
        0
    }
}

/// Tokens per second over the generation window; 0.0 when the window is
/// non-positive (a stream that never produced content).
fn generation_speed(completion_tokens: u64, generation_secs: f64) -> f64 {
    if generation_secs > 0.0 {
        completion_tokens as f64 / generation_secs
    } else {
        0.0
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_prefers_reported_count() {
        assert_eq!(estimate_completion_tokens(42, 1000), 42);
    }

    #[test]
    fn test_estimate_from_content_length() {
        assert_eq!(estimate_completion_tokens(0, 100), 25);
        // Short content still counts as at least one token
        assert_eq!(estimate_completion_tokens(0, 3), 1);
        assert_eq!(estimate_completion_tokens(0, 0), 0);
    }

    #[test]
    fn test_generation_speed() {
        assert_eq!(generation_speed(100, 2.0), 50.0);
        assert_eq!(generation_speed(100, 0.0), 0.0);
        assert_eq!(generation_speed(0, 2.0), 0.0);
    }

    #[test]
    fn test_failed_result_zeroes_metrics() {
        let result = BenchmarkResult::failed("glm-4.7", 123.4, "API request failed: 500".into());

        assert!(!result.success);
        assert_eq!(result.total_latency_ms, 123.4);
        assert_eq!(result.ttft_ms, 0.0);
        assert_eq!(result.generation_speed, 0.0);
        assert_eq!(result.completion_tokens, 0);
        assert!(result.error.is_some());
    }
}
