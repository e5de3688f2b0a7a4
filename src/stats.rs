use serde::Serialize;

use crate::benchmark::BenchmarkResult;

/// Aggregated statistics for one model across repeated trials.
///
/// Serialized field names follow the persisted-output contract, with units
/// spelled out.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model: String,
    #[serde(rename = "ttft_avg_ms")]
    pub ttft_avg: f64,
    #[serde(rename = "ttft_std_ms")]
    pub ttft_std: f64,
    #[serde(rename = "speed_avg_tokens_per_sec")]
    pub speed_avg: f64,
    #[serde(rename = "speed_std_tokens_per_sec")]
    pub speed_std: f64,
    #[serde(rename = "latency_avg_ms")]
    pub latency_avg: f64,
    #[serde(rename = "latency_std_ms")]
    pub latency_std: f64,
    pub tokens_avg: f64,
    pub runs: usize,
    pub successful_runs: usize,
}

/// Reduces the ordered trial results for one model into averaged metrics.
///
/// Only successful trials contribute to the averages. With no successes the
/// metrics are all zero and `runs` still reports the attempt count; an empty
/// input yields the "unknown" sentinel model.
pub fn calculate_stats(results: &[BenchmarkResult]) -> ModelStats {
    let successful: Vec<&BenchmarkResult> = results.iter().filter(|r| r.success).collect();

    if successful.is_empty() {
        return ModelStats {
            model: results
                .first()
                .map(|r| r.model.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            ttft_avg: 0.0,
            ttft_std: 0.0,
            speed_avg: 0.0,
            speed_std: 0.0,
            latency_avg: 0.0,
            latency_std: 0.0,
            tokens_avg: 0.0,
            runs: results.len(),
            successful_runs: 0,
        };
    }

    let ttfts: Vec<f64> = successful.iter().map(|r| r.ttft_ms).collect();
    let speeds: Vec<f64> = successful.iter().map(|r| r.generation_speed).collect();
    let latencies: Vec<f64> = successful.iter().map(|r| r.total_latency_ms).collect();
    let tokens: Vec<f64> = successful.iter().map(|r| r.completion_tokens as f64).collect();

    ModelStats {
        model: results[0].model.clone(),
        ttft_avg: mean(&ttfts),
        ttft_std: std_dev(&ttfts),
        speed_avg: mean(&speeds),
        speed_std: std_dev(&speeds),
        latency_avg: mean(&latencies),
        latency_std: std_dev(&latencies),
        tokens_avg: mean(&tokens),
        runs: results.len(),
        successful_runs: successful.len(),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0.0 below two samples, where sample variance
/// is undefined.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
