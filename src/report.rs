use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::stats::ModelStats;

const TABLE_TITLE: &str = "Z.AI Model Benchmark Results";

const HEADERS: [&str; 6] = [
    "Model",
    "TTFT (ms)",
    "Speed (t/s)",
    "Latency (ms)",
    "Tokens",
    "Success",
];

/// The persisted output document: per-model stats plus a run summary.
#[derive(Debug, Serialize)]
pub struct BenchmarkOutput<'a> {
    pub results: &'a [ModelStats],
    pub summary: Summary,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_models: usize,
    pub successful_models: usize,
}

pub fn build_output(stats: &[ModelStats]) -> BenchmarkOutput<'_> {
    BenchmarkOutput {
        results: stats,
        summary: Summary {
            total_models: stats.len(),
            successful_models: stats.iter().filter(|s| s.successful_runs > 0).count(),
        },
    }
}

/// Formats one model's stats as table cells: averaged metrics as
/// `avg ± std`, token counts rounded, success as `successful/total`.
pub fn format_row(stats: &ModelStats) -> [String; 6] {
    [
        stats.model.clone(),
        format!("{:.1} ± {:.1}", stats.ttft_avg, stats.ttft_std),
        format!("{:.1} ± {:.1}", stats.speed_avg, stats.speed_std),
        format!("{:.1} ± {:.1}", stats.latency_avg, stats.latency_std),
        format!("{:.0}", stats.tokens_avg),
        format!("{}/{}", stats.successful_runs, stats.runs),
    ]
}

pub fn print_table(stats: &[ModelStats]) {
    let rows: Vec<[String; 6]> = stats.iter().map(format_row).collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    println!("{}", TABLE_TITLE);
    print_row(&HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    print_row(&rule, &widths);
    for row in &rows {
        print_row(row, &widths);
    }
}

fn print_row(cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, (cell, &width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        if i == 0 {
            // Model column is left-aligned, numeric columns right-aligned
            line.push_str(&format!("{cell:<width$}"));
        } else {
            line.push_str(&format!("{cell:>width$}"));
        }
    }
    println!("{}", line.trim_end());
}

pub fn print_json(stats: &[ModelStats]) -> Result<()> {
    let json = serde_json::to_string_pretty(&build_output(stats))?;
    println!("{}", json);
    Ok(())
}

pub async fn save_results(stats: &[ModelStats], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&build_output(stats))?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(model: &str, successful_runs: usize) -> ModelStats {
        ModelStats {
            model: model.to_string(),
            ttft_avg: 123.45,
            ttft_std: 6.7,
            speed_avg: 45.6,
            speed_std: 1.2,
            latency_avg: 3456.7,
            latency_std: 89.0,
            tokens_avg: 127.5,
            runs: 3,
            successful_runs,
        }
    }

    #[test]
    fn test_format_row() {
        let row = format_row(&stats("glm-4.7", 3));

        assert_eq!(row[0], "glm-4.7");
        assert_eq!(row[1], "123.5 ± 6.7");
        assert_eq!(row[2], "45.6 ± 1.2");
        assert_eq!(row[3], "3456.7 ± 89.0");
        assert_eq!(row[4], "128");
        assert_eq!(row[5], "3/3");
    }

    #[test]
    fn test_summary_counts_models_with_successes() {
        let all = vec![stats("glm-4.7", 3), stats("glm-4.6", 0)];

        let output = build_output(&all);

        assert_eq!(output.summary.total_models, 2);
        assert_eq!(output.summary.successful_models, 1);
    }

    #[test]
    fn test_json_field_names() {
        let all = vec![stats("glm-4.7", 3)];
        let value = serde_json::to_value(build_output(&all)).unwrap();

        let result = &value["results"][0];
        assert_eq!(result["model"], "glm-4.7");
        assert_eq!(result["ttft_avg_ms"], 123.45);
        assert_eq!(result["speed_avg_tokens_per_sec"], 45.6);
        assert_eq!(result["latency_std_ms"], 89.0);
        assert_eq!(result["runs"], 3);
        assert_eq!(value["summary"]["total_models"], 1);
        assert_eq!(value["summary"]["successful_models"], 1);
    }

    #[tokio::test]
    async fn test_save_results_writes_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let all = vec![stats("glm-4.7", 2)];

        save_results(&all, &path).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["results"][0]["successful_runs"], 2);
        assert_eq!(value["summary"]["total_models"], 1);
    }
}
