pub mod benchmark;
pub mod cli;
pub mod client;
pub mod config;
pub mod report;
pub mod stats;

pub use benchmark::{BenchmarkResult, BenchmarkRunner};
pub use cli::{Cli, OutputFormat};
pub use client::{FALLBACK_MODELS, StreamChunk, ZaiClient, parse_stream_line};
pub use config::BenchmarkConfig;
pub use stats::{ModelStats, calculate_stats};
