use anyhow::Result;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.z.ai/api/coding/paas/v4";

/// Environment variable consulted when --api-key is not given.
pub const API_KEY_ENV: &str = "ZAI_API_KEY";

/// A code-generation task long enough to exercise sustained token output.
pub const DEFAULT_PROMPT: &str = "Write a Python function that implements a binary search tree \
     with insert, delete, and search operations. Include proper \
     type hints and docstrings.";

/// Immutable per-invocation settings, shared read-only across every trial.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub api_key: String,
    pub models: Vec<String>,
    pub runs: usize,
    pub warmup_runs: usize,
    pub max_tokens: u32,
    pub prompt: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            anyhow::bail!("at least one model must be specified");
        }

        if self.runs == 0 {
            anyhow::bail!("runs must be greater than 0");
        }

        if self.max_tokens == 0 {
            anyhow::bail!("max_tokens must be greater than 0");
        }

        Ok(())
    }
}

/// Resolves the API key from the --api-key flag or the environment.
pub fn resolve_api_key(flag: Option<String>) -> Result<String> {
    pick_api_key(flag, std::env::var(API_KEY_ENV).ok())
}

fn pick_api_key(flag: Option<String>, env: Option<String>) -> Result<String> {
    if let Some(key) = flag.filter(|k| !k.is_empty()) {
        return Ok(key);
    }

    if let Some(key) = env.filter(|k| !k.is_empty()) {
        return Ok(key);
    }

    anyhow::bail!(
        "API key required. Set the {} environment variable or use --api-key.",
        API_KEY_ENV
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(models: Vec<String>, runs: usize, max_tokens: u32) -> BenchmarkConfig {
        BenchmarkConfig {
            api_key: "test-key".to_string(),
            models,
            runs,
            warmup_runs: 1,
            max_tokens,
            prompt: DEFAULT_PROMPT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let config = config_with(vec!["glm-4.7".to_string()], 3, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_models() {
        let config = config_with(Vec::new(), 3, 256);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_runs() {
        let config = config_with(vec!["glm-4.7".to_string()], 0, 256);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_tokens() {
        let config = config_with(vec!["glm-4.7".to_string()], 3, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pick_api_key_prefers_flag() {
        let key = pick_api_key(Some("from-flag".to_string()), Some("from-env".to_string()));
        assert_eq!(key.unwrap(), "from-flag");
    }

    #[test]
    fn test_pick_api_key_falls_back_to_env() {
        let key = pick_api_key(None, Some("from-env".to_string()));
        assert_eq!(key.unwrap(), "from-env");
    }

    #[test]
    fn test_pick_api_key_rejects_empty() {
        assert!(pick_api_key(None, None).is_err());
        assert!(pick_api_key(Some(String::new()), None).is_err());
    }
}
