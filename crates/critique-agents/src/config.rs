//! Runtime configuration for a pipeline run.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (applied by the binary)
//! 2. Environment variable overrides (e.g. `CRITIQUE_MODEL`)
//! 3. Values from an optional TOML file
//! 4. Built-in defaults
//!
//! ## Output token budgets
//!
//! | Stage          | Default |
//! |----------------|---------|
//! | evaluation     | 3000    |
//! | summary        | 2000    |
//! | directions     | 1000    |
//! | maturation     | 1800    |
//! | criticism      | 1500    |
//! | debate turn    | 600     |
//! | debate summary | 1200    |
//! | judgement      | 2500    |

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::DEFAULT_DEBATE_ROUNDS;
use serde::{Deserialize, Serialize};

use crate::errors::RetryCategory;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
/// Concurrent requests allowed against the model API.
const DEFAULT_MAX_IN_FLIGHT: usize = 4;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
/// Budget for one direction's whole branch (maturation through debate summary).
const DEFAULT_BRANCH_TIMEOUT_SECS: u64 = 1_800;
const DEFAULT_PAPER_EXCERPT_CHARS: usize = 15_000;

/// Environment-variable names for overrides.
const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
const ENV_BASE_URL: &str = "CRITIQUE_BASE_URL";
const ENV_MODEL: &str = "CRITIQUE_MODEL";
const ENV_MAX_IN_FLIGHT: &str = "CRITIQUE_MAX_IN_FLIGHT";
const ENV_RATE_LIMIT_RETRIES: &str = "CRITIQUE_RATE_LIMIT_RETRIES";
const ENV_BRANCH_TIMEOUT_SECS: &str = "CRITIQUE_BRANCH_TIMEOUT_SECS";
const ENV_TEMPERATURE: &str = "CRITIQUE_TEMPERATURE";

/// Per-stage output token limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgets {
    pub evaluation: u32,
    pub summary: u32,
    pub directions: u32,
    pub maturation: u32,
    pub criticism: u32,
    pub debate_turn: u32,
    pub debate_summary: u32,
    pub judgement: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            evaluation: 3_000,
            summary: 2_000,
            directions: 1_000,
            maturation: 1_800,
            criticism: 1_500,
            debate_turn: 600,
            debate_summary: 1_200,
            judgement: 2_500,
        }
    }
}

/// Top-level configuration consumed by the client and the pipeline.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// API root, without the `/v1/messages` path.
    pub base_url: String,
    /// Never written back out; comes from the environment or the file.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub request_timeout_secs: u64,
    /// Upper bound on concurrent model requests.
    pub max_in_flight: usize,
    /// Retries after a 429 before the call fails.
    pub rate_limit_retries: u32,
    /// First back-off delay; doubles on each retry.
    pub backoff_base_ms: u64,
    pub branch_timeout_secs: u64,
    pub debate_rounds: u32,
    /// Temperature for every stage except the judge.
    pub temperature: f64,
    /// Temperature for the judge (lower = more deterministic).
    pub judge_temperature: f64,
    /// Paper characters included in direction and maturation prompts.
    pub paper_excerpt_chars: usize,
    pub max_tokens: TokenBudgets,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            rate_limit_retries: RetryCategory::RateLimit
                .default_max_retries()
                .unwrap_or_default(),
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            branch_timeout_secs: DEFAULT_BRANCH_TIMEOUT_SECS,
            debate_rounds: DEFAULT_DEBATE_ROUNDS,
            temperature: 0.7,
            judge_temperature: 0.2,
            paper_excerpt_chars: DEFAULT_PAPER_EXCERPT_CHARS,
            max_tokens: TokenBudgets::default(),
        }
    }
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("max_in_flight", &self.max_in_flight)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .field("branch_timeout_secs", &self.branch_timeout_secs)
            .field("debate_rounds", &self.debate_rounds)
            .field("temperature", &self.temperature)
            .field("judge_temperature", &self.judge_temperature)
            .finish_non_exhaustive()
    }
}

impl AnalysisConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Defaults or file values, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config
            .apply_env_with(|key| std::env::var(key).ok())
            .map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model = model;
        }
        if let Some(v) = lookup(ENV_MAX_IN_FLIGHT) {
            self.max_in_flight = parse_env(ENV_MAX_IN_FLIGHT, &v)?;
        }
        if let Some(v) = lookup(ENV_RATE_LIMIT_RETRIES) {
            self.rate_limit_retries = parse_env(ENV_RATE_LIMIT_RETRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_BRANCH_TIMEOUT_SECS) {
            self.branch_timeout_secs = parse_env(ENV_BRANCH_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_TEMPERATURE) {
            self.temperature = parse_env(ENV_TEMPERATURE, &v)?;
        }
        Ok(())
    }

    /// Validate the config; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err(format!("{ENV_API_KEY} is not set"));
        }
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.max_in_flight == 0 {
            return Err("max_in_flight must be > 0".to_string());
        }
        if self.debate_rounds == 0 {
            return Err("debate_rounds must be > 0".to_string());
        }
        if self.branch_timeout_secs == 0 {
            return Err("branch_timeout_secs must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be in [0, 1], got {}",
                self.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.judge_temperature) {
            return Err(format!(
                "judge_temperature must be in [0, 1], got {}",
                self.judge_temperature
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn branch_timeout(&self) -> Duration {
        Duration::from_secs(self.branch_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{key} has invalid value '{value}'"))
}
