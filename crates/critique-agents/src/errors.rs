//! Pipeline error taxonomy with retry classification.
//!
//! Every failure a stage can hit is represented here. The throttled
//! client and the parse-retry helper decide whether to try again from
//! `retry_category()` and its default budget, and branch exclusions log
//! the category.
//!
//! ## Retry categories
//!
//! | Category     | Retriable | Max retries |
//! |--------------|-----------|-------------|
//! | RateLimit    | yes       | configurable, exponential back-off |
//! | ParseFailure | yes       | 1 (stricter prompt) |
//! | Transient    | no        | (fails the branch) |
//! | Terminal     | no        | (fails the run) |

use std::fmt;
use std::time::Duration;

use coordination::parse::ParseError;
use coordination::report::Stage;
use thiserror::Error;

/// Classification used by the client and agents to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Upstream service error or empty payload. Not retried; the branch
    /// that hit it is excluded.
    Transient,
    /// API rate limit. Retried with exponential back-off.
    RateLimit,
    /// Model output did not match the requested format. Retried once with
    /// a stricter prompt.
    ParseFailure,
    /// Cancellation, bad configuration, or a run-level failure.
    Terminal,
}

impl RetryCategory {
    /// Retry budget for retriable categories, `None` for the rest.
    pub fn default_max_retries(self) -> Option<u32> {
        match self {
            Self::RateLimit => Some(5),
            Self::ParseFailure => Some(1),
            Self::Transient | Self::Terminal => None,
        }
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::ParseFailure => write!(f, "parse_failure"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

/// Unified error type for model calls and pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Model client ──────────────────────────────────────────────────────
    /// The service errored, timed out, or returned a malformed payload.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// HTTP 429 from the model API.
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimit { retry_after: Option<Duration> },

    /// The payload carried no text.
    #[error("Empty response from model")]
    EmptyResponse,

    // ── Stage ─────────────────────────────────────────────────────────────
    /// Model output could not be parsed into the stage's structure.
    #[error("Parse failure at {stage}: {message}")]
    Parse { stage: Stage, message: String },

    /// The run was cancelled by the caller.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A branch ran past its time budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration is invalid or missing required fields.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every hypothesis branch was excluded, so nothing can be judged.
    #[error("All {0} hypothesis branches failed")]
    AllBranchesFailed(usize),

    /// Any other error that doesn't fit the above categories.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Classify this error for retry logic.
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::Upstream(_) | Self::EmptyResponse | Self::Timeout(_) => {
                RetryCategory::Transient
            }
            Self::RateLimit { .. } => RetryCategory::RateLimit,
            Self::Parse { .. } => RetryCategory::ParseFailure,
            Self::Cancelled(_)
            | Self::Configuration(_)
            | Self::AllBranchesFailed(_)
            | Self::Internal(_) => RetryCategory::Terminal,
        }
    }

    /// Server-suggested wait carried by a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Build a `Parse` variant from a list-parsing error.
    pub fn parse(stage: Stage, err: ParseError) -> Self {
        Self::Parse {
            stage,
            message: err.to_string(),
        }
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}
