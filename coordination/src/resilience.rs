//! Resilience: per-stage degradation annotations
//!
//! A stage whose sub-calls all succeed is `Full`. A stage that lost some
//! branches but still produced output is `Partial`, with one warning per
//! lost branch. `Unavailable` marks a stage that produced nothing usable.
//!
//! ```text
//! Stage run
//!   ├─ every call succeeds      → StageReport { level: Full, .. }
//!   ├─ some calls fail          → StageReport { level: Partial, warnings, .. }
//!   └─ every call fails         → StageReport { level: Unavailable, .. }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::Stage;

/// How much of a stage's output is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    /// Every call in the stage succeeded.
    Full,
    /// Some branches were lost; the rest carried on.
    Partial,
    /// Nothing usable was produced.
    Unavailable,
}

impl DegradationLevel {
    /// Level for a stage where `succeeded` of `total` calls completed.
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if succeeded >= total {
            Self::Full
        } else if succeeded == 0 {
            Self::Unavailable
        } else {
            Self::Partial
        }
    }
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Partial => write!(f, "partial"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Degradation annotation for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub level: DegradationLevel,
    /// Calls that succeeded.
    pub succeeded: usize,
    /// Calls attempted.
    pub attempted: usize,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl StageReport {
    /// A stage where every call succeeded.
    pub fn full(stage: Stage, attempted: usize) -> Self {
        Self {
            stage,
            level: DegradationLevel::Full,
            succeeded: attempted,
            attempted,
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Derive the level from counts and attach the collected warnings.
    pub fn from_counts(
        stage: Stage,
        succeeded: usize,
        attempted: usize,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            stage,
            level: DegradationLevel::from_counts(succeeded, attempted),
            succeeded,
            attempted,
            warnings,
            timestamp: Utc::now(),
        }
    }

    /// A stage that produced nothing.
    pub fn unavailable(stage: Stage, attempted: usize, warning: &str) -> Self {
        Self {
            stage,
            level: DegradationLevel::Unavailable,
            succeeded: 0,
            attempted,
            warnings: vec![warning.to_string()],
            timestamp: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.level != DegradationLevel::Full
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "{}: {} ({}/{})",
            self.stage, self.level, self.succeeded, self.attempted
        )
    }
}
