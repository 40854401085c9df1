//! Progress events for a pipeline run
//!
//! The pipeline emits one event per stage boundary and per branch outcome
//! so a caller can show results as they arrive instead of waiting for the
//! final report. Events are informational; the report is authoritative.
//!
//! # Event Flow
//!
//! ```text
//! StageStarted(evaluation) → EvaluationFinished × 3 → StageFinished(evaluation)
//!   → ... → DirectionsIdentified
//!   → per branch: HypothesisMatured → CriticismsListed → DebateTurnRecorded × 6n
//!                 → BranchCompleted | BranchExcluded
//!   → VerdictReached
//! ```

pub mod types;

pub use types::PipelineEvent;
