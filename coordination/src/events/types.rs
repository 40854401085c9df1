//! Event types emitted while a report is being built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::debate::DebateSide;
use crate::report::{SkepticismLevel, Stage};
use crate::resilience::DegradationLevel;

/// All pipeline progress events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage began
    StageStarted {
        stage: Stage,
        timestamp: DateTime<Utc>,
    },

    /// A stage finished, possibly degraded
    StageFinished {
        stage: Stage,
        level: DegradationLevel,
        timestamp: DateTime<Utc>,
    },

    /// One skepticism level finished
    EvaluationFinished {
        level: SkepticismLevel,
        succeeded: bool,
        timestamp: DateTime<Utc>,
    },

    /// Directions were parsed from the model output
    DirectionsIdentified {
        titles: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An abstract was produced for a direction
    HypothesisMatured {
        direction_index: usize,
        word_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Criticisms were parsed for a hypothesis
    CriticismsListed {
        direction_index: usize,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A debate turn was appended
    DebateTurnRecorded {
        direction_index: usize,
        criticism_index: usize,
        round: u32,
        side: DebateSide,
        timestamp: DateTime<Utc>,
    },

    /// A branch reached its debate summary
    BranchCompleted {
        direction_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A branch was dropped from judgement
    BranchExcluded {
        direction_index: usize,
        stage: Stage,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The judge chose a hypothesis
    VerdictReached {
        chosen_direction: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PipelineEvent::StageStarted { timestamp, .. } => *timestamp,
            PipelineEvent::StageFinished { timestamp, .. } => *timestamp,
            PipelineEvent::EvaluationFinished { timestamp, .. } => *timestamp,
            PipelineEvent::DirectionsIdentified { timestamp, .. } => *timestamp,
            PipelineEvent::HypothesisMatured { timestamp, .. } => *timestamp,
            PipelineEvent::CriticismsListed { timestamp, .. } => *timestamp,
            PipelineEvent::DebateTurnRecorded { timestamp, .. } => *timestamp,
            PipelineEvent::BranchCompleted { timestamp, .. } => *timestamp,
            PipelineEvent::BranchExcluded { timestamp, .. } => *timestamp,
            PipelineEvent::VerdictReached { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::StageStarted { .. } => "stage_started",
            PipelineEvent::StageFinished { .. } => "stage_finished",
            PipelineEvent::EvaluationFinished { .. } => "evaluation_finished",
            PipelineEvent::DirectionsIdentified { .. } => "directions_identified",
            PipelineEvent::HypothesisMatured { .. } => "hypothesis_matured",
            PipelineEvent::CriticismsListed { .. } => "criticisms_listed",
            PipelineEvent::DebateTurnRecorded { .. } => "debate_turn_recorded",
            PipelineEvent::BranchCompleted { .. } => "branch_completed",
            PipelineEvent::BranchExcluded { .. } => "branch_excluded",
            PipelineEvent::VerdictReached { .. } => "verdict_reached",
        }
    }

    /// Direction the event concerns, if it is branch-scoped
    pub fn direction_index(&self) -> Option<usize> {
        match self {
            PipelineEvent::HypothesisMatured {
                direction_index, ..
            }
            | PipelineEvent::CriticismsListed {
                direction_index, ..
            }
            | PipelineEvent::DebateTurnRecorded {
                direction_index, ..
            }
            | PipelineEvent::BranchCompleted {
                direction_index, ..
            }
            | PipelineEvent::BranchExcluded {
                direction_index, ..
            } => Some(*direction_index),
            _ => None,
        }
    }

    pub fn stage_started(stage: Stage) -> Self {
        PipelineEvent::StageStarted {
            stage,
            timestamp: Utc::now(),
        }
    }

    pub fn stage_finished(stage: Stage, level: DegradationLevel) -> Self {
        PipelineEvent::StageFinished {
            stage,
            level,
            timestamp: Utc::now(),
        }
    }
}
