//! Report data model
//!
//! Every value here is produced once by a pipeline stage and only read by
//! later stages. The whole tree serializes so a finished [`Report`] can be
//! emitted as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::debate::DebateExchange;
use crate::resilience::{DegradationLevel, StageReport};

/// Lower bound for a matured abstract, in words.
pub const MIN_ABSTRACT_WORDS: usize = 500;
/// Upper bound for a matured abstract, in words.
pub const MAX_ABSTRACT_WORDS: usize = 1000;

/// Pipeline stage, used for annotations and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Evaluation,
    Summary,
    Directions,
    Maturation,
    Criticism,
    Debate,
    DebateSummary,
    Judgement,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Evaluation,
        Stage::Summary,
        Stage::Directions,
        Stage::Maturation,
        Stage::Criticism,
        Stage::Debate,
        Stage::DebateSummary,
        Stage::Judgement,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evaluation => write!(f, "evaluation"),
            Self::Summary => write!(f, "summary"),
            Self::Directions => write!(f, "directions"),
            Self::Maturation => write!(f, "maturation"),
            Self::Criticism => write!(f, "criticism"),
            Self::Debate => write!(f, "debate"),
            Self::DebateSummary => write!(f, "debate_summary"),
            Self::Judgement => write!(f, "judgement"),
        }
    }
}

/// How much benefit of the doubt an evaluation gives the paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkepticismLevel {
    Low,
    Neutral,
    High,
}

impl SkepticismLevel {
    pub const ALL: [SkepticismLevel; 3] = [
        SkepticismLevel::Low,
        SkepticismLevel::Neutral,
        SkepticismLevel::High,
    ];

    /// Human-readable heading.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low Skepticism",
            Self::Neutral => "Neutral",
            Self::High => "High Skepticism",
        }
    }
}

impl std::fmt::Display for SkepticismLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Neutral => write!(f, "neutral"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub level: SkepticismLevel,
    pub text: String,
}

/// Result of one skepticism level's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Completed(Evaluation),
    Failed {
        level: SkepticismLevel,
        reason: String,
    },
}

impl EvaluationOutcome {
    pub fn level(&self) -> SkepticismLevel {
        match self {
            Self::Completed(e) => e.level,
            Self::Failed { level, .. } => *level,
        }
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            Self::Completed(e) => Some(e),
            Self::Failed { .. } => None,
        }
    }
}

/// A research direction proposed from the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    /// Zero-based position in the identified list.
    pub index: usize,
    pub title: String,
    pub description: String,
}

impl Direction {
    /// One-line form used inside prompts.
    pub fn headline(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, self.description)
        }
    }
}

/// Abstract length outside the requested word range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthViolation {
    pub words: usize,
    pub min: usize,
    pub max: usize,
}

impl std::fmt::Display for LengthViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "abstract has {} words, expected {}-{}",
            self.words, self.min, self.max
        )
    }
}

/// A matured research abstract for one direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub direction_index: usize,
    pub title: String,
    pub abstract_text: String,
    pub word_count: usize,
    pub length_violation: Option<LengthViolation>,
}

impl Hypothesis {
    /// Build a hypothesis for `direction`, measuring the abstract.
    pub fn new(direction: &Direction, abstract_text: &str) -> Self {
        let abstract_text = abstract_text.trim().to_string();
        let words = word_count(&abstract_text);
        let length_violation = if (MIN_ABSTRACT_WORDS..=MAX_ABSTRACT_WORDS).contains(&words) {
            None
        } else {
            Some(LengthViolation {
                words,
                min: MIN_ABSTRACT_WORDS,
                max: MAX_ABSTRACT_WORDS,
            })
        };
        Self {
            direction_index: direction.index,
            title: direction.title.clone(),
            abstract_text,
            word_count: words,
            length_violation,
        }
    }
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criticism {
    pub index: usize,
    pub text: String,
}

/// A criticism together with the debate held over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticismDebate {
    pub criticism: Criticism,
    pub exchange: DebateExchange,
}

impl CriticismDebate {
    pub fn is_concluded(&self) -> bool {
        self.exchange.is_concluded()
    }
}

/// Outcome of one direction's branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HypothesisBranch {
    Completed {
        direction: Direction,
        hypothesis: Hypothesis,
        debates: Vec<CriticismDebate>,
        debate_summary: String,
    },
    Excluded {
        direction: Direction,
        stage: Stage,
        reason: String,
        /// The abstract, when maturation got that far.
        hypothesis: Option<Hypothesis>,
        /// Debates held before the branch stopped.
        #[serde(default)]
        debates: Vec<CriticismDebate>,
    },
}

impl HypothesisBranch {
    pub fn direction(&self) -> &Direction {
        match self {
            Self::Completed { direction, .. } | Self::Excluded { direction, .. } => direction,
        }
    }

    pub fn hypothesis(&self) -> Option<&Hypothesis> {
        match self {
            Self::Completed { hypothesis, .. } => Some(hypothesis),
            Self::Excluded { hypothesis, .. } => hypothesis.as_ref(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn debates(&self) -> &[CriticismDebate] {
        match self {
            Self::Completed { debates, .. } | Self::Excluded { debates, .. } => debates,
        }
    }

    /// Debates whose exchange was aborted.
    pub fn excluded_criticisms(&self) -> Vec<usize> {
        self.debates()
            .iter()
            .filter(|d| !d.is_concluded())
            .map(|d| d.criticism.index)
            .collect()
    }
}

/// The judge's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Index of the chosen direction.
    pub chosen_direction: usize,
    pub chosen_title: String,
    pub justification: String,
    /// Unparsed judge output.
    pub raw_text: String,
}

/// Final output of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub paper_chars: usize,
    pub evaluations: Vec<EvaluationOutcome>,
    pub summary: String,
    pub directions: Vec<Direction>,
    pub branches: Vec<HypothesisBranch>,
    pub verdict: Verdict,
    pub stages: Vec<StageReport>,
    pub prompt_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    pub fn completed_branches(&self) -> impl Iterator<Item = &HypothesisBranch> {
        self.branches.iter().filter(|b| b.is_completed())
    }

    pub fn excluded_branches(&self) -> impl Iterator<Item = &HypothesisBranch> {
        self.branches.iter().filter(|b| !b.is_completed())
    }

    /// Worst degradation level across all stages.
    pub fn overall_level(&self) -> DegradationLevel {
        self.stages
            .iter()
            .map(|s| s.level)
            .max()
            .unwrap_or(DegradationLevel::Full)
    }

    pub fn is_degraded(&self) -> bool {
        self.overall_level() != DegradationLevel::Full
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Structural fingerprint of the report, independent of text content.
    pub fn shape(&self) -> ReportShape {
        ReportShape {
            evaluations: self
                .evaluations
                .iter()
                .map(|e| (e.level(), e.evaluation().is_some()))
                .collect(),
            directions: self.directions.len(),
            branches: self
                .branches
                .iter()
                .map(|b| match b {
                    HypothesisBranch::Completed { debates, .. } => BranchShape::Completed {
                        turns_per_debate: debates
                            .iter()
                            .map(|d| d.exchange.turns().len())
                            .collect(),
                    },
                    HypothesisBranch::Excluded { stage, .. } => BranchShape::Excluded(*stage),
                })
                .collect(),
            chosen_direction: self.verdict.chosen_direction,
        }
    }
}

/// Shape of a report, for comparing reruns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportShape {
    pub evaluations: Vec<(SkepticismLevel, bool)>,
    pub directions: usize,
    pub branches: Vec<BranchShape>,
    pub chosen_direction: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchShape {
    Completed { turns_per_debate: Vec<usize> },
    Excluded(Stage),
}
