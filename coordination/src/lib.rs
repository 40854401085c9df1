//! Coordination layer for the paper critique pipeline
//!
//! Everything here is deterministic: no network, no async. The agents
//! crate calls models and feeds their text through these types.
//!
//! # Modules
//!
//! - `report`: the report data model (evaluations, directions, hypotheses,
//!   criticisms, verdict) and its structural shape
//! - `debate`: the bounded against/for exchange over one criticism
//! - `parse`: enumerated-list and labelled-line parsing of model output
//! - `resilience`: per-stage degradation annotations
//! - `events`: progress events for progressive disclosure
//! - `render`: Markdown rendering of a finished report

pub mod debate;
pub mod events;
pub mod parse;
pub mod render;
pub mod report;
pub mod resilience;

// Re-export key debate types
pub use debate::{
    DebateError, DebateExchange, DebatePhase, DebateSide, DebateTurn, TransitionError,
    DEFAULT_DEBATE_ROUNDS,
};

// Re-export key report types
pub use report::{
    Criticism, CriticismDebate, Direction, Evaluation, EvaluationOutcome, Hypothesis,
    HypothesisBranch, LengthViolation, Report, ReportShape, SkepticismLevel, Stage, Verdict,
};

// Re-export parsing types
pub use parse::{labeled_value, parse_enumerated, CountBounds, ListItem, ParseError};

// Re-export resilience types
pub use resilience::{DegradationLevel, StageReport};

pub use events::PipelineEvent;
pub use render::render_markdown;
