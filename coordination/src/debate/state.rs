//! Debate state machine: phases, transitions and the turn log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rounds per debate when nothing else is configured.
pub const DEFAULT_DEBATE_ROUNDS: u32 = 3;

/// Phase of a criticism debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Exchange created but no turn requested yet.
    Idle,
    /// Waiting for the side arguing that the criticism holds.
    AgainstTurn,
    /// Waiting for the side defending the hypothesis.
    ForTurn,
    /// All rounds recorded; the exchange is frozen.
    Concluded,
    /// A turn could not be produced; the exchange is frozen as-is.
    Aborted,
}

impl DebatePhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Concluded | Self::Aborted)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [DebatePhase] {
        match self {
            Self::Idle => &[Self::AgainstTurn, Self::Aborted],
            Self::AgainstTurn => &[Self::ForTurn, Self::Aborted],
            Self::ForTurn => &[Self::AgainstTurn, Self::Concluded, Self::Aborted],
            Self::Concluded | Self::Aborted => &[],
        }
    }

    /// Side expected to speak in this phase, if any.
    pub fn expected_side(self) -> Option<DebateSide> {
        match self {
            Self::AgainstTurn => Some(DebateSide::Against),
            Self::ForTurn => Some(DebateSide::For),
            _ => None,
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AgainstTurn => write!(f, "against_turn"),
            Self::ForTurn => write!(f, "for_turn"),
            Self::Concluded => write!(f, "concluded"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Which side of a criticism a turn argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateSide {
    /// Argues that the criticism holds.
    Against,
    /// Defends the hypothesis against the criticism.
    For,
}

impl DebateSide {
    pub fn opposite(self) -> Self {
        match self {
            Self::Against => Self::For,
            Self::For => Self::Against,
        }
    }

    /// Heading used in transcripts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Against => "Argument supporting the criticism",
            Self::For => "Argument defending the hypothesis",
        }
    }
}

impl std::fmt::Display for DebateSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Against => write!(f, "against"),
            Self::For => write!(f, "for"),
        }
    }
}

/// One argument in the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTurn {
    /// Round number (1-indexed).
    pub round: u32,
    pub side: DebateSide,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTransition {
    pub from: DebatePhase,
    pub to: DebatePhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DebatePhase,
    pub to: DebatePhase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// Errors from recording turns on an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebateError {
    #[error("debate already complete ({0})")]
    AlreadyComplete(DebatePhase),

    #[error("expected a turn from {expected:?}, got {actual}")]
    WrongSide {
        expected: Option<DebateSide>,
        actual: DebateSide,
    },

    #[error("turn text is empty")]
    EmptyTurn,

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Append-only record of the debate over one criticism.
///
/// Turns alternate `Against`, `For` for `max_rounds` rounds. Once the last
/// `For` turn is recorded the exchange moves to `Concluded` and rejects
/// further turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateExchange {
    /// Index of the criticism being debated within its hypothesis.
    pub criticism_index: usize,
    pub phase: DebatePhase,
    pub current_round: u32,
    pub max_rounds: u32,
    turns: Vec<DebateTurn>,
    pub transitions: Vec<DebateTransition>,
    /// Why the exchange was aborted, when it was.
    pub abort_reason: Option<String>,
}

impl DebateExchange {
    pub fn new(criticism_index: usize, max_rounds: u32) -> Self {
        Self {
            criticism_index,
            phase: DebatePhase::Idle,
            current_round: 0,
            max_rounds: max_rounds.max(1),
            turns: Vec::new(),
            transitions: Vec::new(),
            abort_reason: None,
        }
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: DebatePhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }

        self.transitions.push(DebateTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;

        // A round opens with the Against turn
        if to == DebatePhase::AgainstTurn {
            self.current_round += 1;
        }

        Ok(())
    }

    /// Start the debate (Idle → AgainstTurn).
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(DebatePhase::AgainstTurn, "debate started")
    }

    /// Side that must speak next, or `None` once the exchange is frozen.
    pub fn next_side(&self) -> Option<DebateSide> {
        match self.phase {
            DebatePhase::Idle => Some(DebateSide::Against),
            phase => phase.expected_side(),
        }
    }

    /// Append a turn and advance the phase.
    ///
    /// Starts the exchange implicitly if it is still idle.
    pub fn record_turn(&mut self, side: DebateSide, text: &str) -> Result<(), DebateError> {
        if self.phase.is_terminal() {
            return Err(DebateError::AlreadyComplete(self.phase));
        }
        if self.phase == DebatePhase::Idle {
            self.start()?;
        }
        let expected = self.phase.expected_side();
        if expected != Some(side) {
            return Err(DebateError::WrongSide {
                expected,
                actual: side,
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(DebateError::EmptyTurn);
        }

        self.turns.push(DebateTurn {
            round: self.current_round,
            side,
            text: text.to_string(),
            recorded_at: Utc::now(),
        });

        match side {
            DebateSide::Against => self.transition(DebatePhase::ForTurn, "criticism argued")?,
            DebateSide::For if self.has_rounds_remaining() => {
                self.transition(DebatePhase::AgainstTurn, "hypothesis defended")?
            }
            DebateSide::For => self.transition(DebatePhase::Concluded, "max rounds reached")?,
        }
        Ok(())
    }

    /// Freeze the exchange after a failed turn.
    pub fn abort(&mut self, reason: &str) -> Result<(), TransitionError> {
        self.transition(DebatePhase::Aborted, reason)?;
        self.abort_reason = Some(reason.to_string());
        Ok(())
    }

    /// Turns recorded so far, in order.
    pub fn turns(&self) -> &[DebateTurn] {
        &self.turns
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn is_concluded(&self) -> bool {
        self.phase == DebatePhase::Concluded
    }

    /// Whether more rounds are available.
    pub fn has_rounds_remaining(&self) -> bool {
        self.current_round < self.max_rounds
    }
}

/// Render turns as a transcript with round and side headings.
pub fn transcript_of(turns: &[DebateTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("Round {} - {}:\n{}", t.round, t.side.label(), t.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
