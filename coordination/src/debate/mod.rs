//! Criticism debates
//!
//! State machine for the bounded exchange over one criticism. The side
//! arguing that the criticism holds always opens; the defence answers.
//!
//! # Debate Flow
//!
//! ```text
//! Idle → AgainstTurn → ForTurn → [rounds left?]
//!   │        │            │          │
//!   │        └────────────┘          ├─ Yes → AgainstTurn
//!   │          (iterate)             └─ No  → Concluded
//!   │
//!   └─ failed turn at any point → Aborted
//! ```

pub mod state;

pub use state::{
    transcript_of, DebateError, DebateExchange, DebatePhase, DebateSide, DebateTransition,
    DebateTurn, TransitionError, DEFAULT_DEBATE_ROUNDS,
};
