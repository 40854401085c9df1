//! Paper critique pipeline
//!
//! Reads a research paper and runs it through a fixed sequence of model
//! calls: three critical evaluations at different skepticism levels, an
//! objective summary, 3-5 research directions, and per direction a matured
//! hypothesis, its criticisms, and a bounded debate over each criticism.
//! A judge then picks the single best hypothesis.
//!
//! The data model and debate state machine live in the `coordination`
//! crate; this crate owns the model client, prompts, stage agents and the
//! [`pipeline::Pipeline`] that wires them together.

pub mod agents;
pub mod client;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod prompts;

pub use client::{
    AnthropicClient, CompletionOptions, CompletionRequest, ModelClient, ThrottledClient,
};
pub use config::AnalysisConfig;
pub use errors::{PipelineError, RetryCategory};
pub use pipeline::Pipeline;
