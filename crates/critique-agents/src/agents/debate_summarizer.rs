//! Debate summarizer: one balanced synthesis per hypothesis.

use coordination::debate::DebateTurn;
use coordination::report::{Criticism, CriticismDebate, Hypothesis};
use tracing::{debug, warn};

use crate::client::{CompletionOptions, CompletionRequest, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

/// Summarize every debate held under one hypothesis.
///
/// Aborted debates are listed as excluded criticisms rather than
/// summarized from a partial transcript.
pub async fn summarize_debates(
    client: &dyn ModelClient,
    hypothesis: &Hypothesis,
    debates: &[CriticismDebate],
    options: CompletionOptions,
) -> Result<String, PipelineError> {
    let (concluded, aborted): (Vec<&CriticismDebate>, Vec<&CriticismDebate>) =
        debates.iter().partition(|d| d.is_concluded());

    if !aborted.is_empty() {
        warn!(
            direction = hypothesis.direction_index + 1,
            excluded = aborted.len(),
            "Summarizing with excluded criticisms"
        );
    }

    let held: Vec<(&Criticism, &[DebateTurn])> = concluded
        .iter()
        .map(|d| (&d.criticism, d.exchange.turns()))
        .collect();
    let excluded: Vec<&Criticism> = aborted.iter().map(|d| &d.criticism).collect();

    let prompt = prompts::debate_summarizer_prompt(hypothesis, &held, &excluded);
    debug!(
        direction = hypothesis.direction_index + 1,
        prompt_chars = prompt.len(),
        "Requesting debate summary"
    );
    let text = client
        .complete(&CompletionRequest::new(
            prompts::DEBATE_SUMMARIZER_PREAMBLE,
            prompt,
            options,
        ))
        .await?;
    Ok(text.trim().to_string())
}
