//! Hypothesis maturer: a 500-1000 word abstract per direction.

use coordination::report::{Direction, Hypothesis};
use tracing::{info, warn};

use crate::client::{CompletionOptions, CompletionRequest, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

/// Mature one direction into a hypothesis abstract.
///
/// A word count outside the requested range is kept as a soft
/// `length_violation` rather than failing the branch.
pub async fn mature(
    client: &dyn ModelClient,
    direction: &Direction,
    summary: &str,
    paper_excerpt: &str,
    options: CompletionOptions,
) -> Result<Hypothesis, PipelineError> {
    let request = CompletionRequest::new(
        prompts::MATURER_PREAMBLE,
        prompts::maturer_prompt(direction, summary, paper_excerpt),
        options,
    );
    let text = client.complete(&request).await?;
    let hypothesis = Hypothesis::new(direction, &text);

    match &hypothesis.length_violation {
        Some(v) => warn!(
            direction = direction.index + 1,
            violation = %v,
            "Abstract outside length range"
        ),
        None => info!(
            direction = direction.index + 1,
            words = hypothesis.word_count,
            "Hypothesis matured"
        ),
    }
    Ok(hypothesis)
}
