//! Critical evaluator: one evaluation per skepticism level.

use coordination::report::{Evaluation, SkepticismLevel};
use tracing::{debug, warn};

use crate::client::{CompletionOptions, CompletionRequest, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

/// Evaluate the paper at one skepticism level.
pub async fn evaluate(
    client: &dyn ModelClient,
    paper: &str,
    level: SkepticismLevel,
    options: CompletionOptions,
) -> Result<Evaluation, PipelineError> {
    let request = CompletionRequest::new(
        prompts::evaluator_system(level),
        prompts::evaluator_prompt(paper),
        options,
    );
    debug!(level = %level, paper_chars = paper.len(), "Requesting evaluation");
    let text = client.complete(&request).await?;
    Ok(Evaluation {
        level,
        text: text.trim().to_string(),
    })
}

/// Run all three levels concurrently. Results come back in
/// [`SkepticismLevel::ALL`] order; one failure does not affect the others.
pub async fn evaluate_all(
    client: &dyn ModelClient,
    paper: &str,
    options: CompletionOptions,
) -> Vec<(SkepticismLevel, Result<Evaluation, PipelineError>)> {
    let [low, neutral, high] = SkepticismLevel::ALL;
    let (low_res, neutral_res, high_res) = tokio::join!(
        evaluate(client, paper, low, options),
        evaluate(client, paper, neutral, options),
        evaluate(client, paper, high, options),
    );

    let results = vec![(low, low_res), (neutral, neutral_res), (high, high_res)];
    for (level, res) in &results {
        if let Err(e) = res {
            warn!(level = %level, error = %e, "Evaluation failed");
        }
    }
    results
}
