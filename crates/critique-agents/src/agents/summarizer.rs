//! Objective summarizer: one claims-only synthesis of the evaluations.

use coordination::report::EvaluationOutcome;
use tracing::debug;

use crate::client::{CompletionOptions, CompletionRequest, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

pub async fn summarize(
    client: &dyn ModelClient,
    evaluations: &[EvaluationOutcome],
    options: CompletionOptions,
) -> Result<String, PipelineError> {
    let prompt = prompts::summarizer_prompt(evaluations);
    debug!(prompt_chars = prompt.len(), "Requesting objective summary");
    let text = client
        .complete(&CompletionRequest::new(
            prompts::SUMMARIZER_PREAMBLE,
            prompt,
            options,
        ))
        .await?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use coordination::report::{Evaluation, SkepticismLevel};

    use super::*;
    use crate::agents::testing::{options, QueueClient};

    #[tokio::test]
    async fn includes_every_completed_evaluation_verbatim() {
        let evaluations: Vec<EvaluationOutcome> = SkepticismLevel::ALL
            .iter()
            .map(|&level| {
                EvaluationOutcome::Completed(Evaluation {
                    level,
                    text: format!("verbatim {level} text"),
                })
            })
            .collect();
        let client = QueueClient::ok(&["  The paper claims X.  "]);

        let summary = summarize(&client, &evaluations, options()).await.unwrap();
        assert_eq!(summary, "The paper claims X.");

        let prompt = &client.prompts()[0];
        for level in SkepticismLevel::ALL {
            assert!(prompt.contains(&format!("verbatim {level} text")));
        }
    }

    #[tokio::test]
    async fn failure_propagates() {
        let client = QueueClient::new(vec![Err(PipelineError::EmptyResponse)]);
        assert!(matches!(
            summarize(&client, &[], options()).await,
            Err(PipelineError::EmptyResponse)
        ));
    }
}
