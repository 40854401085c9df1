//! Critic: 5-10 specific criticisms of a hypothesis.

use coordination::parse::{parse_enumerated, CountBounds, ParseError};
use coordination::report::{Criticism, Hypothesis, Stage};
use tracing::info;

use super::complete_parsed;
use crate::client::{CompletionOptions, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

pub const CRITICISM_BOUNDS: CountBounds = CountBounds::new(5, 10);

pub async fn criticize(
    client: &dyn ModelClient,
    hypothesis: &Hypothesis,
    options: CompletionOptions,
) -> Result<Vec<Criticism>, PipelineError> {
    let prompt = prompts::critic_prompt(hypothesis, CRITICISM_BOUNDS);
    let criticisms = complete_parsed(
        client,
        Stage::Criticism,
        prompts::CRITIC_PREAMBLE,
        &prompt,
        options,
        parse_criticisms,
        |err| prompts::strict_list_suffix(CRITICISM_BOUNDS, &err.to_string()),
    )
    .await?;

    info!(
        direction = hypothesis.direction_index + 1,
        count = criticisms.len(),
        "Criticisms listed"
    );
    Ok(criticisms)
}

pub fn parse_criticisms(raw: &str) -> Result<Vec<Criticism>, ParseError> {
    let items = parse_enumerated(raw, CRITICISM_BOUNDS)?;
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| Criticism {
            index,
            text: item.text(),
        })
        .collect())
}
