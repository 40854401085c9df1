//! Stage agents for the critique pipeline.
//!
//! Each agent is a free async function over a `&dyn ModelClient`: it builds
//! its prompt from `crate::prompts`, makes one call (or one call per turn
//! for the debater), and parses the reply into `coordination` types.
//! [`StageOptions`] carries the sampling options for every stage.

pub mod critic;
pub mod debate_summarizer;
pub mod debater;
pub mod directions;
pub mod evaluator;
pub mod judge;
pub mod maturer;
pub mod summarizer;

use coordination::parse::ParseError;
use coordination::report::Stage;
use tracing::warn;

use crate::client::{CompletionOptions, CompletionRequest, ModelClient};
use crate::config::AnalysisConfig;
use crate::errors::{PipelineError, RetryCategory};

/// Sampling options per stage, derived from an `AnalysisConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageOptions {
    pub evaluation: CompletionOptions,
    pub summary: CompletionOptions,
    pub directions: CompletionOptions,
    pub maturation: CompletionOptions,
    pub criticism: CompletionOptions,
    pub debate_turn: CompletionOptions,
    pub debate_summary: CompletionOptions,
    pub judgement: CompletionOptions,
}

impl StageOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let at = |max_output_tokens: u32| CompletionOptions {
            temperature: config.temperature,
            max_output_tokens,
        };
        let budgets = &config.max_tokens;
        Self {
            evaluation: at(budgets.evaluation),
            summary: at(budgets.summary),
            directions: at(budgets.directions),
            maturation: at(budgets.maturation),
            criticism: at(budgets.criticism),
            debate_turn: at(budgets.debate_turn),
            debate_summary: at(budgets.debate_summary),
            judgement: CompletionOptions {
                temperature: config.judge_temperature,
                max_output_tokens: budgets.judgement,
            },
        }
    }
}

/// Complete and parse. A parse failure is retried with `stricter`
/// appended to the prompt, up to the `ParseFailure` retry budget, and then
/// surfaced.
pub(crate) async fn complete_parsed<T, P, S>(
    client: &dyn ModelClient,
    stage: Stage,
    system: &str,
    prompt: &str,
    options: CompletionOptions,
    parse: P,
    stricter: S,
) -> Result<T, PipelineError>
where
    P: Fn(&str) -> Result<T, ParseError>,
    S: Fn(&ParseError) -> String,
{
    let max_retries = RetryCategory::ParseFailure
        .default_max_retries()
        .unwrap_or_default();
    let mut request = CompletionRequest::new(system, prompt, options);
    let mut attempt = 0;
    loop {
        let raw = client.complete(&request).await?;
        let err = match parse(&raw) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= max_retries {
            return Err(PipelineError::parse(stage, err));
        }
        attempt += 1;
        warn!(
            stage = %stage,
            attempt,
            error = %err,
            "Unparseable model output, retrying with stricter prompt"
        );
        request = CompletionRequest::new(system, format!("{prompt}{}", stricter(&err)), options);
    }
}
