//! Debater: argues one side of a criticism, and drives a full exchange.

use coordination::debate::{DebateExchange, DebateSide, DebateTurn};
use coordination::report::{Criticism, CriticismDebate, Hypothesis};
use tracing::{debug, warn};

use crate::client::{CompletionOptions, CompletionRequest, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

/// Produce one argument for `side`, given every prior turn.
///
/// The model keeps no memory between calls, so `history` is resent whole.
pub async fn argue(
    client: &dyn ModelClient,
    hypothesis: &Hypothesis,
    criticism: &Criticism,
    side: DebateSide,
    history: &[DebateTurn],
    options: CompletionOptions,
) -> Result<String, PipelineError> {
    let request = CompletionRequest::new(
        prompts::debater_system(side),
        prompts::debater_prompt(hypothesis, criticism, side, history),
        options,
    );
    let text = client.complete(&request).await?;
    Ok(text.trim().to_string())
}

/// Hold the whole debate over one criticism.
///
/// Turns are strictly sequential: against, for, repeated for `rounds`
/// rounds. A failed turn aborts the exchange and keeps the turns recorded
/// so far; the caller sees it as a non-concluded debate. `on_turn` is
/// called after each recorded turn.
pub async fn hold_debate<F>(
    client: &dyn ModelClient,
    hypothesis: &Hypothesis,
    criticism: Criticism,
    rounds: u32,
    options: CompletionOptions,
    on_turn: F,
) -> CriticismDebate
where
    F: Fn(&DebateTurn),
{
    let mut exchange = DebateExchange::new(criticism.index, rounds);

    while let Some(side) = exchange.next_side() {
        let result = argue(
            client,
            hypothesis,
            &criticism,
            side,
            exchange.turns(),
            options,
        )
        .await
        .and_then(|text| {
            exchange
                .record_turn(side, &text)
                .map_err(|e| PipelineError::Internal(e.into()))
        });

        match result {
            Ok(()) => {
                if let Some(turn) = exchange.turns().last() {
                    debug!(
                        direction = hypothesis.direction_index + 1,
                        criticism = criticism.index + 1,
                        round = turn.round,
                        side = %turn.side,
                        "Debate turn recorded"
                    );
                    on_turn(turn);
                }
            }
            Err(e) => {
                warn!(
                    direction = hypothesis.direction_index + 1,
                    criticism = criticism.index + 1,
                    error = %e,
                    "Debate turn failed, aborting exchange"
                );
                if let Err(te) = exchange.abort(&e.to_string()) {
                    warn!(error = %te, "Could not abort debate exchange");
                }
                break;
            }
        }
    }

    CriticismDebate {
        criticism,
        exchange,
    }
}
