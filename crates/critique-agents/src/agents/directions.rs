//! Direction identifier: 3-5 research directions from the summary.

use coordination::parse::{parse_enumerated, CountBounds, ListItem, ParseError};
use coordination::report::{Direction, Stage};
use tracing::info;

use super::complete_parsed;
use crate::client::{CompletionOptions, ModelClient};
use crate::errors::PipelineError;
use crate::prompts;

pub const DIRECTION_BOUNDS: CountBounds = CountBounds::new(3, 5);

/// Characters of an untitled item's body used as its title.
const FALLBACK_TITLE_CHARS: usize = 80;

pub async fn identify(
    client: &dyn ModelClient,
    paper_excerpt: &str,
    summary: &str,
    options: CompletionOptions,
) -> Result<Vec<Direction>, PipelineError> {
    let prompt = prompts::directions_prompt(paper_excerpt, summary, DIRECTION_BOUNDS);
    let directions = complete_parsed(
        client,
        Stage::Directions,
        prompts::DIRECTIONS_PREAMBLE,
        &prompt,
        options,
        parse_directions,
        |err| prompts::strict_list_suffix(DIRECTION_BOUNDS, &err.to_string()),
    )
    .await?;

    info!(count = directions.len(), "Identified research directions");
    Ok(directions)
}

/// Parse the numbered direction list.
pub fn parse_directions(raw: &str) -> Result<Vec<Direction>, ParseError> {
    let items = parse_enumerated(raw, DIRECTION_BOUNDS)?;
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| to_direction(index, item))
        .collect())
}

fn to_direction(index: usize, item: ListItem) -> Direction {
    match item.title {
        Some(title) => Direction {
            index,
            title,
            description: item.body,
        },
        None => Direction {
            index,
            title: prompts::excerpt(&item.body, FALLBACK_TITLE_CHARS, "..."),
            description: item.body,
        },
    }
}
