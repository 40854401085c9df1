//! Judge: picks the single best hypothesis among completed branches.

use std::sync::LazyLock;

use coordination::parse::{labeled_value, ParseError};
use coordination::report::{HypothesisBranch, Stage, Verdict};
use regex::Regex;
use tracing::info;

use super::complete_parsed;
use crate::client::{CompletionOptions, ModelClient};
use crate::errors::PipelineError;
use crate::prompts::{self, JudgeCandidate, CHOSEN_LABEL};

static HYPOTHESIS_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hypothesis\s*#?\s*(\d+)").expect("hypothesis number regex should compile")
});

/// Judge the completed branches in `branches`; excluded ones are skipped.
pub async fn judge(
    client: &dyn ModelClient,
    branches: &[HypothesisBranch],
    options: CompletionOptions,
) -> Result<Verdict, PipelineError> {
    let candidates: Vec<JudgeCandidate<'_>> = branches
        .iter()
        .filter_map(|branch| match branch {
            HypothesisBranch::Completed {
                hypothesis,
                debates,
                debate_summary,
                ..
            } => Some(JudgeCandidate {
                hypothesis,
                criticisms: debates.iter().map(|d| &d.criticism).collect(),
                debate_summary,
            }),
            HypothesisBranch::Excluded { .. } => None,
        })
        .collect();

    if candidates.is_empty() {
        return Err(PipelineError::AllBranchesFailed(branches.len()));
    }

    let titles: Vec<&str> = candidates
        .iter()
        .map(|c| c.hypothesis.title.as_str())
        .collect();
    let prompt = prompts::judge_prompt(&candidates);
    let (position, justification, raw_text) = complete_parsed(
        client,
        Stage::Judgement,
        prompts::JUDGE_PREAMBLE,
        &prompt,
        options,
        |raw| parse_choice(raw, &titles).map(|(pos, just)| (pos, just, raw.to_string())),
        |err| prompts::strict_judge_suffix(titles.len(), &err.to_string()),
    )
    .await?;

    let chosen = candidates[position].hypothesis;
    info!(
        chosen_direction = chosen.direction_index + 1,
        title = %chosen.title,
        candidates = candidates.len(),
        "Verdict reached"
    );
    Ok(Verdict {
        chosen_direction: chosen.direction_index,
        chosen_title: chosen.title.clone(),
        justification,
        raw_text,
    })
}

/// Identify the chosen candidate in judge output.
///
/// Returns the 0-based candidate position and the justification: the text
/// after the chosen line, or the whole output when nothing follows it.
pub fn parse_choice(raw: &str, titles: &[&str]) -> Result<(usize, String), ParseError> {
    let (line, value) = labeled_value(raw, CHOSEN_LABEL)?;

    let by_number = HYPOTHESIS_NUMBER
        .captures(&value)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|n| (1..=titles.len()).contains(n))
        .map(|n| n - 1);

    let position = match by_number {
        Some(p) => p,
        None => match_title(&value, titles)?,
    };

    Ok((position, justification_after(raw, line)))
}

/// Resolve a free-text choice against candidate titles.
///
/// An exact case-insensitive match wins. Otherwise the candidate with the
/// longest overlap wins, where a title inside the value overlaps by the
/// title's length and a value inside a title by the value's length. Equal
/// best overlaps are ambiguous.
fn match_title(value: &str, titles: &[&str]) -> Result<usize, ParseError> {
    let unknown = || ParseError::UnknownChoice(value.to_string());
    let wanted = value.trim().to_lowercase();
    let titles: Vec<String> = titles.iter().map(|t| t.trim().to_lowercase()).collect();

    let exact: Vec<usize> = titles
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_empty() && **t == wanted)
        .map(|(i, _)| i)
        .collect();
    match exact.as_slice() {
        [only] => return Ok(*only),
        [] => {}
        _ => return Err(unknown()),
    }

    let mut best: Option<(usize, usize)> = None;
    let mut tied = false;
    for (i, title) in titles.iter().enumerate() {
        if title.is_empty() {
            continue;
        }
        let overlap = if wanted.contains(title.as_str()) {
            title.len()
        } else if title.contains(wanted.as_str()) && !wanted.is_empty() {
            wanted.len()
        } else {
            continue;
        };
        match best {
            Some((_, len)) if overlap < len => {}
            Some((_, len)) if overlap == len => tied = true,
            _ => {
                best = Some((i, overlap));
                tied = false;
            }
        }
    }

    match best {
        Some((i, _)) if !tied => Ok(i),
        _ => Err(unknown()),
    }
}

fn justification_after(raw: &str, value_line: usize) -> String {
    let rest = raw
        .lines()
        .skip(value_line + 1)
        .collect::<Vec<_>>()
        .join("\n");
    let rest = rest.trim();
    if rest.is_empty() {
        raw.trim().to_string()
    } else {
        rest.to_string()
    }
}
