//! Enumerated-list parsing for free-text model output.
//!
//! Models are asked for numbered lists but answer with whatever markdown
//! they like. Items may start with `1.`, `1)`, `1:`, `**1.`, `### 1.`, or,
//! when no numbered line exists at all, with `-`, `*` or `•` bullets. Lines that
//! are not item starts continue the previous item; text before the first
//! item is ignored.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*)?(\*\*)?\d{1,3}[.):](?:\s+|$)(.*)$")
        .expect("NUMBERED_ITEM regex should compile")
});

static BULLET_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*•]\s+(.*)$").expect("BULLET_ITEM regex should compile")
});

static BOLD_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*(.+?)\*\*\s*[:\-–]?\s*(.*)$").expect("BOLD_TITLE regex should compile")
});

/// Inclusive bounds on the number of items a stage accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBounds {
    pub min: usize,
    pub max: usize,
}

impl CountBounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

impl std::fmt::Display for CountBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no enumerated items found in model output")]
    NoItems,

    #[error("expected {bounds} items, found {found}")]
    CountOutOfBounds { bounds: CountBounds, found: usize },

    #[error("no line labelled '{0}' in model output")]
    MissingLabel(String),

    #[error("'{0}' does not name any candidate")]
    UnknownChoice(String),
}

/// One parsed list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Bold lead-in, with any trailing colon removed.
    pub title: Option<String>,
    pub body: String,
}

impl ListItem {
    fn from_content(content: &str) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        if let Some(caps) = BOLD_TITLE.captures(content) {
            let title = caps[1].trim().trim_end_matches(':').trim().to_string();
            let body = caps[2].trim().to_string();
            if !title.is_empty() {
                return Some(Self {
                    title: Some(title),
                    body,
                });
            }
        }
        Some(Self {
            title: None,
            body: content.to_string(),
        })
    }

    /// Title and body joined back into one line.
    pub fn text(&self) -> String {
        match (&self.title, self.body.is_empty()) {
            (Some(t), true) => t.clone(),
            (Some(t), false) => format!("{}: {}", t, self.body),
            (None, _) => self.body.clone(),
        }
    }
}

/// Split model output into list items without checking the count.
pub fn extract_items(raw: &str) -> Vec<ListItem> {
    let numbered = raw.lines().any(|l| NUMBERED_ITEM.is_match(l));
    let mut contents: Vec<String> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(start) = item_start(line, numbered) {
            contents.push(start);
        } else if let Some(current) = contents.last_mut() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(trimmed);
        }
    }

    contents
        .iter()
        .filter_map(|c| ListItem::from_content(c))
        .collect()
}

fn item_start(line: &str, numbered: bool) -> Option<String> {
    if numbered {
        let caps = NUMBERED_ITEM.captures(line)?;
        let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
        // `**1. Title**` loses its opening marker to the number match
        if caps.get(1).is_some() {
            return Some(format!("**{rest}"));
        }
        Some(rest.to_string())
    } else {
        let caps = BULLET_ITEM.captures(line)?;
        Some(caps[1].trim().to_string())
    }
}

/// Parse an enumerated list and enforce its count contract.
pub fn parse_enumerated(raw: &str, bounds: CountBounds) -> Result<Vec<ListItem>, ParseError> {
    let items = extract_items(raw);
    if items.is_empty() {
        return Err(ParseError::NoItems);
    }
    if !bounds.contains(items.len()) {
        return Err(ParseError::CountOutOfBounds {
            bounds,
            found: items.len(),
        });
    }
    Ok(items)
}

/// Value following `label` on the first line that carries it, with the
/// 0-based index of the line the value was read from.
///
/// Matching ignores case and surrounding markdown emphasis, so
/// `**Chosen Hypothesis:** Foo` yields `Foo`. A label standing alone on
/// its line takes the next non-empty line as its value.
pub fn labeled_value(raw: &str, label: &str) -> Result<(usize, String), ParseError> {
    let needle = label.to_ascii_lowercase();
    let lines: Vec<&str> = raw.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let cleaned = strip_emphasis(line);
        let lower = cleaned.to_ascii_lowercase();
        let Some(pos) = lower.find(&needle) else {
            continue;
        };
        let value = cleaned[pos + needle.len()..]
            .trim()
            .trim_start_matches(':')
            .trim();
        if !value.is_empty() {
            return Ok((i, value.to_string()));
        }
        let next = lines
            .iter()
            .enumerate()
            .skip(i + 1)
            .map(|(j, l)| (j, strip_emphasis(l)))
            .find(|(_, l)| !l.trim().is_empty());
        if let Some((j, next)) = next {
            return Ok((j, next.trim().to_string()));
        }
    }
    Err(ParseError::MissingLabel(label.to_string()))
}

fn strip_emphasis(line: &str) -> String {
    line.replace("**", "").replace('#', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTIONS: &str = "Here are the directions:\n\
        \n\
        1. **Causal probing:** Test whether the effect survives ablation.\n\
        2. **Scaling study** - Repeat at 10x the sample size.\n\
        3) **Cross-domain transfer**: Apply the method to protein data\n\
           with a different tokenizer.\n";

    #[test]
    fn parses_bold_titles_and_descriptions() {
        let items = parse_enumerated(DIRECTIONS, CountBounds::new(3, 5)).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title.as_deref(), Some("Causal probing"));
        assert_eq!(
            items[0].body,
            "Test whether the effect survives ablation."
        );
        assert_eq!(items[1].title.as_deref(), Some("Scaling study"));
        assert_eq!(items[1].body, "Repeat at 10x the sample size.");
    }

    #[test]
    fn continuation_lines_join_previous_item() {
        let items = extract_items(DIRECTIONS);
        assert_eq!(
            items[2].body,
            "Apply the method to protein data with a different tokenizer."
        );
    }

    #[test]
    fn preamble_is_ignored() {
        let items = extract_items("Sure! Below is my list.\n1. first\n2. second");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text(), "first");
    }

    #[test]
    fn bullets_used_only_without_numbers() {
        let bullets = "- **A**: one\n- **B**: two\n* **C**: three";
        assert_eq!(extract_items(bullets).len(), 3);

        let mixed = "1. Main point\n   - supporting detail\n2. Second point";
        let items = extract_items(mixed);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].body, "Main point - supporting detail");
    }

    #[test]
    fn bold_number_prefix() {
        let items = extract_items("**1. Sample bias**: too few sites\n**2. Leakage**: test overlap");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("Sample bias"));
        assert_eq!(items[0].body, "too few sites");
    }

    #[test]
    fn decimals_are_not_item_markers() {
        let items = extract_items("1. Effect size\n1.5 times larger than baseline\n2. Next");
        assert_eq!(items.len(), 2);
        assert!(items[0].body.contains("1.5 times"));
    }

    #[test]
    fn too_few_items_is_count_error() {
        let err = parse_enumerated("1. only\n2. two", CountBounds::new(3, 5)).unwrap_err();
        assert_eq!(
            err,
            ParseError::CountOutOfBounds {
                bounds: CountBounds::new(3, 5),
                found: 2
            }
        );
        assert_eq!(err.to_string(), "expected 3-5 items, found 2");
    }

    #[test]
    fn too_many_items_is_count_error() {
        let raw = (1..=11).map(|i| format!("{i}. point {i}")).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            parse_enumerated(&raw, CountBounds::new(5, 10)),
            Err(ParseError::CountOutOfBounds { found: 11, .. })
        ));
    }

    #[test]
    fn prose_without_list_is_no_items() {
        assert_eq!(
            parse_enumerated("I cannot produce a list.", CountBounds::new(3, 5)),
            Err(ParseError::NoItems)
        );
    }

    #[test]
    fn item_text_joins_title_and_body() {
        let item = ListItem {
            title: Some("Title".into()),
            body: "body".into(),
        };
        assert_eq!(item.text(), "Title: body");
    }

    #[test]
    fn labeled_value_strips_emphasis() {
        let raw = "## Decision\n**Chosen Hypothesis:** Hypothesis 2 - Scaling study\n\nJustification...";
        assert_eq!(
            labeled_value(raw, "Chosen Hypothesis").unwrap(),
            (1, "Hypothesis 2 - Scaling study".to_string())
        );
    }

    #[test]
    fn labeled_value_on_following_line() {
        let raw = "**Chosen Hypothesis:**\n\n**Hypothesis 2 - Beta**\nBecause it is testable.";
        assert_eq!(
            labeled_value(raw, "Chosen Hypothesis").unwrap(),
            (2, "Hypothesis 2 - Beta".to_string())
        );
    }

    #[test]
    fn trailing_label_without_value_is_missing() {
        assert_eq!(
            labeled_value("Reasoning first.\nChosen Hypothesis:\n  \n", "Chosen Hypothesis"),
            Err(ParseError::MissingLabel("Chosen Hypothesis".into()))
        );
    }

    #[test]
    fn heading_numbered_items() {
        let raw = "## Criticisms\n\n### 1. Sample bias\nOnly two sites.\n\n### 2. **Leakage**: test overlap\n#### 3) Missing baseline";
        let items = extract_items(raw);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].text(), "Sample bias Only two sites.");
        assert_eq!(items[1].title.as_deref(), Some("Leakage"));
        assert_eq!(items[1].body, "test overlap");
        assert_eq!(items[2].body, "Missing baseline");
    }

    #[test]
    fn labeled_value_missing() {
        assert_eq!(
            labeled_value("no decision here", "Chosen Hypothesis"),
            Err(ParseError::MissingLabel("Chosen Hypothesis".into()))
        );
    }
}
