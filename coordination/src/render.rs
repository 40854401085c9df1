//! Markdown rendering of a finished report.

use std::fmt::Write as _;

use crate::report::{CriticismDebate, EvaluationOutcome, HypothesisBranch, Report};

/// Render the full report as Markdown.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Paper Analysis & Hypothesis Report\n");
    let _ = writeln!(
        out,
        "_Paper length: {} characters. Prompt version {}. Run {} → {}._\n",
        report.paper_chars,
        report.prompt_version,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.finished_at.format("%H:%M:%S UTC"),
    );

    // ── Evaluations ─────────────────────────────────────────────
    let _ = writeln!(out, "## Critical Evaluations\n");
    for outcome in &report.evaluations {
        let _ = writeln!(out, "### {}\n", outcome.level().label());
        match outcome {
            EvaluationOutcome::Completed(e) => {
                let _ = writeln!(out, "{}\n", e.text.trim());
            }
            EvaluationOutcome::Failed { reason, .. } => {
                let _ = writeln!(out, "> Evaluation unavailable: {reason}\n");
            }
        }
    }

    let _ = writeln!(out, "## Objective Summary\n\n{}\n", report.summary.trim());

    let _ = writeln!(out, "## Research Directions\n");
    for d in &report.directions {
        let _ = writeln!(out, "{}. **{}**", d.index + 1, d.title);
        if !d.description.is_empty() {
            let _ = writeln!(out, "   > {}", d.description);
        }
    }
    out.push('\n');

    // ── Hypotheses ──────────────────────────────────────────────
    let _ = writeln!(out, "## Hypotheses, Criticisms & Debates\n");
    for branch in &report.branches {
        render_branch(&mut out, branch);
    }

    // ── Verdict ─────────────────────────────────────────────────
    let _ = writeln!(out, "## Final Judgement\n");
    let _ = writeln!(
        out,
        "**Chosen hypothesis:** {} (direction {})\n",
        report.verdict.chosen_title,
        report.verdict.chosen_direction + 1
    );
    let _ = writeln!(out, "{}\n", report.verdict.justification.trim());

    let _ = writeln!(out, "## Run Status\n");
    let _ = writeln!(out, "| Stage | Level | Succeeded | Warnings |");
    let _ = writeln!(out, "|---|---|---|---|");
    for s in &report.stages {
        let warnings = if s.warnings.is_empty() {
            "-".to_string()
        } else {
            s.warnings.join("; ")
        };
        let _ = writeln!(
            out,
            "| {} | {} | {}/{} | {} |",
            s.stage, s.level, s.succeeded, s.attempted, warnings
        );
    }

    out
}

fn render_branch(out: &mut String, branch: &HypothesisBranch) {
    let direction = branch.direction();
    let _ = writeln!(
        out,
        "### Hypothesis {}: {}\n",
        direction.index + 1,
        direction.title
    );

    if let HypothesisBranch::Excluded { stage, reason, .. } = branch {
        let _ = writeln!(out, "> **Excluded** at {stage}: {reason}\n");
    }
    if let Some(hypothesis) = branch.hypothesis() {
        let _ = writeln!(out, "#### Abstract\n");
        if let Some(v) = &hypothesis.length_violation {
            let _ = writeln!(out, "_Note: {v}._\n");
        }
        let _ = writeln!(out, "{}\n", hypothesis.abstract_text);
    }
    if !branch.debates().is_empty() {
        let _ = writeln!(out, "#### Criticisms & Debates\n");
        for debate in branch.debates() {
            render_debate(out, debate);
        }
    }
    if let HypothesisBranch::Completed { debate_summary, .. } = branch {
        let _ = writeln!(out, "#### Debate Summary\n\n{}\n", debate_summary.trim());
    }
}

fn render_debate(out: &mut String, debate: &CriticismDebate) {
    let _ = writeln!(
        out,
        "**Criticism {}:** {}\n",
        debate.criticism.index + 1,
        debate.criticism.text
    );
    for turn in debate.exchange.turns() {
        let _ = writeln!(
            out,
            "- _Round {}, {}:_ {}",
            turn.round,
            turn.side.label(),
            turn.text.replace('\n', " ")
        );
    }
    if let Some(reason) = &debate.exchange.abort_reason {
        let _ = writeln!(out, "- _Debate aborted: {reason}_");
    }
    out.push('\n');
}
