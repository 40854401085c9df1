//! Prompt templates for each stage of the pipeline.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes.
//! The version is stamped on every report so a given output can be traced
//! back to the prompts that produced it.
//!
//! Preambles are constants. The `*_prompt` functions only interpolate the
//! stage inputs; they hold no state.

use coordination::debate::{transcript_of, DebateSide, DebateTurn};
use coordination::parse::CountBounds;
use coordination::report::{
    Criticism, Direction, EvaluationOutcome, Hypothesis, SkepticismLevel, MAX_ABSTRACT_WORDS,
    MIN_ABSTRACT_WORDS,
};

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// Marker appended when the paper is cut to fit a prompt.
pub const TRUNCATION_MARKER: &str = "\n... (paper text truncated)";

/// Abstract characters shown to the judge per hypothesis.
pub const JUDGE_ABSTRACT_EXCERPT_CHARS: usize = 1_000;
/// Criticism characters shown to the judge per criticism.
pub const JUDGE_CRITICISM_EXCERPT_CHARS: usize = 200;

/// Label the judge must put in front of its choice.
pub const CHOSEN_LABEL: &str = "Chosen Hypothesis";

// ── Critical evaluator ──────────────────────────────────────────────────

pub const EVALUATOR_PREAMBLE: &str = "\
You critically evaluate scientific papers from an assigned level of skepticism.

## Evaluation criteria (apply them through your skepticism lens)
- Research question: clarity, significance, focus.
- Literature review: coverage, relevance, critical appraisal.
- Methodology: soundness, controls, sample size, reproducibility, potential biases.
- Data and analysis: rigor, statistical validity, appropriate techniques.
- Results: clear presentation and support from the data.
- Discussion: coherent interpretation, limitations acknowledged (or not).
- Conclusion: claims justified by the results.
- Overall: logical flow, clarity, conflicts of interest.

## Output
A detailed critical evaluation that reflects your assigned stance. Structure \
your points clearly. Do NOT summarize the paper; critique it. Use Markdown.";

/// Stance instruction for each skepticism level.
pub fn skepticism_stance(level: SkepticismLevel) -> &'static str {
    match level {
        SkepticismLevel::Low => {
            "You presume the paper's findings are valid. Focus on its strengths, \
             contributions and positive implications, acknowledging only minor or \
             obvious limitations."
        }
        SkepticismLevel::Neutral => {
            "You weigh the evidence without bias. Assess strengths and weaknesses, \
             methodology, evidence and conclusions impartially, neither overly \
             positive nor negative."
        }
        SkepticismLevel::High => {
            "You actively hunt for flaws. Focus on inconsistencies, methodological \
             weaknesses, confounds, overstated or unsupported claims, logical \
             fallacies, biases and alternative explanations. Challenge every assertion."
        }
    }
}

pub fn evaluator_system(level: SkepticismLevel) -> String {
    format!(
        "{EVALUATOR_PREAMBLE}\n\n## Assigned skepticism: {}\n{}",
        level.label(),
        skepticism_stance(level)
    )
}

pub fn evaluator_prompt(paper: &str) -> String {
    format!("Here is the paper text to evaluate:\n\n```text\n{paper}\n```")
}

// ── Objective summarizer ────────────────────────────────────────────────

pub const SUMMARIZER_PREAMBLE: &str = "\
You are an objective summarizer. You receive critical evaluations of the same \
scientific paper, each written from a different skepticism level.

## Task
Synthesize them into one objective summary of the range of critical perspectives \
and of the claims the paper makes.

## Rules
- Use ONLY the content of the evaluations.
- Do NOT assert that any claim is true or false, and do not add your own opinion.
- Identify common themes (methodology, interpretation, conclusions) and how each \
skepticism level treated them.
- Note where the evaluations converge and where they diverge.
- Be concise and neutral. Use Markdown.";

pub fn summarizer_prompt(evaluations: &[EvaluationOutcome]) -> String {
    let mut prompt = String::from("Here are the critical evaluations:\n\n");
    for outcome in evaluations {
        match outcome {
            EvaluationOutcome::Completed(e) => {
                prompt.push_str(&format!(
                    "**Evaluation ({}):**\n```text\n{}\n```\n\n---\n\n",
                    e.level.label(),
                    e.text.trim()
                ));
            }
            EvaluationOutcome::Failed { level, .. } => {
                prompt.push_str(&format!(
                    "**Evaluation ({}):** unavailable; do not speculate about it.\n\n---\n\n",
                    level.label()
                ));
            }
        }
    }
    prompt.push_str(
        "Based only on these evaluations, write an objective summary of the claims \
         and the critical perspectives presented.",
    );
    prompt
}

// ── Direction identifier ────────────────────────────────────────────────

pub const DIRECTIONS_PREAMBLE: &str = "\
You identify promising directions for future research from a scientific paper and \
an objective summary of its critiques.

## Consider
- Gaps and unanswered questions.
- Limitations that future work could address.
- Extensions to new contexts, populations or problems.
- Alternative hypotheses that challenge the paper's claims.
- Novel connections to other fields.
- Methodological improvements.

## Output format
A numbered list of 3 to 5 directions. Each item:
1. Starts with its number (\"1.\", \"2.\", ...).
2. Gives a concise bold **Title:**.
3. Follows with a 1-3 sentence description of the core idea.

Example:
1. **Investigating Mechanism X:** Explore the mechanism behind effect Y, which the \
paper did not explain.
2. **Generalizability to Population Z:** Test whether the findings hold for \
population Z, addressing the sample-specificity critique.

Output ONLY the numbered list.";

pub fn directions_prompt(paper_excerpt: &str, summary: &str, bounds: CountBounds) -> String {
    format!(
        "**Original Paper Text (Excerpt):**\n```text\n{paper_excerpt}\n```\n\n---\n\n\
         **Objective Summary of Critical Perspectives:**\n```text\n{summary}\n```\n\n---\n\n\
         Identify {} general directions for future hypotheses using the specified format.",
        bounds
    )
}

// ── Hypothesis maturer ──────────────────────────────────────────────────

pub const MATURER_PREAMBLE: &str = "\
You turn a general research direction into a concrete, falsifiable hypothesis \
and outline a study for it as a detailed abstract.

## Required sections (bold headings)
1. **Background:** context from the original paper and the knowledge gap.
2. **Hypothesis:** one clear, specific, testable and falsifiable hypothesis.
3. **Proposed Methodology:** sample, design, key measures, procedure, analysis.
4. **Expected Outcomes & Interpretation:** results that would support or refute it.
5. **Significance & Novelty:** the contribution and what makes it new.
6. **Potential Challenges/Limitations:** one or two key hurdles.

## Constraints
- The abstract must be between 500 and 1000 words.
- Every section above must be present and clearly marked.
- Stay on the given direction. Use Markdown.";

pub fn maturer_prompt(direction: &Direction, summary: &str, paper_excerpt: &str) -> String {
    format!(
        "**Original Paper Text (Excerpt for Context):**\n```text\n{paper_excerpt}\n```\n\n---\n\n\
         **Objective Summary of Critical Perspectives:**\n```text\n{summary}\n```\n\n---\n\n\
         **Research Direction to Mature:**\n- **Title:** {}\n- **Description:** {}\n\n---\n\n\
         Write the detailed {MIN_ABSTRACT_WORDS}-{MAX_ABSTRACT_WORDS} word abstract \
         following all instructions.",
        direction.title, direction.description
    )
}

// ── Critic ──────────────────────────────────────────────────────────────

pub const CRITIC_PREAMBLE: &str = "\
You are a critical reviewer of proposed research plans.

## Focus areas
- Hypothesis: clear, specific, testable, falsifiable? Hidden assumptions? Overstated novelty?
- Methodology: feasibility, sample size, design, confounds, controls, ethics, vagueness.
- Analysis plan: appropriate statistics, risk of p-hacking or misinterpretation.
- Expected outcomes: ignored alternative explanations, weak link to conclusions.
- Significance: realistic contribution, or only an incremental step?
- Overall logic: inconsistencies or gaps.

## Rules
- Each criticism must be specific and point at a particular part of the abstract.
- Present the criticisms as a numbered list (\"1.\", \"2.\", ...).
- Be rigorous but constructive.";

pub fn critic_prompt(hypothesis: &Hypothesis, bounds: CountBounds) -> String {
    format!(
        "**Hypothesis Title:** {}\n\n**Hypothesis Abstract to Critique:**\n```text\n{}\n```\n\n---\n\n\
         Generate {} specific criticisms of this proposed research, formatted as a numbered list.",
        hypothesis.title, hypothesis.abstract_text, bounds
    )
}

// ── Debater ─────────────────────────────────────────────────────────────

pub const DEBATE_AGAINST_PREAMBLE: &str = "\
You are a debate agent. Your role is to argue STRONGLY that a specific criticism \
of a research hypothesis HOLDS.

## Rules
- Present a concise (1-2 paragraphs) but compelling argument reinforcing the criticism.
- Answer the defence's previous points if there are any, or add new angles.
- Do NOT argue against the criticism and do NOT be neutral.
- Reference specific parts of the abstract where useful.";

pub const DEBATE_FOR_PREAMBLE: &str = "\
You are a debate agent. Your role is to DEFEND a research hypothesis against a \
specific criticism.

## Rules
- Present a concise (1-2 paragraphs) but compelling argument refuting the criticism.
- Directly counter the points made in support of the criticism.
- Justify the choices made in the abstract.
- Do NOT agree with the criticism and do NOT be neutral.
- Reference specific parts of the abstract where useful.";

pub fn debater_system(side: DebateSide) -> &'static str {
    match side {
        DebateSide::Against => DEBATE_AGAINST_PREAMBLE,
        DebateSide::For => DEBATE_FOR_PREAMBLE,
    }
}

pub fn debater_prompt(
    hypothesis: &Hypothesis,
    criticism: &Criticism,
    side: DebateSide,
    history: &[DebateTurn],
) -> String {
    let history = if history.is_empty() {
        "No previous arguments in this debate.".to_string()
    } else {
        transcript_of(history)
    };
    let instruction = match side {
        DebateSide::Against => "Argue that the criticism holds, answering the defence so far.",
        DebateSide::For => "Refute the criticism, responding to the arguments made for it.",
    };
    format!(
        "**Hypothesis Abstract:**\n```text\n{}\n```\n\n**Criticism Being Debated:**\n```text\n{}\n```\n\n\
         **Debate History So Far:**\n```text\n{history}\n```\n\n---\n\n\
         **Your Turn ({}):** {instruction} Keep it to 1-2 paragraphs.",
        hypothesis.abstract_text,
        criticism.text,
        side.to_string().to_uppercase()
    )
}

// ── Debate summarizer ───────────────────────────────────────────────────

pub const DEBATE_SUMMARIZER_PREAMBLE: &str = "\
You summarize the debates held over every criticism of one research hypothesis.

## For each criticism, capture
- The core point of the criticism.
- The strongest arguments that it holds.
- The strongest arguments defending the hypothesis.
- The apparent outcome or what remains contested.

## Rules
- Be objective and balanced. Do not take sides.
- Focus on substance, not on the back-and-forth.
- Finish with a short overall assessment of which criticisms the hypothesis \
survived. Use Markdown.";

/// Debate summaries for one hypothesis. `debates` pairs each criticism with
/// its turns; `excluded` lists criticisms whose debate could not be held.
pub fn debate_summarizer_prompt(
    hypothesis: &Hypothesis,
    debates: &[(&Criticism, &[DebateTurn])],
    excluded: &[&Criticism],
) -> String {
    let mut prompt = format!("**Hypothesis:** {}\n\n", hypothesis.title);
    for (criticism, turns) in debates {
        prompt.push_str(&format!(
            "### Criticism {}\n{}\n\n**Transcript:**\n```text\n{}\n```\n\n",
            criticism.index + 1,
            criticism.text,
            transcript_of(turns)
        ));
    }
    if !excluded.is_empty() {
        prompt.push_str("**Criticisms not debated (debate failed):**\n");
        for c in excluded {
            prompt.push_str(&format!("- Criticism {}: {}\n", c.index + 1, c.text));
        }
        prompt.push('\n');
    }
    prompt.push_str("---\nSummarize these debates following the instructions.");
    prompt
}

// ── Judge ───────────────────────────────────────────────────────────────

pub const JUDGE_PREAMBLE: &str = "\
You are the final judge. You receive several refined research hypotheses, each \
with an abstract excerpt, the criticisms raised against it, and a summary of the \
debates over those criticisms.

## Task
Select the SINGLE best hypothesis. Weigh these criteria in order:
1. **Novelty (highest priority):** how original is the core idea? Penalize \
hypotheses that closely resemble known prior work.
2. **Validity post-debate:** how sound is it after scrutiny? Which criticisms \
did it survive, and which remain?
3. **Significance:** the impact if it were supported.
4. **Feasibility:** how realistic the proposed study is.

## Output format
1. **Chosen Hypothesis:** the number and exact title, e.g. \
`Chosen Hypothesis: Hypothesis 2 - <title>`.
2. **Reasoning for Selection:** at least 200 words. Address novelty and \
soundness explicitly, compare against the other candidates, and acknowledge \
remaining weaknesses.
3. **Summary of Chosen Hypothesis & Debates:** the core idea and how its \
debates went.";

/// One judge candidate: the hypothesis, its criticisms, its debate summary.
pub struct JudgeCandidate<'a> {
    pub hypothesis: &'a Hypothesis,
    pub criticisms: Vec<&'a Criticism>,
    pub debate_summary: &'a str,
}

pub fn judge_prompt(candidates: &[JudgeCandidate<'_>]) -> String {
    let mut prompt = String::from("Here are the hypotheses to judge:\n\n");
    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "--- Hypothesis {} ---\n**Title:** {}\n**Abstract Excerpt:**\n{}\n\n**Criticisms:**\n",
            i + 1,
            c.hypothesis.title,
            excerpt(&c.hypothesis.abstract_text, JUDGE_ABSTRACT_EXCERPT_CHARS, "...")
        ));
        for crit in &c.criticisms {
            prompt.push_str(&format!(
                "- **Criticism {}:** {}\n",
                crit.index + 1,
                excerpt(&crit.text, JUDGE_CRITICISM_EXCERPT_CHARS, "...")
            ));
        }
        prompt.push_str(&format!(
            "\n**Debate Summary:**\n{}\n---\n\n",
            c.debate_summary.trim()
        ));
    }
    prompt.push_str(
        "Evaluate these hypotheses on novelty, validity post-debate, significance \
         and feasibility, and give your judgement in the specified format.",
    );
    prompt
}

// ── Retry suffixes ──────────────────────────────────────────────────────

/// Appended to a list prompt after its output failed to parse.
pub fn strict_list_suffix(bounds: CountBounds, problem: &str) -> String {
    format!(
        "\n\nIMPORTANT: your previous answer could not be used ({problem}). Reply with \
         ONLY a numbered list of between {} and {} items, one item per number, \
         formatted as `1. **Title:** description`. No introduction and no closing remarks.",
        bounds.min, bounds.max
    )
}

/// Appended to the judge prompt after its choice could not be identified.
pub fn strict_judge_suffix(candidates: usize, problem: &str) -> String {
    format!(
        "\n\nIMPORTANT: your previous answer could not be used ({problem}). The FIRST \
         line of your reply must be exactly `{CHOSEN_LABEL}: Hypothesis N - <title>` \
         where N is between 1 and {candidates}."
    )
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// First `max_chars` characters of `text`, with `marker` appended when cut.
pub fn excerpt(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], marker),
        None => text.to_string(),
    }
}

/// Paper text cut to `max_chars` for direction and maturation prompts.
pub fn paper_excerpt(paper: &str, max_chars: usize) -> String {
    excerpt(paper, max_chars, TRUNCATION_MARKER)
}
