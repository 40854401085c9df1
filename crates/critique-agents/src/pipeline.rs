//! End-to-end analysis: evaluate, summarize, branch per direction, judge.
//!
//! ```text
//!   paper ─┬─ evaluate(low) ──┐
//!          ├─ evaluate(neutral)├─ summarize ─ directions ─┬─ branch(d0) ─┐
//!          └─ evaluate(high) ─┘                           ├─ branch(d1) ─┼─ judge ─ Report
//!                                                          └─ branch(dN) ─┘
//!
//!   branch(d) = mature ─ criticize ─┬─ debate(c0) ─┐
//!                                   ├─ debate(c1) ─┼─ summarize debates
//!                                   └─ debate(cM) ─┘
//! ```
//!
//! Branches and debates fan out on `JoinSet`s and are re-sorted by source
//! index after the join. A branch that fails, times out, or loses every
//! debate is excluded from judgement and annotated in the report.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coordination::debate::DebateExchange;
use coordination::events::PipelineEvent;
use coordination::report::{
    CriticismDebate, Direction, EvaluationOutcome, Hypothesis, HypothesisBranch, Report, Stage,
};
use coordination::resilience::{DegradationLevel, StageReport};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agents::{
    critic, debate_summarizer, debater, directions, evaluator, judge, maturer, summarizer,
    StageOptions,
};
use crate::client::{AnthropicClient, ModelClient, ThrottledClient};
use crate::config::AnalysisConfig;
use crate::errors::PipelineError;
use crate::prompts;

/// Best-effort progress channel. A dropped receiver is not an error.
#[derive(Clone, Default)]
struct EventSink(Option<mpsc::UnboundedSender<PipelineEvent>>);

impl EventSink {
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Everything one direction branch needs, shared across branch tasks.
struct BranchContext {
    client: Arc<dyn ModelClient>,
    options: StageOptions,
    summary: String,
    paper_excerpt: String,
    debate_rounds: u32,
    events: EventSink,
}

/// How far a branch got, readable after it is cancelled or times out.
struct BranchProgress {
    stage: Stage,
    hypothesis: Option<Hypothesis>,
    debates: Vec<CriticismDebate>,
}

pub struct Pipeline {
    client: Arc<dyn ModelClient>,
    options: StageOptions,
    debate_rounds: u32,
    branch_timeout: Duration,
    paper_excerpt_chars: usize,
    cancel: CancellationToken,
    events: EventSink,
}

impl Pipeline {
    /// Build a pipeline over an existing client.
    pub fn new(client: Arc<dyn ModelClient>, config: &AnalysisConfig) -> Self {
        Self {
            client,
            options: StageOptions::from_config(config),
            debate_rounds: config.debate_rounds,
            branch_timeout: config.branch_timeout(),
            paper_excerpt_chars: config.paper_excerpt_chars,
            cancel: CancellationToken::new(),
            events: EventSink::default(),
        }
    }

    /// Validate `config` and build the Anthropic client behind a throttle.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Configuration)?;
        let anthropic = AnthropicClient::new(config)?;
        info!(
            model = anthropic.model(),
            max_in_flight = config.max_in_flight,
            debate_rounds = config.debate_rounds,
            "Pipeline configured"
        );
        let throttled = ThrottledClient::new(Arc::new(anthropic), config.max_in_flight)
            .with_retry_policy(config.rate_limit_retries, config.backoff_base());
        Ok(Self::new(Arc::new(throttled), config))
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = EventSink(Some(tx));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the whole analysis over `paper`.
    pub async fn analyze(&self, paper: &str) -> Result<Report, PipelineError> {
        if paper.trim().is_empty() {
            return Err(PipelineError::Configuration("paper text is empty".into()));
        }
        let started_at = Utc::now();
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        info!(paper_chars = paper.len(), "Starting paper analysis");

        // ── Evaluation ──────────────────────────────────────────────────
        self.events.emit(PipelineEvent::stage_started(Stage::Evaluation));
        let results = self
            .guarded(async {
                let client = self.client.as_ref();
                Ok(evaluator::evaluate_all(client, paper, self.options.evaluation).await)
            })
            .await?;

        let mut evaluations = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        let mut first_error = None;
        for (level, result) in results {
            self.events.emit(PipelineEvent::EvaluationFinished {
                level,
                succeeded: result.is_ok(),
                timestamp: Utc::now(),
            });
            match result {
                Ok(evaluation) => evaluations.push(EvaluationOutcome::Completed(evaluation)),
                Err(e) => {
                    warnings.push(format!("{level}: {e}"));
                    evaluations.push(EvaluationOutcome::Failed {
                        level,
                        reason: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }
        let succeeded = evaluations.iter().filter(|e| e.evaluation().is_some()).count();
        if succeeded == 0 {
            self.events.emit(PipelineEvent::stage_finished(
                Stage::Evaluation,
                DegradationLevel::Unavailable,
            ));
            return Err(first_error
                .unwrap_or_else(|| PipelineError::Upstream("no evaluation produced".into())));
        }
        stages.push(self.finish_stage(StageReport::from_counts(
            Stage::Evaluation,
            succeeded,
            evaluations.len(),
            warnings,
        )));

        // ── Summary ─────────────────────────────────────────────────────
        self.events.emit(PipelineEvent::stage_started(Stage::Summary));
        let summary = self
            .guarded(summarizer::summarize(
                self.client.as_ref(),
                &evaluations,
                self.options.summary,
            ))
            .await?;
        stages.push(self.finish_stage(StageReport::full(Stage::Summary, 1)));

        // ── Directions ──────────────────────────────────────────────────
        self.events.emit(PipelineEvent::stage_started(Stage::Directions));
        let paper_excerpt = prompts::paper_excerpt(paper, self.paper_excerpt_chars);
        let directions = self
            .guarded(directions::identify(
                self.client.as_ref(),
                &paper_excerpt,
                &summary,
                self.options.directions,
            ))
            .await?;
        self.events.emit(PipelineEvent::DirectionsIdentified {
            titles: directions.iter().map(|d| d.title.clone()).collect(),
            timestamp: Utc::now(),
        });
        stages.push(self.finish_stage(StageReport::full(Stage::Directions, 1)));

        // ── Branches ────────────────────────────────────────────────────
        self.events.emit(PipelineEvent::stage_started(Stage::Maturation));
        let ctx = Arc::new(BranchContext {
            client: self.client.clone(),
            options: self.options,
            summary: summary.clone(),
            paper_excerpt,
            debate_rounds: self.debate_rounds,
            events: self.events.clone(),
        });
        let branches = self.run_branches(&ctx, &directions).await;
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("run cancelled during branches".into()));
        }
        for report in branch_stage_reports(&branches) {
            stages.push(self.finish_stage(report));
        }

        let completed = branches.iter().filter(|b| b.is_completed()).count();
        info!(
            completed,
            excluded = branches.len() - completed,
            "Hypothesis branches finished"
        );
        if completed == 0 {
            return Err(PipelineError::AllBranchesFailed(branches.len()));
        }

        // ── Judgement ───────────────────────────────────────────────────
        self.events.emit(PipelineEvent::stage_started(Stage::Judgement));
        let verdict = self
            .guarded(judge::judge(
                self.client.as_ref(),
                &branches,
                self.options.judgement,
            ))
            .await?;
        self.events.emit(PipelineEvent::VerdictReached {
            chosen_direction: verdict.chosen_direction,
            timestamp: Utc::now(),
        });
        stages.push(self.finish_stage(StageReport::full(Stage::Judgement, 1)));

        let report = Report {
            paper_chars: paper.chars().count(),
            evaluations,
            summary,
            directions,
            branches,
            verdict,
            stages,
            prompt_version: prompts::PROMPT_VERSION.to_string(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            level = %report.overall_level(),
            chosen_direction = report.verdict.chosen_direction + 1,
            "Paper analysis complete"
        );
        Ok(report)
    }

    /// Race `fut` against cancellation.
    async fn guarded<T, F>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled("run cancelled".into())),
            res = fut => res,
        }
    }

    fn finish_stage(&self, report: StageReport) -> StageReport {
        if report.is_degraded() {
            warn!(status = %report.status_line(), "Stage degraded");
        } else {
            debug!(status = %report.status_line(), "Stage finished");
        }
        self.events
            .emit(PipelineEvent::stage_finished(report.stage, report.level));
        report
    }

    /// Fan out one task per direction and collect them in direction order.
    async fn run_branches(
        &self,
        ctx: &Arc<BranchContext>,
        directions: &[Direction],
    ) -> Vec<HypothesisBranch> {
        let mut join_set: JoinSet<HypothesisBranch> = JoinSet::new();
        for direction in directions {
            let ctx = ctx.clone();
            let direction = direction.clone();
            let cancel = self.cancel.clone();
            let limit = self.branch_timeout;
            join_set.spawn(async move { run_branch(ctx, direction, cancel, limit).await });
        }

        let mut branches = Vec::with_capacity(directions.len());
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(branch) => branches.push(branch),
                Err(e) => warn!(error = %e, "Branch task panicked"),
            }
        }

        for direction in directions {
            if !branches.iter().any(|b| b.direction().index == direction.index) {
                branches.push(HypothesisBranch::Excluded {
                    direction: direction.clone(),
                    stage: Stage::Maturation,
                    reason: "branch task failed".into(),
                    hypothesis: None,
                    debates: Vec::new(),
                });
            }
        }
        branches.sort_by_key(|b| b.direction().index);
        branches
    }
}

/// One branch under cancellation and its time budget. Never fails: every
/// error becomes an `Excluded` branch at the stage it reached.
async fn run_branch(
    ctx: Arc<BranchContext>,
    direction: Direction,
    cancel: CancellationToken,
    limit: Duration,
) -> HypothesisBranch {
    let progress = Mutex::new(BranchProgress {
        stage: Stage::Maturation,
        hypothesis: None,
        debates: Vec::new(),
    });

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled("run cancelled".into())),
        res = timeout(limit, branch_body(&ctx, &direction, &progress)) => {
            res.unwrap_or(Err(PipelineError::Timeout(limit)))
        }
    };

    let branch = match result {
        Ok(branch) => branch,
        Err(e) => {
            let progress = progress.into_inner();
            debug!(
                direction = direction.index + 1,
                category = %e.retry_category(),
                "Branch stopped by error"
            );
            HypothesisBranch::Excluded {
                direction,
                stage: progress.stage,
                reason: e.to_string(),
                hypothesis: progress.hypothesis,
                debates: progress.debates,
            }
        }
    };

    match &branch {
        HypothesisBranch::Completed { direction, .. } => {
            ctx.events.emit(PipelineEvent::BranchCompleted {
                direction_index: direction.index,
                timestamp: Utc::now(),
            });
        }
        HypothesisBranch::Excluded {
            direction,
            stage,
            reason,
            ..
        } => {
            warn!(
                direction = direction.index + 1,
                stage = %stage,
                reason = %reason,
                "Branch excluded"
            );
            ctx.events.emit(PipelineEvent::BranchExcluded {
                direction_index: direction.index,
                stage: *stage,
                reason: reason.clone(),
                timestamp: Utc::now(),
            });
        }
    }
    branch
}

async fn branch_body(
    ctx: &Arc<BranchContext>,
    direction: &Direction,
    progress: &Mutex<BranchProgress>,
) -> Result<HypothesisBranch, PipelineError> {
    let client = ctx.client.as_ref();

    let hypothesis = maturer::mature(
        client,
        direction,
        &ctx.summary,
        &ctx.paper_excerpt,
        ctx.options.maturation,
    )
    .await?;
    ctx.events.emit(PipelineEvent::HypothesisMatured {
        direction_index: direction.index,
        word_count: hypothesis.word_count,
        timestamp: Utc::now(),
    });
    {
        let mut p = progress.lock().await;
        p.hypothesis = Some(hypothesis.clone());
        p.stage = Stage::Criticism;
    }

    let criticisms = critic::criticize(client, &hypothesis, ctx.options.criticism).await?;
    ctx.events.emit(PipelineEvent::CriticismsListed {
        direction_index: direction.index,
        count: criticisms.len(),
        timestamp: Utc::now(),
    });
    progress.lock().await.stage = Stage::Debate;

    let hypothesis = Arc::new(hypothesis);
    let mut join_set: JoinSet<CriticismDebate> = JoinSet::new();
    for criticism in criticisms.iter().cloned() {
        let ctx = ctx.clone();
        let hypothesis = hypothesis.clone();
        join_set.spawn(async move {
            let events = ctx.events.clone();
            let direction_index = hypothesis.direction_index;
            let criticism_index = criticism.index;
            debater::hold_debate(
                ctx.client.as_ref(),
                &hypothesis,
                criticism,
                ctx.debate_rounds,
                ctx.options.debate_turn,
                move |turn| {
                    events.emit(PipelineEvent::DebateTurnRecorded {
                        direction_index,
                        criticism_index,
                        round: turn.round,
                        side: turn.side,
                        timestamp: Utc::now(),
                    })
                },
            )
            .await
        });
    }

    let mut debates = Vec::with_capacity(criticisms.len());
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok(debate) => debates.push(debate),
            Err(e) => warn!(direction = direction.index + 1, error = %e, "Debate task panicked"),
        }
    }
    for criticism in &criticisms {
        if !debates.iter().any(|d| d.criticism.index == criticism.index) {
            let mut exchange = DebateExchange::new(criticism.index, ctx.debate_rounds);
            exchange
                .abort("debate task failed")
                .map_err(|e| PipelineError::Internal(e.into()))?;
            debates.push(CriticismDebate {
                criticism: criticism.clone(),
                exchange,
            });
        }
    }
    debates.sort_by_key(|d| d.criticism.index);

    let hypothesis = Arc::unwrap_or_clone(hypothesis);
    if !debates.iter().any(|d| d.is_concluded()) {
        return Ok(HypothesisBranch::Excluded {
            direction: direction.clone(),
            stage: Stage::Debate,
            reason: format!("all {} debates were aborted", debates.len()),
            hypothesis: Some(hypothesis),
            debates,
        });
    }

    {
        let mut p = progress.lock().await;
        p.debates = debates.clone();
        p.stage = Stage::DebateSummary;
    }
    let debate_summary = debate_summarizer::summarize_debates(
        client,
        &hypothesis,
        &debates,
        ctx.options.debate_summary,
    )
    .await?;

    info!(
        direction = direction.index + 1,
        debates = debates.len(),
        "Branch completed"
    );
    Ok(HypothesisBranch::Completed {
        direction: direction.clone(),
        hypothesis,
        debates,
        debate_summary,
    })
}

const BRANCH_STAGES: [Stage; 4] = [
    Stage::Maturation,
    Stage::Criticism,
    Stage::Debate,
    Stage::DebateSummary,
];

fn branch_stage_position(stage: Stage) -> usize {
    BRANCH_STAGES
        .iter()
        .position(|s| *s == stage)
        .unwrap_or(BRANCH_STAGES.len())
}

/// One report per branch stage: how many branches reached it, how many got
/// past it, and why the rest were excluded there. Aborted debates in a
/// branch that got past the debate stage mark that stage partial.
fn branch_stage_reports(branches: &[HypothesisBranch]) -> Vec<StageReport> {
    BRANCH_STAGES
        .iter()
        .enumerate()
        .map(|(position, &stage)| {
            let mut attempted = 0;
            let mut succeeded = 0;
            let mut warnings = Vec::new();

            for branch in branches {
                let direction = branch.direction().index + 1;
                let failed_position = match branch {
                    HypothesisBranch::Completed { .. } => BRANCH_STAGES.len(),
                    HypothesisBranch::Excluded { stage, .. } => branch_stage_position(*stage),
                };
                if position < failed_position {
                    attempted += 1;
                    succeeded += 1;
                    if stage == Stage::Debate {
                        for d in branch.debates().iter().filter(|d| !d.is_concluded()) {
                            warnings.push(format!(
                                "direction {direction}, criticism {}: {}",
                                d.criticism.index + 1,
                                d.exchange.abort_reason.as_deref().unwrap_or("aborted")
                            ));
                        }
                    }
                } else if position == failed_position {
                    attempted += 1;
                    if let HypothesisBranch::Excluded { reason, .. } = branch {
                        warnings.push(format!("direction {direction}: {reason}"));
                    }
                }
            }

            if attempted == 0 {
                return StageReport::unavailable(stage, 0, "no branch reached this stage");
            }
            let mut report = StageReport::from_counts(stage, succeeded, attempted, warnings);
            if report.level == DegradationLevel::Full && !report.warnings.is_empty() {
                report.level = DegradationLevel::Partial;
            }
            report
        })
        .collect()
}
