//! End-to-end pipeline runs against a scripted model (no network).
//!
//! The scripted client routes on the system preamble, so each stage gets a
//! well-formed reply unless a test hook overrides it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coordination::events::PipelineEvent;
use coordination::report::{BranchShape, SkepticismLevel, Stage};
use coordination::resilience::DegradationLevel;
use critique_agents::prompts::{
    CRITIC_PREAMBLE, DEBATE_AGAINST_PREAMBLE, DEBATE_FOR_PREAMBLE, DEBATE_SUMMARIZER_PREAMBLE,
    DIRECTIONS_PREAMBLE, EVALUATOR_PREAMBLE, JUDGE_PREAMBLE, MATURER_PREAMBLE,
    SUMMARIZER_PREAMBLE,
};
use critique_agents::{AnalysisConfig, CompletionRequest, ModelClient, Pipeline, PipelineError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PAPER: &str = "We report that compound K reduces relapse in a cohort of 40 patients \
                     from a single hospital, measured by self-reported symptom scores.";

const DIRECTIONS: &str = "1. **Causal probing:** Test whether the effect survives ablation.\n\
                          2. **Scaling study:** Repeat with ten times the cohort.\n\
                          3. **Cross-domain transfer:** Apply the protocol to a second disease.";

const CRITICISMS: &str = "1. Single-site cohort.\n\
                          2. Self-reported outcomes.\n\
                          3. No pre-registration.\n\
                          4. Confounding is not addressed.\n\
                          5. Follow-up is too short.";

type Reply = Option<Result<String, PipelineError>>;
type Hook = Box<dyn Fn(&CompletionRequest) -> Reply + Send + Sync>;

/// Replies per stage; `hook` may override any call.
struct ScriptedClient {
    hook: Option<Hook>,
    /// Maturation for this direction title never returns.
    stall_title: Option<&'static str>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self {
            hook: None,
            stall_title: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_hook(hook: impl Fn(&CompletionRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::new()
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn count_system(&self, system: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system == system)
            .count()
    }

    fn first_prompt(&self, system: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.system == system)
            .map(|r| r.prompt.clone())
    }

    fn default_reply(request: &CompletionRequest) -> String {
        let system = request.system.as_str();
        if system.starts_with(EVALUATOR_PREAMBLE) {
            "The methodology has gaps but the effect is interesting.".into()
        } else if system == SUMMARIZER_PREAMBLE {
            "Evaluators agree the cohort is small and disagree on the effect size.".into()
        } else if system == DIRECTIONS_PREAMBLE {
            DIRECTIONS.into()
        } else if system == MATURER_PREAMBLE {
            format!("**Hypothesis:** {}", vec!["word"; 600].join(" "))
        } else if system == CRITIC_PREAMBLE {
            CRITICISMS.into()
        } else if system == DEBATE_AGAINST_PREAMBLE {
            "The criticism stands.".into()
        } else if system == DEBATE_FOR_PREAMBLE {
            "The design already accounts for this.".into()
        } else if system == DEBATE_SUMMARIZER_PREAMBLE {
            "The hypothesis survived most criticisms.".into()
        } else if system == JUDGE_PREAMBLE {
            "**Chosen Hypothesis:** Hypothesis 1 - Causal probing\n\n\
             **Reasoning for Selection:** It is the most novel idea, and its soundness \
             held up across the debated criticisms."
                .into()
        } else {
            "unexpected request".into()
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(title) = self.stall_title {
            if request.system == MATURER_PREAMBLE
                && request.prompt.contains(&format!("**Title:** {title}"))
            {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
            }
        }
        if let Some(reply) = self.hook.as_ref().and_then(|hook| hook(request)) {
            return reply;
        }
        Ok(Self::default_reply(request))
    }
}

fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        api_key: "test".into(),
        temperature: 0.0,
        judge_temperature: 0.0,
        ..AnalysisConfig::default()
    }
}

fn full_branch() -> BranchShape {
    BranchShape::Completed {
        turns_per_debate: vec![6; 5],
    }
}

#[tokio::test]
async fn test_full_run_produces_expected_shape() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    let shape = report.shape();
    assert_eq!(
        shape.evaluations,
        SkepticismLevel::ALL
            .iter()
            .map(|l| (*l, true))
            .collect::<Vec<_>>()
    );
    assert_eq!(shape.directions, 3);
    assert_eq!(shape.branches, vec![full_branch(); 3]);
    assert_eq!(shape.chosen_direction, 0);

    assert_eq!(report.verdict.chosen_title, "Causal probing");
    let justification = &report.verdict.justification;
    assert!(justification.contains("Reasoning for Selection"));
    assert!(justification.contains("novel") && justification.contains("soundness"));
    assert_eq!(report.stages.len(), Stage::ALL.len());
    assert!(!report.is_degraded());
    assert_eq!(report.prompt_version, critique_agents::prompts::PROMPT_VERSION);

    // 3 evaluations, summary, directions, then per branch: maturer, critic,
    // 5 debates x 6 turns, debate summary; then the judge.
    assert_eq!(client.request_count(), 3 + 1 + 1 + 3 * (1 + 1 + 30 + 1) + 1);
    assert_eq!(client.count_system(DEBATE_AGAINST_PREAMBLE), 45);
    assert_eq!(client.count_system(DEBATE_FOR_PREAMBLE), 45);
}

#[tokio::test]
async fn test_failed_maturation_excludes_only_that_branch() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        if req.system == MATURER_PREAMBLE && req.prompt.contains("**Title:** Scaling study") {
            return Some(Err(PipelineError::Upstream("502 bad gateway".into())));
        }
        if req.system == JUDGE_PREAMBLE {
            return Some(Ok("Chosen Hypothesis: Hypothesis 2 - Cross-domain transfer".into()));
        }
        None
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    let shape = report.shape();
    assert_eq!(
        shape.branches,
        vec![
            full_branch(),
            BranchShape::Excluded(Stage::Maturation),
            full_branch()
        ]
    );
    // numbering in the judge prompt skips the excluded branch
    assert_eq!(report.verdict.chosen_direction, 2);

    let maturation = report.stage(Stage::Maturation).unwrap();
    assert_eq!(maturation.level, DegradationLevel::Partial);
    assert_eq!((maturation.succeeded, maturation.attempted), (2, 3));
    assert!(maturation.warnings[0].contains("502 bad gateway"));
    assert!(report.is_degraded());

    let judge_prompt = client
        .requests
        .lock()
        .unwrap()
        .iter()
        .find(|r| r.system == JUDGE_PREAMBLE)
        .map(|r| r.prompt.clone())
        .unwrap();
    assert!(!judge_prompt.contains("Scaling study"));
}

#[tokio::test]
async fn test_unparseable_directions_retried_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let client = Arc::new(ScriptedClient::with_hook(move |req| {
        if req.system == DIRECTIONS_PREAMBLE && seen.fetch_add(1, Ordering::SeqCst) == 0 {
            return Some(Ok("There are many promising avenues here.".into()));
        }
        None
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.directions.len(), 3);
    let retry = client
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.system == DIRECTIONS_PREAMBLE)
        .nth(1)
        .map(|r| r.prompt.clone())
        .unwrap();
    assert!(retry.contains("between 3 and 5"));
}

#[tokio::test]
async fn test_directions_parse_failure_twice_fails_run() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        (req.system == DIRECTIONS_PREAMBLE).then(|| Ok("1. Only one idea.".into()))
    }));
    let pipeline = Pipeline::new(client, &test_config());

    let err = pipeline.analyze(PAPER).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Parse {
            stage: Stage::Directions,
            ..
        }
    ));
}

#[tokio::test]
async fn test_all_branches_failing_yields_no_verdict() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        (req.system == MATURER_PREAMBLE).then(|| Err(PipelineError::EmptyResponse))
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let err = pipeline.analyze(PAPER).await.unwrap_err();
    assert!(matches!(err, PipelineError::AllBranchesFailed(3)));
    assert_eq!(client.count_system(JUDGE_PREAMBLE), 0);
}

#[tokio::test]
async fn test_one_failed_evaluation_degrades_but_continues() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        (req.system.starts_with(EVALUATOR_PREAMBLE) && req.system.contains("High Skepticism"))
            .then(|| Err(PipelineError::Upstream("503".into())))
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    let shape = report.shape();
    assert_eq!(
        shape.evaluations,
        vec![
            (SkepticismLevel::Low, true),
            (SkepticismLevel::Neutral, true),
            (SkepticismLevel::High, false),
        ]
    );
    let evaluation = report.stage(Stage::Evaluation).unwrap();
    assert_eq!(evaluation.level, DegradationLevel::Partial);

    let summary_prompt = client
        .requests
        .lock()
        .unwrap()
        .iter()
        .find(|r| r.system == SUMMARIZER_PREAMBLE)
        .map(|r| r.prompt.clone())
        .unwrap();
    assert!(summary_prompt.contains("High Skepticism):** unavailable"));
}

#[tokio::test]
async fn test_all_evaluations_failing_fails_run() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        req.system
            .starts_with(EVALUATOR_PREAMBLE)
            .then(|| Err(PipelineError::Upstream("down".into())))
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let err = pipeline.analyze(PAPER).await.unwrap_err();
    assert!(matches!(err, PipelineError::Upstream(_)));
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn test_failed_debate_turn_keeps_branch() {
    // Every debate over the 4th criticism loses its defence turn.
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        (req.system == DEBATE_FOR_PREAMBLE && req.prompt.contains("Confounding is not addressed"))
            .then(|| Err(PipelineError::Upstream("reset".into())))
    }));
    let pipeline = Pipeline::new(client, &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    let partial = BranchShape::Completed {
        turns_per_debate: vec![6, 6, 6, 1, 6],
    };
    assert_eq!(report.shape().branches, vec![partial; 3]);
    for branch in &report.branches {
        assert_eq!(branch.excluded_criticisms(), vec![3]);
    }
    assert_eq!(
        report.stage(Stage::Debate).unwrap().level,
        DegradationLevel::Partial
    );
}

#[tokio::test]
async fn test_critic_parse_failure_twice_excludes_branch() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        if req.system == CRITIC_PREAMBLE && req.prompt.contains("**Hypothesis Title:** Scaling study")
        {
            return Some(Ok("1. Only one concern.".into()));
        }
        if req.system == JUDGE_PREAMBLE {
            return Some(Ok("Chosen Hypothesis: Hypothesis 2 - Cross-domain transfer".into()));
        }
        None
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    assert_eq!(
        report.shape().branches,
        vec![
            full_branch(),
            BranchShape::Excluded(Stage::Criticism),
            full_branch()
        ]
    );
    // first try plus one stricter retry for the failing branch
    assert_eq!(client.count_system(CRITIC_PREAMBLE), 2 + 2);
    assert!(report.branches[1].hypothesis().is_some());
    assert!(report.branches[1].debates().is_empty());

    let criticism = report.stage(Stage::Criticism).unwrap();
    assert_eq!(criticism.level, DegradationLevel::Partial);
    assert_eq!((criticism.succeeded, criticism.attempted), (2, 3));
    assert_eq!(criticism.warnings.len(), 1);
    assert!(criticism.warnings[0].starts_with("direction 2: "));
    assert!(criticism.warnings[0].contains("expected 5-10 items, found 1"));
    assert_eq!(report.stage(Stage::Debate).unwrap().attempted, 2);

    assert_eq!(report.verdict.chosen_direction, 2);
    assert_eq!(report.verdict.chosen_title, "Cross-domain transfer");
    let judge_prompt = client.first_prompt(JUDGE_PREAMBLE).unwrap();
    assert!(!judge_prompt.contains("Scaling study"));
}

#[tokio::test]
async fn test_all_debates_aborted_excludes_branch_with_debates() {
    const MARKER: &str = "multi-site-cohort-plan";
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        if req.system == MATURER_PREAMBLE && req.prompt.contains("**Title:** Scaling study") {
            return Some(Ok(format!("{MARKER} {}", vec!["word"; 600].join(" "))));
        }
        let debating = req.system == DEBATE_AGAINST_PREAMBLE || req.system == DEBATE_FOR_PREAMBLE;
        (debating && req.prompt.contains(MARKER))
            .then(|| Err(PipelineError::Upstream("connection reset".into())))
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    assert_eq!(
        report.shape().branches,
        vec![
            full_branch(),
            BranchShape::Excluded(Stage::Debate),
            full_branch()
        ]
    );
    let excluded = &report.branches[1];
    assert_eq!(excluded.debates().len(), 5);
    assert_eq!(excluded.excluded_criticisms(), vec![0, 1, 2, 3, 4]);
    assert!(excluded
        .debates()
        .iter()
        .all(|d| d.exchange.turns().is_empty() && d.exchange.abort_reason.is_some()));

    let debate = report.stage(Stage::Debate).unwrap();
    assert_eq!(debate.level, DegradationLevel::Partial);
    assert_eq!((debate.succeeded, debate.attempted), (2, 3));
    assert_eq!(
        debate.warnings,
        vec!["direction 2: all 5 debates were aborted".to_string()]
    );
    // the excluded branch never reaches its debate summary
    assert_eq!(client.count_system(DEBATE_SUMMARIZER_PREAMBLE), 2);

    assert_eq!(report.verdict.chosen_direction, 0);
    let judge_prompt = client.first_prompt(JUDGE_PREAMBLE).unwrap();
    assert!(!judge_prompt.contains(MARKER));
}

#[tokio::test]
async fn test_debate_summary_failure_keeps_finished_debates() {
    let client = Arc::new(ScriptedClient::with_hook(|req| {
        (req.system == DEBATE_SUMMARIZER_PREAMBLE
            && req.prompt.starts_with("**Hypothesis:** Scaling study"))
        .then(|| Err(PipelineError::Upstream("overloaded".into())))
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config());

    let report = pipeline.analyze(PAPER).await.unwrap();

    assert_eq!(
        report.shape().branches,
        vec![
            full_branch(),
            BranchShape::Excluded(Stage::DebateSummary),
            full_branch()
        ]
    );
    let excluded = &report.branches[1];
    assert_eq!(excluded.debates().len(), 5);
    assert!(excluded
        .debates()
        .iter()
        .all(|d| d.is_concluded() && d.exchange.turns().len() == 6));

    let debate = report.stage(Stage::Debate).unwrap();
    assert_eq!(debate.level, DegradationLevel::Full);
    let summary = report.stage(Stage::DebateSummary).unwrap();
    assert_eq!(summary.level, DegradationLevel::Partial);
    assert_eq!((summary.succeeded, summary.attempted), (2, 3));
    assert_eq!(
        summary.warnings,
        vec!["direction 2: Upstream error: overloaded".to_string()]
    );

    assert_eq!(report.verdict.chosen_direction, 0);
    assert_eq!(report.verdict.chosen_title, "Causal probing");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["branches"][1]["status"], "excluded");
    assert_eq!(json["branches"][1]["debates"].as_array().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_branch_times_out_and_is_excluded() {
    let client = Arc::new(ScriptedClient {
        stall_title: Some("Causal probing"),
        ..ScriptedClient::new()
    });
    let config = AnalysisConfig {
        branch_timeout_secs: 60,
        ..test_config()
    };
    let pipeline = Pipeline::new(client, &config);

    let report = pipeline.analyze(PAPER).await.unwrap();

    let shape = report.shape();
    assert_eq!(shape.branches[0], BranchShape::Excluded(Stage::Maturation));
    assert_eq!(shape.branches[1], full_branch());
    assert!(report.stage(Stage::Maturation).unwrap().warnings[0].contains("Timed out"));
    // "Hypothesis 1" now refers to the first completed branch
    assert_eq!(report.verdict.chosen_direction, 1);
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let client = Arc::new(ScriptedClient::new());
    let token = CancellationToken::new();
    token.cancel();
    let pipeline = Pipeline::new(client.clone(), &test_config()).with_cancellation(token);

    let err = pipeline.analyze(PAPER).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled(_)));
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_cancel_during_debates_stops_run() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let client = Arc::new(ScriptedClient::with_hook(move |req| {
        if req.system == DEBATE_AGAINST_PREAMBLE {
            trigger.cancel();
        }
        None
    }));
    let pipeline = Pipeline::new(client.clone(), &test_config()).with_cancellation(token);

    let err = pipeline.analyze(PAPER).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled(_)));
    assert_eq!(client.count_system(JUDGE_PREAMBLE), 0);
}

#[tokio::test]
async fn test_events_follow_progress() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(Arc::new(ScriptedClient::new()), &test_config()).with_events(tx);

    pipeline.analyze(PAPER).await.unwrap();
    drop(pipeline);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let count = |kind: &str| events.iter().filter(|e| e.event_type() == kind).count();
    assert_eq!(count("evaluation_finished"), 3);
    assert_eq!(count("directions_identified"), 1);
    assert_eq!(count("hypothesis_matured"), 3);
    assert_eq!(count("debate_turn_recorded"), 90);
    assert_eq!(count("branch_completed"), 3);
    assert_eq!(count("branch_excluded"), 0);
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::StageStarted {
            stage: Stage::Evaluation,
            ..
        })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::VerdictReached { chosen_direction: 0, .. })));
}

#[tokio::test]
async fn test_zero_temperature_reruns_share_shape() {
    let config = test_config();
    let first_client = Arc::new(ScriptedClient::new());
    let first = Pipeline::new(first_client.clone(), &config)
        .analyze(PAPER)
        .await
        .unwrap();
    let second = Pipeline::new(Arc::new(ScriptedClient::new()), &config)
        .analyze(PAPER)
        .await
        .unwrap();

    assert_eq!(first.shape(), second.shape());
    assert!(first_client
        .requests
        .lock()
        .unwrap()
        .iter()
        .all(|r| r.options.temperature == 0.0));
}

#[tokio::test]
async fn test_empty_paper_rejected() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = Pipeline::new(client.clone(), &test_config());

    assert!(matches!(
        pipeline.analyze("  \n").await,
        Err(PipelineError::Configuration(_))
    ));
    assert_eq!(client.request_count(), 0);
}
