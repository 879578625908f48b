//! End-to-end evaluation through `EvaluationDriver` with scripted agent and
//! judge collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use evalboard_core::{
    Agent, AggregationError, EvalboardError, EvaluationDriver, Judge, JudgeVerdict, ObjectiveKind,
    ObjectiveMode, RunStatus, RunStore, Submission, ValidationError,
};

struct FixedAgent {
    response: String,
    calls: AtomicU32,
}

impl FixedAgent {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Agent for FixedAgent {
    async fn invoke(&self, _model: &str, _prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

struct BrokenAgent;

#[async_trait]
impl Agent for BrokenAgent {
    async fn invoke(&self, _model: &str, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

struct FixedJudge(f64);

#[async_trait]
impl Judge for FixedJudge {
    async fn judge(&self, _response: &str, _expected: Option<&str>) -> anyhow::Result<JudgeVerdict> {
        Ok(JudgeVerdict {
            fraction: self.0,
            message: format!("scored {}", self.0),
        })
    }
}

struct DownJudge;

#[async_trait]
impl Judge for DownJudge {
    async fn judge(&self, _response: &str, _expected: Option<&str>) -> anyhow::Result<JudgeVerdict> {
        anyhow::bail!("judge unavailable")
    }
}

fn translate(objective: ObjectiveMode) -> Submission {
    Submission::new("Translate 'Good morning' into French.", objective, "m")
        .with_expected_output("Bonjour")
}

#[tokio::test]
async fn string_equality_exact_answer_completes_with_full_score() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("Bonjour"), store.clone());

    let resp = driver
        .submit(translate(ObjectiveMode::StringEquality))
        .await
        .expect("submit");

    assert_eq!(resp.status, RunStatus::Completed);
    assert_eq!(resp.score, 100.0);
    assert!(resp.passed);
    assert_eq!(resp.agent_response.as_deref(), Some("Bonjour"));
    let objectives = resp.objectives.expect("objectives");
    let se = objectives.string_equality.expect("string equality result");
    assert!(se.passed);
    assert_eq!(se.score, 100.0);
    assert!(objectives.llm_judge.is_none());

    let stored = store.get(resp.run_id).expect("run stored");
    assert_eq!(stored.status(), RunStatus::Completed);
    assert_eq!(stored.score(), 100.0);
}

#[tokio::test]
async fn string_equality_wrong_answer_completes_but_does_not_pass() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("Buenos días"), store);

    let resp = driver
        .submit(translate(ObjectiveMode::StringEquality))
        .await
        .expect("submit");

    assert_eq!(resp.status, RunStatus::Completed);
    assert_eq!(resp.score, 0.0);
    assert!(!resp.passed);
    assert!(resp.error_message.is_none());
}

#[tokio::test]
async fn combined_mode_averages_scores_and_requires_both_to_pass() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("Bonjour"), store.clone())
        .with_judge(Arc::new(FixedJudge(0.4)));

    let resp = driver
        .submit(translate(ObjectiveMode::Combined))
        .await
        .expect("submit");

    // 100 (exact match) and 40 (judge) average to 70 ...
    assert_eq!(resp.score, 70.0);
    // ... and the judge passed too (any credit passes), so the run passes.
    assert!(resp.passed);
    assert_eq!(resp.status, RunStatus::Completed);

    let driver = EvaluationDriver::new(FixedAgent::new("Salut"), store)
        .with_judge(Arc::new(FixedJudge(0.78)));
    let resp = driver
        .submit(translate(ObjectiveMode::Combined))
        .await
        .expect("submit");

    assert_eq!(resp.score, 39.0);
    assert!(!resp.passed, "string equality failed, so combined fails");
    assert_eq!(resp.status, RunStatus::Completed);
    let objectives = resp.objectives.expect("objectives");
    assert_eq!(
        objectives.llm_judge.expect("judge").reasoning.as_deref(),
        Some("scored 0.78")
    );
}

#[tokio::test]
async fn unavailable_judge_fails_run_with_partial_score() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("Bonjour"), store.clone())
        .with_judge(Arc::new(DownJudge));

    let resp = driver
        .submit(translate(ObjectiveMode::Combined))
        .await
        .expect("partial evaluation is captured, not returned");

    assert_eq!(resp.status, RunStatus::Failed);
    assert_eq!(resp.score, 50.0);
    assert!(!resp.passed);
    let msg = resp.error_message.expect("error message");
    assert!(msg.contains("llmJudge"));
    assert!(msg.contains("judge unavailable"));

    let stored = store.get(resp.run_id).expect("stored");
    assert!(stored.objective_result(ObjectiveKind::StringEquality).is_some());
    assert!(stored.objective_result(ObjectiveKind::LlmJudge).is_none());
}

#[tokio::test]
async fn missing_judge_fails_llm_judge_run() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("4"), store);

    let resp = driver
        .submit(Submission::new("What is 2 + 2?", ObjectiveMode::LlmJudge, "m"))
        .await
        .expect("submit");

    assert_eq!(resp.status, RunStatus::Failed);
    assert_eq!(resp.score, 0.0);
    assert!(resp
        .error_message
        .expect("error message")
        .contains("no judge configured"));
}

#[tokio::test]
async fn agent_failure_fails_run_without_response() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(Arc::new(BrokenAgent), store.clone());

    let resp = driver
        .submit(translate(ObjectiveMode::StringEquality))
        .await
        .expect("agent failure is captured in the run");

    assert_eq!(resp.status, RunStatus::Failed);
    assert_eq!(resp.score, 0.0);
    assert!(resp.agent_response.is_none());
    assert!(resp.objectives.is_none());
    assert!(resp
        .error_message
        .expect("error message")
        .contains("connection refused"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn invalid_submission_creates_no_run() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("Bonjour"), store.clone());

    let err = driver
        .submit(Submission::new("  ", ObjectiveMode::LlmJudge, "m"))
        .await
        .expect_err("empty prompt");
    assert!(matches!(
        err,
        EvalboardError::Validation(ValidationError::EmptyPrompt)
    ));

    let err = driver
        .submit(Submission::new("hi", ObjectiveMode::StringEquality, "m"))
        .await
        .expect_err("missing expected output");
    assert!(matches!(
        err,
        EvalboardError::Validation(ValidationError::MissingExpectedOutput { .. })
    ));

    assert!(store.is_empty());
}

#[tokio::test]
async fn judge_fraction_out_of_range_is_refused_and_recorded() {
    let store = Arc::new(RunStore::new());
    let driver = EvaluationDriver::new(FixedAgent::new("4"), store.clone())
        .with_judge(Arc::new(FixedJudge(1.4)));

    let err = driver
        .submit(Submission::new("What is 2 + 2?", ObjectiveMode::LlmJudge, "m"))
        .await
        .expect_err("aggregation defect surfaces");
    assert!(matches!(
        err,
        EvalboardError::Aggregation(AggregationError::JudgeFractionOutOfRange(_))
    ));

    let runs = store.snapshot();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), RunStatus::Failed);
    assert_eq!(runs[0].score(), 0.0);
    assert!(runs[0]
        .error_message()
        .expect("error message")
        .contains("aggregation invariant violated"));
}

#[tokio::test]
async fn iterations_sample_agent_repeatedly_and_score_once() {
    let store = Arc::new(RunStore::new());
    let agent = FixedAgent::new("Bonjour");
    let driver = EvaluationDriver::new(agent.clone(), store.clone());

    let resp = driver
        .submit(translate(ObjectiveMode::StringEquality).with_iterations(3))
        .await
        .expect("submit");

    assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
    assert_eq!(resp.status, RunStatus::Completed);
    let stored = store.get(resp.run_id).expect("stored");
    assert_eq!(stored.iterations(), 3);
    assert_eq!(stored.objective_results().len(), 1);
}

#[tokio::test]
async fn concurrent_submissions_all_reach_terminal_state() {
    let store = Arc::new(RunStore::new());
    let driver = Arc::new(
        EvaluationDriver::new(FixedAgent::new("Bonjour"), store.clone())
            .with_judge(Arc::new(FixedJudge(0.9))),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let driver = driver.clone();
        let mode = if i % 2 == 0 {
            ObjectiveMode::Combined
        } else {
            ObjectiveMode::StringEquality
        };
        handles.push(tokio::spawn(async move { driver.submit(translate(mode)).await }));
    }
    for handle in handles {
        let resp = handle.await.expect("join").expect("submit");
        assert_eq!(resp.status, RunStatus::Completed);
    }

    assert_eq!(store.len(), 8);
    assert!(store.snapshot().iter().all(|r| r.is_terminal()));
}
