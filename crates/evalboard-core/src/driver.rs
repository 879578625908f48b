//! Evaluation driver.
//!
//! Walks one submission through the run lifecycle:
//! validate → `pending` → `running` → invoke agent → score objectives →
//! aggregate → `completed` | `failed`.
//!
//! The agent under test and the LLM judge are collaborators behind the
//! [`Agent`] and [`Judge`] traits. Evaluation failures are captured inside the
//! terminal run; only validation errors, store errors and aggregation defects
//! are returned as `Err`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::domain::error::{AggregationError, EvalboardError, Result};
use crate::domain::objective::{ObjectiveKind, ObjectiveResult};
use crate::domain::run::{EvaluationRun, ObjectiveFailure, RunStatus, Submission};
use crate::metrics::METRICS;
use crate::obs;
use crate::store::RunStore;
use crate::wire::EvaluationResponse;

/// The agent/model variant under test.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Produce a response to `prompt` using `model`.
    async fn invoke(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}

/// A judge's verdict on one response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeVerdict {
    /// How close the response is to what was expected, 0.0–1.0.
    pub fraction: f64,
    /// Explanation of the verdict.
    pub message: String,
}

/// Grades a response, usually by asking another model.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, response: &str, expected: Option<&str>) -> anyhow::Result<JudgeVerdict>;
}

/// Drives submissions to terminal runs and records them in a [`RunStore`].
pub struct EvaluationDriver {
    agent: Arc<dyn Agent>,
    judge: Option<Arc<dyn Judge>>,
    store: Arc<RunStore>,
}

impl EvaluationDriver {
    pub fn new(agent: Arc<dyn Agent>, store: Arc<RunStore>) -> Self {
        Self {
            agent,
            judge: None,
            store,
        }
    }

    /// Attach the judge used by `llm-judge` and `combined` runs. Without one,
    /// those objectives cannot be evaluated.
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn store(&self) -> &Arc<RunStore> {
        &self.store
    }

    /// Evaluate `submission` and return the caller-facing response.
    ///
    /// # Errors
    ///
    /// - `EvalboardError::Validation`: the submission is malformed; no run
    ///   was created.
    /// - `EvalboardError::Aggregation`: an objective produced a result the
    ///   aggregator refuses; the run is recorded as `failed` naming the defect.
    pub async fn submit(&self, submission: Submission) -> Result<EvaluationResponse> {
        let run = match EvaluationRun::create(submission) {
            Ok(run) => run,
            Err(e) => {
                METRICS.inc_rejected();
                obs::emit_submission_rejected(&e);
                return Err(e.into());
            }
        };
        METRICS.inc_submitted();
        obs::emit_run_submitted(run.id(), run.objective().as_str(), run.model());
        self.store.insert(run.clone())?;

        let span = obs::run_span(run.id());
        let run = self.evaluate(run).instrument(span).await?;
        Ok(EvaluationResponse::from(&run))
    }

    async fn evaluate(&self, mut run: EvaluationRun) -> Result<EvaluationRun> {
        run.start()?;
        obs::emit_run_transition(run.id(), RunStatus::Pending, RunStatus::Running);
        self.store.update(&run)?;

        let response = match self.sample_agent(&run).await {
            Ok(response) => response,
            Err(e) => {
                self.finalize_failed(&mut run, format!("agent invocation failed: {e:#}"))?;
                return Ok(run);
            }
        };

        let outcome = self
            .score_objectives(&run, &response)
            .await
            .map_err(EvalboardError::from)
            .and_then(|(results, failures)| {
                for failure in &failures {
                    obs::emit_partial_evaluation(run.id(), failure.kind, &failure.reason);
                }
                run.finish(response, results, &failures)
            });

        match outcome {
            Ok(aggregate) => {
                obs::emit_run_transition(run.id(), RunStatus::Running, run.status());
                self.store.update(&run)?;
                if run.status() == RunStatus::Completed {
                    METRICS.inc_completed();
                } else {
                    METRICS.inc_failed();
                }
                obs::emit_run_finished(run.id(), run.status(), run.score(), aggregate.passed);
                Ok(run)
            }
            Err(EvalboardError::Aggregation(defect)) => {
                obs::emit_run_finalize_error(run.id(), &defect);
                self.finalize_failed(&mut run, format!("aggregation invariant violated: {defect}"))?;
                Err(defect.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Invoke the agent once per requested iteration and keep the last
    /// response.
    async fn sample_agent(&self, run: &EvaluationRun) -> anyhow::Result<String> {
        let mut response = String::new();
        for iteration in 1..=run.iterations() {
            debug!(iteration, model = %run.model(), "invoking agent");
            response = self.agent.invoke(run.model(), run.prompt()).await?;
        }
        Ok(response)
    }

    /// Score every objective the run's mode requires. Objectives whose
    /// collaborator is unavailable are reported as failures rather than
    /// results; a judge verdict outside [0, 1] is a defect and aborts scoring.
    async fn score_objectives(
        &self,
        run: &EvaluationRun,
        response: &str,
    ) -> std::result::Result<(Vec<ObjectiveResult>, Vec<ObjectiveFailure>), AggregationError> {
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for kind in run.objective().required_kinds() {
            match kind {
                ObjectiveKind::StringEquality => {
                    let expected = run.expected_output().unwrap_or_default();
                    results.push(ObjectiveResult::string_equality(response, expected));
                }
                ObjectiveKind::LlmJudge => match self.judge_response(run, response).await {
                    Ok(verdict) => results.push(ObjectiveResult::from_judge(
                        verdict.fraction,
                        verdict.message,
                    )?),
                    Err(reason) => failures.push(ObjectiveFailure {
                        kind: *kind,
                        reason,
                    }),
                },
            }
        }

        Ok((results, failures))
    }

    async fn judge_response(
        &self,
        run: &EvaluationRun,
        response: &str,
    ) -> std::result::Result<JudgeVerdict, String> {
        let judge = self
            .judge
            .as_ref()
            .ok_or_else(|| "no judge configured".to_string())?;
        judge
            .judge(response, run.expected_output())
            .await
            .map_err(|e| format!("{e:#}"))
    }

    fn finalize_failed(&self, run: &mut EvaluationRun, message: String) -> Result<()> {
        run.fail(message)?;
        obs::emit_run_transition(run.id(), RunStatus::Running, RunStatus::Failed);
        self.store.update(run)?;
        METRICS.inc_failed();
        obs::emit_run_finished(run.id(), run.status(), run.score(), false);
        Ok(())
    }
}
