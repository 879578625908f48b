//! Evaluation runs and their lifecycle.
//!
//! A run is created `pending` from a validated [`Submission`], moves to
//! `running` when the agent is invoked, and ends `completed` or `failed`.
//! Terminal runs never change again; a retry is a new run.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AggregationError, EvalboardError, Result, TransitionError, ValidationError};
use super::objective::{require_expected_output, ObjectiveKind, ObjectiveMode, ObjectiveResult};
use crate::aggregate::{aggregate_scores, Aggregate};

/// Status of an evaluation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub const ALL: [RunStatus; 4] = [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Completed,
        RunStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown run status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status: {0}")]
pub struct UnknownRunStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownRunStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownRunStatus(s.to_string()))
    }
}

/// A request to evaluate one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub prompt: String,
    pub expected_output: Option<String>,
    pub objective: ObjectiveMode,
    pub model: String,
    /// Number of agent samples to draw; only the last one is scored.
    pub iterations: u32,
}

impl Submission {
    pub fn new(prompt: impl Into<String>, objective: ObjectiveMode, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            expected_output: None,
            objective,
            model: model.into(),
            iterations: 1,
        }
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Check the submission before any run is created.
    ///
    /// # Errors
    ///
    /// - `ValidationError::EmptyPrompt`: prompt is blank after trimming.
    /// - `ValidationError::MissingExpectedOutput`: the mode compares against
    ///   an expected output and none (or a blank one) was given.
    /// - `ValidationError::EmptyModel`: model is blank.
    /// - `ValidationError::InvalidIterations`: iterations is zero.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        require_expected_output(self.objective, self.expected_output.as_deref())?;
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        if self.iterations == 0 {
            return Err(ValidationError::InvalidIterations(self.iterations));
        }
        Ok(())
    }
}

/// An objective the evaluator could not run, with the reason it gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveFailure {
    pub kind: ObjectiveKind,
    pub reason: String,
}

/// One evaluated prompt submission with its aggregated outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRun {
    id: Uuid,
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_response: Option<String>,
    objective: ObjectiveMode,
    model: String,
    #[serde(default = "default_iterations")]
    iterations: u32,
    #[serde(default)]
    objective_results: BTreeMap<ObjectiveKind, ObjectiveResult>,
    overall_score: f64,
    status: RunStatus,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

fn default_iterations() -> u32 {
    1
}

impl EvaluationRun {
    /// Validate `submission` and create a `pending` run stamped now.
    pub fn create(submission: Submission) -> std::result::Result<Self, ValidationError> {
        Self::create_at(submission, Utc::now())
    }

    /// Validate `submission` and create a `pending` run with an explicit
    /// creation instant.
    pub fn create_at(
        submission: Submission,
        timestamp: DateTime<Utc>,
    ) -> std::result::Result<Self, ValidationError> {
        submission.validate()?;
        let Submission {
            prompt,
            expected_output,
            objective,
            model,
            iterations,
        } = submission;
        Ok(Self {
            id: Uuid::new_v4(),
            prompt,
            expected_output,
            agent_response: None,
            objective,
            model,
            iterations,
            objective_results: BTreeMap::new(),
            overall_score: 0.0,
            status: RunStatus::Pending,
            timestamp,
            error_message: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn expected_output(&self) -> Option<&str> {
        self.expected_output.as_deref()
    }

    pub fn agent_response(&self) -> Option<&str> {
        self.agent_response.as_deref()
    }

    pub fn objective(&self) -> ObjectiveMode {
        self.objective
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn objective_results(&self) -> &BTreeMap<ObjectiveKind, ObjectiveResult> {
        &self.objective_results
    }

    pub fn objective_result(&self, kind: ObjectiveKind) -> Option<&ObjectiveResult> {
        self.objective_results.get(&kind)
    }

    /// Overall score in 0–100, derived from the objective results.
    pub fn score(&self) -> f64 {
        self.overall_score
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the run satisfied its objectives.
    ///
    /// Only completed runs can pass. Combined runs pass only when every
    /// objective passed, regardless of the averaged score.
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Completed
            && aggregate_scores(self.objective, &self.objective_results)
                .map(|agg| agg.passed)
                .unwrap_or(false)
    }

    fn transition(&mut self, next: RunStatus) -> std::result::Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending → running`: the agent is about to be invoked.
    pub fn start(&mut self) -> std::result::Result<(), TransitionError> {
        self.transition(RunStatus::Running)
    }

    /// Record the agent response and objective results, then finalize.
    ///
    /// The run ends `completed` when every required objective produced a
    /// result, and `failed` with an error naming the missing objectives
    /// otherwise; in both cases the score comes from [`aggregate_scores`].
    /// An aggregation invariant violation, including two results for the
    /// same objective, leaves the run untouched.
    pub fn finish(
        &mut self,
        agent_response: String,
        results: Vec<ObjectiveResult>,
        failures: &[ObjectiveFailure],
    ) -> Result<Aggregate> {
        if self.status != RunStatus::Running {
            return Err(TransitionError {
                from: self.status,
                to: RunStatus::Completed,
            }
            .into());
        }

        let mut by_kind = BTreeMap::new();
        for result in results {
            let kind = result.kind;
            if by_kind.insert(kind, result).is_some() {
                return Err(AggregationError::DuplicateObjective { kind }.into());
            }
        }
        let results = by_kind;
        let aggregate = aggregate_scores(self.objective, &results)?;

        let next = if aggregate.is_partial() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.transition(next)?;
        self.agent_response = Some(agent_response);
        self.objective_results = results;
        self.overall_score = aggregate.overall_score;
        if aggregate.is_partial() {
            self.error_message = Some(partial_evaluation_message(&aggregate.missing, failures));
        }
        Ok(aggregate)
    }

    /// `running → failed` because the evaluation process itself broke
    /// (agent unreachable, aggregation defect). Scores nothing.
    pub fn fail(&mut self, message: impl Into<String>) -> std::result::Result<(), TransitionError> {
        self.transition(RunStatus::Failed)?;
        self.overall_score = 0.0;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Check a run loaded from outside the lifecycle (e.g. a runs file).
    ///
    /// The stored score must be in range and exactly what the aggregator
    /// derives from the stored results; a run without results scores 0.
    /// Results only appear on terminal runs, must belong to the mode, and a
    /// completed run carries one for every objective its mode requires. An
    /// error message may only appear on failed runs.
    pub fn check_invariants(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.overall_score) {
            return Err(AggregationError::OverallOutOfRange(self.overall_score).into());
        }
        let inconsistent = |reason: String| EvalboardError::InconsistentRun {
            id: self.id,
            reason,
        };

        if self.objective_results.is_empty() {
            if self.overall_score != 0.0 {
                return Err(inconsistent(format!(
                    "stored score {} without objective results",
                    self.overall_score
                )));
            }
            if self.status == RunStatus::Completed {
                return Err(inconsistent("completed run has no objective results".to_string()));
            }
        } else {
            if !self.status.is_terminal() {
                return Err(inconsistent(format!("objective results on a {} run", self.status)));
            }
            let aggregate = aggregate_scores(self.objective, &self.objective_results)?;
            if aggregate.overall_score != self.overall_score {
                return Err(inconsistent(format!(
                    "stored score {} does not match derived score {}",
                    self.overall_score, aggregate.overall_score
                )));
            }
            if self.status == RunStatus::Completed && aggregate.is_partial() {
                let missing: Vec<&str> = aggregate.missing.iter().map(|k| k.as_str()).collect();
                return Err(inconsistent(format!(
                    "completed run is missing objective results: {}",
                    missing.join(", ")
                )));
            }
        }

        if self.error_message.is_some() && self.status != RunStatus::Failed {
            return Err(inconsistent(format!("error message on a {} run", self.status)));
        }
        Ok(())
    }
}

fn partial_evaluation_message(missing: &[ObjectiveKind], failures: &[ObjectiveFailure]) -> String {
    missing
        .iter()
        .map(|kind| match failures.iter().find(|f| f.kind == *kind) {
            Some(failure) => format!(
                "objective {} could not be evaluated: {}",
                kind, failure.reason
            ),
            None => format!("objective {} could not be evaluated", kind),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
