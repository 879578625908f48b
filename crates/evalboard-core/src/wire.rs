//! Request and response shapes exchanged with the surrounding request and
//! presentation layers.
//!
//! Field names follow the established JSON contract: submissions use
//! `expectedOutput`, run views use snake_case except for the nested
//! `objectives` map, and dashboard stats are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::objective::{ObjectiveKind, ObjectiveMode, ObjectiveResult};
use crate::domain::run::{EvaluationRun, RunStatus, Submission};

/// Body of an evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionRequest {
    pub prompt: String,
    #[serde(
        rename = "expectedOutput",
        alias = "expected_output",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_output: Option<String>,
    pub objective: ObjectiveMode,
    pub model: String,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    1
}

impl From<SubmissionRequest> for Submission {
    fn from(req: SubmissionRequest) -> Self {
        Submission {
            prompt: req.prompt,
            expected_output: req.expected_output,
            objective: req.objective,
            model: req.model,
            iterations: req.iterations,
        }
    }
}

/// String-equality entry of the `objectives` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StringEqualityView {
    pub passed: bool,
    pub score: f64,
}

/// LLM-judge entry of the `objectives` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmJudgeView {
    pub passed: bool,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Per-objective outcomes of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectivesView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_equality: Option<StringEqualityView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_judge: Option<LlmJudgeView>,
}

impl ObjectivesView {
    /// `None` when the run has no objective results yet.
    pub fn from_run(run: &EvaluationRun) -> Option<Self> {
        if run.objective_results().is_empty() {
            return None;
        }
        let string_equality = run
            .objective_result(ObjectiveKind::StringEquality)
            .map(|r: &ObjectiveResult| StringEqualityView {
                passed: r.passed,
                score: r.score,
            });
        let llm_judge = run
            .objective_result(ObjectiveKind::LlmJudge)
            .map(|r: &ObjectiveResult| LlmJudgeView {
                passed: r.passed,
                score: r.score,
                reasoning: r.rationale.clone(),
            });
        Some(Self {
            string_equality,
            llm_judge,
        })
    }
}

/// A run as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunView {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<String>,
    pub objective: ObjectiveMode,
    pub model: String,
    pub score: f64,
    pub status: RunStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<ObjectivesView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&EvaluationRun> for RunView {
    fn from(run: &EvaluationRun) -> Self {
        Self {
            id: run.id().to_string(),
            prompt: run.prompt().to_string(),
            expected_output: run.expected_output().map(str::to_string),
            agent_response: run.agent_response().map(str::to_string),
            objective: run.objective(),
            model: run.model().to_string(),
            score: run.score(),
            status: run.status(),
            timestamp: run.timestamp(),
            objectives: ObjectivesView::from_run(run),
            error_message: run.error_message().map(str::to_string),
        }
    }
}

/// Reply to an evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub score: f64,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<ObjectivesView>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&EvaluationRun> for EvaluationResponse {
    fn from(run: &EvaluationRun) -> Self {
        Self {
            run_id: run.id(),
            status: run.status(),
            score: run.score(),
            passed: run.passed(),
            agent_response: run.agent_response().map(str::to_string),
            objectives: ObjectivesView::from_run(run),
            timestamp: run.timestamp(),
            error_message: run.error_message().map(str::to_string),
        }
    }
}
