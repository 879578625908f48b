//! Domain-level error taxonomy for evaluation runs.

use super::objective::ObjectiveKind;
use super::run::RunStatus;

/// Errors produced while validating a submission, before any run exists.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("expected output is required for objective {objective}")]
    MissingExpectedOutput { objective: String },

    #[error("model must not be empty")]
    EmptyModel,

    #[error("iterations must be at least 1, got {0}")]
    InvalidIterations(u32),
}

/// Defects detected by the score aggregator. These are never clamped away.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("objective {kind} is not part of objective mode {mode}")]
    UnexpectedObjective { kind: ObjectiveKind, mode: String },

    #[error("objective {kind} score {score} is outside [0, 100]")]
    ScoreOutOfRange { kind: ObjectiveKind, score: f64 },

    #[error("overall score {0} is outside [0, 100]")]
    OverallOutOfRange(f64),

    #[error("judge score fraction {0} is outside [0, 1]")]
    JudgeFractionOutOfRange(f64),

    #[error("objective {kind} was reported more than once")]
    DuplicateObjective { kind: ObjectiveKind },
}

/// Attempted a state transition the run lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("illegal run transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Evalboard domain errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalboardError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("aggregation invariant violated: {0}")]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("run not found: {0}")]
    RunNotFound(uuid::Uuid),

    #[error("duplicate run id: {0}")]
    DuplicateRun(uuid::Uuid),

    #[error("run {0} is already finalized")]
    RunFinalized(uuid::Uuid),

    #[error("inconsistent run {id}: {reason}")]
    InconsistentRun { id: uuid::Uuid, reason: String },
}

/// Result type for evalboard domain operations.
pub type Result<T> = std::result::Result<T, EvalboardError>;
