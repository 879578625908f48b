//! Domain models for evaluation runs.
//!
//! Canonical definitions for the core entities:
//! - `ObjectiveResult`: outcome of one evaluation criterion
//! - `EvaluationRun`: one evaluated prompt and its lifecycle
//! - `Submission`: the validated request that creates a run

pub mod error;
pub mod objective;
pub mod run;

// Re-export main types and errors
pub use error::{AggregationError, EvalboardError, Result, TransitionError, ValidationError};
pub use objective::{ObjectiveKind, ObjectiveMode, ObjectiveResult, UnknownObjectiveMode};
pub use run::{EvaluationRun, ObjectiveFailure, RunStatus, Submission, UnknownRunStatus};
