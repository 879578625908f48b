//! Evalboard Core Library
//!
//! Scores agent responses against evaluation objectives, folds the results
//! into comparable runs, and filters and summarizes run collections.

pub mod aggregate;
pub mod domain;
pub mod driver;
pub mod filter;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod wire;

pub use aggregate::{aggregate_scores, Aggregate};

pub use domain::{
    AggregationError, EvalboardError, EvaluationRun, ObjectiveFailure, ObjectiveKind,
    ObjectiveMode, ObjectiveResult, Result, RunStatus, Submission, TransitionError,
    ValidationError,
};

pub use driver::{Agent, EvaluationDriver, Judge, JudgeVerdict};
pub use filter::{
    filter_runs, DateWindow, FilterParseError, FilterQuery, RunFilter, ScoreBucket,
    HIGH_SCORE_THRESHOLD, PASSING_SCORE_THRESHOLD,
};
pub use reporting::{
    read_runs_json, render_dashboard_md, write_dashboard_md, write_runs_json, write_stats_json,
    BucketCountArtifact, DashboardArtifact,
};
pub use stats::{summarize, summarize_by_model, summarize_iter, DashboardStats};
pub use store::RunStore;
pub use wire::{EvaluationResponse, ObjectivesView, RunView, SubmissionRequest};

pub use metrics::METRICS;
pub use obs::{
    emit_filter_applied, emit_partial_evaluation, emit_run_finalize_error, emit_run_finished,
    emit_run_submitted, emit_run_transition, emit_submission_rejected, run_span,
};
pub use telemetry::init_tracing;

/// Evalboard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
