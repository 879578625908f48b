//! Structured observability hooks for the evaluation run lifecycle.
//!
//! Every emitter logs one `tracing` event with a stable `event` field so log
//! pipelines can key on it. Async work should be wrapped with [`run_span`]
//! via `tracing::Instrument` so nested events carry the run id.

use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::domain::objective::ObjectiveKind;
use crate::domain::run::RunStatus;

/// Span tagged with the run id.
pub fn run_span(run_id: Uuid) -> Span {
    tracing::info_span!("evalboard.run", run_id = %run_id)
}

/// Emit event: a submission was accepted and a pending run created.
pub fn emit_run_submitted(run_id: Uuid, objective: &str, model: &str) {
    info!(
        event = "run.submitted",
        run_id = %run_id,
        objective = %objective,
        model = %model,
    );
}

/// Emit event: a submission was rejected before a run existed.
pub fn emit_submission_rejected(reason: &dyn std::fmt::Display) {
    warn!(event = "run.rejected", reason = %reason);
}

/// Emit event: a run moved between lifecycle states.
pub fn emit_run_transition(run_id: Uuid, from: RunStatus, to: RunStatus) {
    info!(event = "run.transition", run_id = %run_id, from = %from, to = %to);
}

/// Emit event: a requested objective could not be evaluated.
pub fn emit_partial_evaluation(run_id: Uuid, kind: ObjectiveKind, reason: &str) {
    warn!(
        event = "run.partial_evaluation",
        run_id = %run_id,
        objective = %kind,
        reason = %reason,
    );
}

/// Emit event: a run reached a terminal state.
pub fn emit_run_finished(run_id: Uuid, status: RunStatus, score: f64, passed: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        score = score,
        passed = passed,
    );
}

/// Emit event: finalizing a run failed (warning level).
pub fn emit_run_finalize_error(run_id: Uuid, error: &dyn std::fmt::Display) {
    warn!(event = "run.finalize_error", run_id = %run_id, error = %error);
}

/// Emit event: a filter was applied to a collection.
pub fn emit_filter_applied(total: usize, matched: usize) {
    tracing::debug!(event = "runs.filtered", total = total, matched = matched);
}
