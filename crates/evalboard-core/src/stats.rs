//! Dashboard statistics over a run collection.
//!
//! Every figure is derived from the runs passed in; nothing here is stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::run::{EvaluationRun, RunStatus};
use crate::filter::{ScoreBucket, PASSING_SCORE_THRESHOLD};

/// Summary figures shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Number of runs, whatever their status.
    pub total_runs: usize,
    /// Mean overall score across all runs; 0 for an empty collection.
    pub average_score: f64,
    /// Percentage of runs that completed with a score of at least 70.
    pub success_rate: f64,
}

/// Returns true when a run counts toward the dashboard success rate.
pub fn is_success(run: &EvaluationRun) -> bool {
    run.status() == RunStatus::Completed && run.score() >= PASSING_SCORE_THRESHOLD
}

/// Summarize `runs`.
pub fn summarize(runs: &[EvaluationRun]) -> DashboardStats {
    summarize_iter(runs)
}

/// Summarize any collection of borrowed runs.
pub fn summarize_iter<'a, I>(runs: I) -> DashboardStats
where
    I: IntoIterator<Item = &'a EvaluationRun>,
{
    let (total, score_sum, successes) = runs.into_iter().fold(
        (0usize, 0.0f64, 0usize),
        |(total, sum, successes), run| {
            (
                total + 1,
                sum + run.score(),
                successes + usize::from(is_success(run)),
            )
        },
    );
    if total == 0 {
        return DashboardStats::default();
    }

    DashboardStats {
        total_runs: total,
        average_score: score_sum / total as f64,
        success_rate: successes as f64 / total as f64 * 100.0,
    }
}

/// Run counts per score bucket, high to low. Every bucket is present.
pub fn bucket_counts(runs: &[EvaluationRun]) -> BTreeMap<ScoreBucket, usize> {
    let mut counts: BTreeMap<ScoreBucket, usize> =
        ScoreBucket::ALL.into_iter().map(|b| (b, 0)).collect();
    for run in runs {
        *counts.entry(ScoreBucket::of(run.score())).or_default() += 1;
    }
    counts
}

/// Run counts per status. Every status is present.
pub fn status_counts(runs: &[EvaluationRun]) -> Vec<(RunStatus, usize)> {
    RunStatus::ALL
        .into_iter()
        .map(|status| (status, runs.iter().filter(|r| r.status() == status).count()))
        .collect()
}

/// Dashboard statistics per model, keyed by model identifier.
pub fn summarize_by_model(runs: &[EvaluationRun]) -> BTreeMap<String, DashboardStats> {
    let mut grouped: BTreeMap<&str, Vec<&EvaluationRun>> = BTreeMap::new();
    for run in runs {
        grouped.entry(run.model()).or_default().push(run);
    }
    grouped
        .into_iter()
        .map(|(model, runs)| (model.to_string(), summarize_iter(runs)))
        .collect()
}
