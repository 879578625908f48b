//! Score aggregation.
//!
//! Folds the per-objective results of a run into one overall score and one
//! pass/fail verdict. The score is the equal-weight mean of the objectives the
//! mode requires; the verdict is the conjunction of their `passed` flags. In
//! combined mode the two axes therefore disagree on purpose: scores 100 and 40
//! average to 70, yet the run does not pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::AggregationError;
use crate::domain::objective::{ObjectiveKind, ObjectiveMode, ObjectiveResult, MAX_SCORE, MIN_SCORE};

/// The aggregated outcome of a run's objectives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    /// Mean of the required objective scores, 0–100.
    pub overall_score: f64,
    /// True only when every required objective passed.
    pub passed: bool,
    /// Required objectives with no result; each counted as score 0, not passed.
    pub missing: Vec<ObjectiveKind>,
}

impl Aggregate {
    /// Whether any required objective was never evaluated.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Aggregate `results` according to `mode`.
///
/// # Errors
///
/// - `AggregationError::UnexpectedObjective`: a result's kind is not part of
///   `mode`, or a result is filed under the wrong kind.
/// - `AggregationError::ScoreOutOfRange`: an objective score is outside
///   [0, 100] or NaN.
/// - `AggregationError::OverallOutOfRange`: the derived score is outside
///   [0, 100].
pub fn aggregate_scores(
    mode: ObjectiveMode,
    results: &BTreeMap<ObjectiveKind, ObjectiveResult>,
) -> Result<Aggregate, AggregationError> {
    for (kind, result) in results {
        if !mode.includes(*kind) || result.kind != *kind {
            return Err(AggregationError::UnexpectedObjective {
                kind: result.kind,
                mode: mode.to_string(),
            });
        }
        result.check_bounds()?;
    }

    let required = mode.required_kinds();
    let mut total = 0.0;
    let mut passed = true;
    let mut missing = Vec::new();

    for kind in required {
        match results.get(kind) {
            Some(result) => {
                total += result.score;
                passed &= result.passed;
            }
            None => {
                let placeholder = ObjectiveResult::unevaluable(*kind);
                total += placeholder.score;
                passed &= placeholder.passed;
                missing.push(*kind);
            }
        }
    }

    let overall_score = total / required.len() as f64;
    if !(MIN_SCORE..=MAX_SCORE).contains(&overall_score) {
        return Err(AggregationError::OverallOutOfRange(overall_score));
    }

    Ok(Aggregate {
        overall_score,
        passed,
        missing,
    })
}
