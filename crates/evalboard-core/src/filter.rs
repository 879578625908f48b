//! Run filter engine.
//!
//! Narrows a run collection with independent, conjunctive criteria: free-text
//! search, exact status/model/objective selection, a score bucket and a
//! rolling date window. Filtering is pure and order-preserving; sorting is the
//! caller's concern.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::objective::{ObjectiveMode, UnknownObjectiveMode};
use crate::domain::run::{EvaluationRun, RunStatus, UnknownRunStatus};

/// Selector value that disables a category.
pub const ALL: &str = "all";

/// Lower bound of the `high` bucket.
pub const HIGH_SCORE_THRESHOLD: f64 = 90.0;

/// Lower bound of the `medium` bucket; also the dashboard success cutoff.
pub const PASSING_SCORE_THRESHOLD: f64 = 70.0;

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Named score range. Buckets are contiguous over [0, 100] and each boundary
/// belongs to the higher bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBucket {
    /// score ≥ 90
    High,
    /// 70 ≤ score < 90
    Medium,
    /// score < 70
    Low,
}

impl ScoreBucket {
    pub const ALL: [ScoreBucket; 3] = [ScoreBucket::High, ScoreBucket::Medium, ScoreBucket::Low];

    /// The bucket a score falls in.
    pub fn of(score: f64) -> Self {
        if score >= HIGH_SCORE_THRESHOLD {
            ScoreBucket::High
        } else if score >= PASSING_SCORE_THRESHOLD {
            ScoreBucket::Medium
        } else {
            ScoreBucket::Low
        }
    }

    pub fn contains(&self, score: f64) -> bool {
        ScoreBucket::of(score) == *self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBucket::High => "high",
            ScoreBucket::Medium => "medium",
            ScoreBucket::Low => "low",
        }
    }

    /// Human-facing label used by dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            ScoreBucket::High => "excellent",
            ScoreBucket::Medium => "good",
            ScoreBucket::Low => "needs work",
        }
    }
}

impl fmt::Display for ScoreBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolling time window relative to the moment of filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DateWindow {
    /// Since the start of the current UTC calendar day.
    Today,
    /// The last 7×24 hours.
    Week,
    /// The last 30×24 hours.
    Month,
}

impl DateWindow {
    pub const ALL: [DateWindow; 3] = [DateWindow::Today, DateWindow::Week, DateWindow::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateWindow::Today => "today",
            DateWindow::Week => "week",
            DateWindow::Month => "month",
        }
    }

    /// Earliest timestamp inside the window as seen from `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateWindow::Today => now.date_naive().and_time(NaiveTime::MIN).and_utc(),
            DateWindow::Week => now - Duration::hours(7 * 24),
            DateWindow::Month => now - Duration::hours(30 * 24),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp >= self.start(now)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing textual filter criteria.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterParseError {
    #[error(transparent)]
    Status(#[from] UnknownRunStatus),

    #[error(transparent)]
    Objective(#[from] UnknownObjectiveMode),

    #[error("unknown score range: {0}")]
    ScoreRange(String),

    #[error("unknown date range: {0}")]
    DateRange(String),
}

impl FromStr for ScoreBucket {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScoreBucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| FilterParseError::ScoreRange(s.to_string()))
    }
}

impl FromStr for DateWindow {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| FilterParseError::DateRange(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Typed filter criteria. `None` disables a category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFilter {
    pub search: Option<String>,
    pub status: Option<RunStatus>,
    pub model: Option<String>,
    pub objective: Option<ObjectiveMode>,
    pub score_range: Option<ScoreBucket>,
    pub date_range: Option<DateWindow>,
}

/// Filter criteria as sent by a browsing client: plain strings where `"all"`
/// or an empty value disables the category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterQuery {
    pub search_query: Option<String>,
    pub status: Option<String>,
    pub model: Option<String>,
    pub objective: Option<String>,
    pub score_range: Option<String>,
    pub date_range: Option<String>,
}

fn selected(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && *v != ALL)
}

impl FilterQuery {
    /// Parse into typed criteria.
    pub fn parse(&self) -> Result<RunFilter, FilterParseError> {
        Ok(RunFilter {
            search: self
                .search_query
                .as_deref()
                .filter(|q| !q.trim().is_empty())
                .map(str::to_string),
            status: selected(self.status.as_deref()).map(str::parse).transpose()?,
            model: selected(self.model.as_deref()).map(str::to_string),
            objective: selected(self.objective.as_deref())
                .map(str::parse)
                .transpose()?,
            score_range: selected(self.score_range.as_deref())
                .map(str::parse)
                .transpose()?,
            date_range: selected(self.date_range.as_deref())
                .map(str::parse)
                .transpose()?,
        })
    }
}

impl RunFilter {
    /// Criteria that keep every run.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_objective(mut self, objective: ObjectiveMode) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn with_score_range(mut self, bucket: ScoreBucket) -> Self {
        self.score_range = Some(bucket);
        self
    }

    pub fn with_date_range(mut self, window: DateWindow) -> Self {
        self.date_range = Some(window);
        self
    }

    /// Whether no category is active.
    pub fn is_unrestricted(&self) -> bool {
        *self == RunFilter::default()
    }

    /// Whether `run` satisfies every active category, evaluated at `now`.
    pub fn matches(&self, run: &EvaluationRun, now: DateTime<Utc>) -> bool {
        if let Some(query) = &self.search {
            if !matches_search(run, query) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if run.status() != status {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if run.model() != model.as_str() {
                return false;
            }
        }
        if let Some(objective) = self.objective {
            if run.objective() != objective {
                return false;
            }
        }
        if let Some(bucket) = self.score_range {
            if !bucket.contains(run.score()) {
                return false;
            }
        }
        if let Some(window) = self.date_range {
            if !window.contains(run.timestamp(), now) {
                return false;
            }
        }
        true
    }
}

/// Case-insensitive substring search over prompt, agent response, expected
/// output and run id. An empty query matches everything.
fn matches_search(run: &EvaluationRun, query: &str) -> bool {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let id = run.id().to_string();
    let hit = [
        Some(run.prompt()),
        run.agent_response(),
        run.expected_output(),
        Some(id.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle));
    hit
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Return the runs matching `filter` at instant `now`, in input order.
pub fn filter_runs(
    runs: &[EvaluationRun],
    filter: &RunFilter,
    now: DateTime<Utc>,
) -> Vec<EvaluationRun> {
    runs.iter()
        .filter(|run| filter.matches(run, now))
        .cloned()
        .collect()
}
