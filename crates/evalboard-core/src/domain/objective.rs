//! Evaluation objectives and per-objective results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{AggregationError, ValidationError};

/// Lowest possible objective or overall score.
pub const MIN_SCORE: f64 = 0.0;

/// Highest possible objective or overall score.
pub const MAX_SCORE: f64 = 100.0;

/// A single evaluation criterion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ObjectiveKind {
    /// Exact comparison of the agent response against the expected output.
    StringEquality,

    /// Graded judgment produced by an LLM judge.
    LlmJudge,
}

impl ObjectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveKind::StringEquality => "stringEquality",
            ObjectiveKind::LlmJudge => "llmJudge",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The evaluation mode requested for a submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectiveMode {
    StringEquality,
    LlmJudge,
    /// Both objectives evaluated; score averaged, verdict conjunctive.
    Combined,
}

impl ObjectiveMode {
    pub const ALL: [ObjectiveMode; 3] = [
        ObjectiveMode::StringEquality,
        ObjectiveMode::LlmJudge,
        ObjectiveMode::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveMode::StringEquality => "string-equality",
            ObjectiveMode::LlmJudge => "llm-judge",
            ObjectiveMode::Combined => "combined",
        }
    }

    /// Objective kinds this mode must produce results for.
    pub fn required_kinds(&self) -> &'static [ObjectiveKind] {
        match self {
            ObjectiveMode::StringEquality => &[ObjectiveKind::StringEquality],
            ObjectiveMode::LlmJudge => &[ObjectiveKind::LlmJudge],
            ObjectiveMode::Combined => &[ObjectiveKind::StringEquality, ObjectiveKind::LlmJudge],
        }
    }

    pub fn includes(&self, kind: ObjectiveKind) -> bool {
        self.required_kinds().contains(&kind)
    }

    /// Whether a submission in this mode must carry an expected output.
    pub fn requires_expected_output(&self) -> bool {
        self.includes(ObjectiveKind::StringEquality)
    }
}

impl fmt::Display for ObjectiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown objective mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown objective mode: {0}")]
pub struct UnknownObjectiveMode(pub String);

impl FromStr for ObjectiveMode {
    type Err = UnknownObjectiveMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectiveMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownObjectiveMode(s.to_string()))
    }
}

/// Outcome of one evaluation criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectiveResult {
    pub kind: ObjectiveKind,
    pub passed: bool,
    /// Score in 0–100.
    pub score: f64,
    /// Judge explanation; only judgment-based kinds carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ObjectiveResult {
    /// Compare the agent response with the expected output.
    ///
    /// Surrounding whitespace is ignored on both sides; the comparison is
    /// otherwise exact and case-sensitive.
    pub fn string_equality(response: &str, expected: &str) -> Self {
        let passed = response.trim() == expected.trim();
        Self {
            kind: ObjectiveKind::StringEquality,
            passed,
            score: if passed { MAX_SCORE } else { MIN_SCORE },
            rationale: None,
        }
    }

    /// Map a judge verdict (`fraction` in 0.0–1.0) onto the 0–100 scale.
    ///
    /// A judged response passes when it receives any credit at all.
    pub fn from_judge(
        fraction: f64,
        message: impl Into<String>,
    ) -> Result<Self, AggregationError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(AggregationError::JudgeFractionOutOfRange(fraction));
        }
        let score = fraction * MAX_SCORE;
        Ok(Self {
            kind: ObjectiveKind::LlmJudge,
            passed: score > MIN_SCORE,
            score,
            rationale: Some(message.into()),
        })
    }

    /// Placeholder for an objective that could not run: zero score, not passed.
    pub fn unevaluable(kind: ObjectiveKind) -> Self {
        Self {
            kind,
            passed: false,
            score: MIN_SCORE,
            rationale: None,
        }
    }

    /// Reject scores outside [0, 100] (NaN included).
    pub fn check_bounds(&self) -> Result<(), AggregationError> {
        if (MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            Ok(())
        } else {
            Err(AggregationError::ScoreOutOfRange {
                kind: self.kind,
                score: self.score,
            })
        }
    }
}

/// Check that a submission carries an expected output when its mode needs one.
pub(crate) fn require_expected_output(
    mode: ObjectiveMode,
    expected_output: Option<&str>,
) -> Result<(), ValidationError> {
    if !mode.requires_expected_output() {
        return Ok(());
    }
    match expected_output {
        Some(text) if !text.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::MissingExpectedOutput {
            objective: mode.to_string(),
        }),
    }
}
