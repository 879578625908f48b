use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::domain::run::EvaluationRun;
use crate::filter::ScoreBucket;
use crate::stats::{bucket_counts, status_counts, summarize, summarize_by_model, DashboardStats};

/// Current schema version of the dashboard artifact.
pub const DASHBOARD_SCHEMA_VERSION: &str = "1.0";

/// Count of runs in one score bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketCountArtifact {
    pub bucket: ScoreBucket,
    pub label: String,
    pub runs: usize,
}

/// Canonical dashboard artifact written next to the runs file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub stats: DashboardStats,
    pub status_counts: BTreeMap<String, usize>,
    pub buckets: Vec<BucketCountArtifact>,
    pub by_model: BTreeMap<String, DashboardStats>,
}

impl DashboardArtifact {
    /// Derive the artifact from a run collection.
    pub fn build(runs: &[EvaluationRun], generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: DASHBOARD_SCHEMA_VERSION.to_string(),
            generated_at,
            stats: summarize(runs),
            status_counts: status_counts(runs)
                .into_iter()
                .map(|(status, n)| (status.to_string(), n))
                .collect(),
            buckets: bucket_counts(runs)
                .into_iter()
                .map(|(bucket, runs)| BucketCountArtifact {
                    bucket,
                    label: bucket.label().to_string(),
                    runs,
                })
                .collect(),
            by_model: summarize_by_model(runs),
        }
    }
}

/// Load runs from a JSON array file. A missing file is an empty collection.
///
/// Every run is checked against the lifecycle invariants; a tampered score is
/// an error rather than something to display.
pub fn read_runs_json(path: &Path) -> Result<Vec<EvaluationRun>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let runs: Vec<EvaluationRun> =
        serde_json::from_str(&content).with_context(|| format!("parse runs from {:?}", path))?;
    for run in &runs {
        run.check_invariants()
            .with_context(|| format!("invalid run {} in {:?}", run.id(), path))?;
    }
    Ok(runs)
}

/// Write runs as a pretty JSON array.
///
/// The content goes to a temp file in the same directory which is then
/// renamed over `path`, so an interrupted write never truncates the history.
pub fn write_runs_json(path: &Path, runs: &[EvaluationRun]) -> Result<()> {
    let content = serde_json::to_string_pretty(runs).context("serialize runs")?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp =
        NamedTempFile::new_in(dir).with_context(|| format!("create temp file in {:?}", dir))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("write temp file for {:?}", path))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for {:?}", path))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {:?}", path))?;
    Ok(())
}

/// Write stats.json in pretty JSON format.
pub fn write_stats_json(path: &Path, artifact: &DashboardArtifact) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact).context("serialize dashboard artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render the markdown dashboard.
pub fn render_dashboard_md(artifact: &DashboardArtifact) -> String {
    let mut out = String::new();
    out.push_str("# Evaluation Dashboard\n\n");
    out.push_str(&format!(
        "- total runs: {}\n- average score: {:.2}\n- success rate: {:.2}%\n\n",
        artifact.stats.total_runs, artifact.stats.average_score, artifact.stats.success_rate
    ));

    out.push_str("## Status\n");
    for (status, n) in &artifact.status_counts {
        out.push_str(&format!("- {}: {}\n", status, n));
    }
    out.push('\n');

    out.push_str("## Scores\n");
    for b in &artifact.buckets {
        out.push_str(&format!("- {} ({}): {}\n", b.bucket, b.label, b.runs));
    }

    if !artifact.by_model.is_empty() {
        out.push_str("\n## Models\n");
        out.push_str("| model | runs | average | success |\n|---|---|---|---|\n");
        for (model, stats) in &artifact.by_model {
            out.push_str(&format!(
                "| `{}` | {} | {:.2} | {:.2}% |\n",
                model, stats.total_runs, stats.average_score, stats.success_rate
            ));
        }
    }
    out
}

/// Write dashboard.md.
pub fn write_dashboard_md(path: &Path, artifact: &DashboardArtifact) -> Result<()> {
    let md = render_dashboard_md(artifact);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::objective::{ObjectiveMode, ObjectiveResult};
    use crate::domain::run::Submission;
    use serde_json::json;

    fn judged(model: &str, fraction: f64) -> EvaluationRun {
        let mut run = EvaluationRun::create(Submission::new("prompt", ObjectiveMode::LlmJudge, model))
            .expect("valid");
        run.start().expect("start");
        run.finish(
            "answer".to_string(),
            vec![ObjectiveResult::from_judge(fraction, "ok").expect("in range")],
            &[],
        )
        .expect("finish");
        run
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn dashboard_artifact_has_expected_keys() {
        let runs = vec![judged("a", 1.0), judged("b", 0.5)];
        let artifact = DashboardArtifact::build(&runs, fixed_time());

        let raw = serde_json::to_value(&artifact).expect("serialize artifact");
        let obj = raw.as_object().expect("artifact object");
        for key in [
            "schema_version",
            "generated_at",
            "stats",
            "status_counts",
            "buckets",
            "by_model",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["stats"]["totalRuns"], json!(2));
        assert_eq!(raw["stats"]["averageScore"], json!(75.0));
        assert_eq!(raw["stats"]["successRate"], json!(50.0));
        assert_eq!(raw["status_counts"]["completed"], json!(2));
        assert_eq!(raw["buckets"][0]["bucket"], json!("high"));
        assert_eq!(raw["buckets"][2]["runs"], json!(1));
    }

    #[test]
    fn dashboard_markdown_render_is_stable() {
        let runs = vec![judged("gpt-4o", 1.0)];
        let md = render_dashboard_md(&DashboardArtifact::build(&runs, fixed_time()));
        assert!(md.starts_with("# Evaluation Dashboard"));
        assert!(md.contains("- total runs: 1"));
        assert!(md.contains("- average score: 100.00"));
        assert!(md.contains("- success rate: 100.00%"));
        assert!(md.contains("- high (excellent): 1"));
        assert!(md.contains("| `gpt-4o` | 1 | 100.00 | 100.00% |"));
    }

    #[test]
    fn runs_file_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        assert!(read_runs_json(&path).expect("missing file").is_empty());

        let runs = vec![judged("a", 0.9), judged("b", 0.1)];
        write_runs_json(&path, &runs).expect("write");
        let loaded = read_runs_json(&path).expect("read");
        assert_eq!(loaded, runs);
    }

    #[test]
    fn rewriting_runs_file_replaces_it_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        std::fs::write(&path, "[]").expect("seed");

        let runs = vec![judged("a", 0.9), judged("b", 0.1), judged("c", 0.5)];
        write_runs_json(&path, &runs).expect("first write");
        write_runs_json(&path, &runs[..1]).expect("second write");

        assert_eq!(read_runs_json(&path).expect("read"), runs[..1].to_vec());
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("runs.json")]);
    }

    #[test]
    fn failed_rewrite_keeps_previous_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        let runs = vec![judged("a", 0.9)];
        write_runs_json(&path, &runs).expect("write");

        let missing_dir = dir.path().join("gone").join("runs.json");
        assert!(write_runs_json(&missing_dir, &runs).is_err());
        assert_eq!(read_runs_json(&path).expect("read"), runs);
    }

    #[test]
    fn tampered_runs_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        let runs = vec![judged("a", 0.9)];
        let mut raw = serde_json::to_value(&runs).expect("serialize");
        raw[0]["overall_score"] = json!(120.0);
        std::fs::write(&path, raw.to_string()).expect("write");

        let err = read_runs_json(&path).expect_err("out of range score");
        assert!(format!("{err:#}").contains("outside [0, 100]"));
    }

    #[test]
    fn runs_file_with_invented_score_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        let mut raw = serde_json::to_value(vec![judged("a", 0.9)]).expect("serialize");
        raw[0]["objective_results"] = json!({});
        raw[0]["overall_score"] = json!(95.0);
        std::fs::write(&path, raw.to_string()).expect("write");

        let err = read_runs_json(&path).expect_err("score without results");
        assert!(format!("{err:#}").contains("without objective results"));
    }

    #[test]
    fn write_report_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = DashboardArtifact::build(&[], fixed_time());
        write_stats_json(&dir.path().join("stats.json"), &artifact).expect("stats");
        write_dashboard_md(&dir.path().join("dashboard.md"), &artifact).expect("md");
        let md = std::fs::read_to_string(dir.path().join("dashboard.md")).expect("read md");
        assert!(md.contains("- total runs: 0"));
        assert!(!md.contains("## Models"));
    }
}
