//! Dashboard statistics over full and filtered collections.

use std::sync::Arc;

use chrono::Utc;
use evalboard_core::{
    summarize, summarize_by_model, EvaluationRun, ObjectiveKind, ObjectiveMode, ObjectiveResult,
    RunFilter, RunStatus, RunStore, ScoreBucket, Submission,
};

fn completed(model: &str, score: f64) -> EvaluationRun {
    let mut run = EvaluationRun::create(Submission::new("prompt", ObjectiveMode::LlmJudge, model))
        .expect("valid submission");
    run.start().expect("start");
    run.finish(
        "response".to_string(),
        vec![ObjectiveResult {
            kind: ObjectiveKind::LlmJudge,
            passed: score > 0.0,
            score,
            rationale: None,
        }],
        &[],
    )
    .expect("finish");
    run
}

fn failed(model: &str) -> EvaluationRun {
    let mut run = EvaluationRun::create(Submission::new("prompt", ObjectiveMode::LlmJudge, model))
        .expect("valid submission");
    run.start().expect("start");
    run.fail("agent invocation failed").expect("fail");
    run
}

/// Partial evaluation: a combined run whose judge never answered.
fn partially_failed(score_from_string_equality: bool) -> EvaluationRun {
    let mut run = EvaluationRun::create(
        Submission::new("prompt", ObjectiveMode::Combined, "m").with_expected_output("yes"),
    )
    .expect("valid submission");
    run.start().expect("start");
    let response = if score_from_string_equality { "yes" } else { "no" };
    run.finish(
        response.to_string(),
        vec![ObjectiveResult::string_equality(response, "yes")],
        &[],
    )
    .expect("finish");
    run
}

#[test]
fn scenario_mixed_collection() {
    let runs = vec![
        completed("m", 92.0),
        completed("m", 100.0),
        completed("m", 74.0),
        failed("m"),
    ];
    let stats = summarize(&runs);
    assert_eq!(stats.total_runs, 4);
    assert_eq!(stats.average_score, 66.5);
    // 92, 100 and 74 are completed with score >= 70.
    assert_eq!(stats.success_rate, 75.0);
}

#[test]
fn empty_collection_summarizes_to_zero() {
    let stats = summarize(&[]);
    assert_eq!(stats.total_runs, 0);
    assert_eq!(stats.average_score, 0.0);
    assert_eq!(stats.success_rate, 0.0);
}

#[test]
fn success_requires_completed_status_and_passing_score() {
    let runs = vec![
        completed("m", 70.0),
        completed("m", 69.5),
        partially_failed(true),
        failed("m"),
    ];
    let stats = summarize(&runs);
    assert_eq!(stats.total_runs, 4);
    assert_eq!(stats.success_rate, 25.0);
    assert_eq!(stats.average_score, (70.0 + 69.5 + 50.0 + 0.0) / 4.0);
}

#[test]
fn pending_and_running_runs_count_toward_totals() {
    let pending = EvaluationRun::create(Submission::new("p", ObjectiveMode::LlmJudge, "m"))
        .expect("valid");
    let mut running = EvaluationRun::create(Submission::new("p", ObjectiveMode::LlmJudge, "m"))
        .expect("valid");
    running.start().expect("start");

    let stats = summarize(&[pending, running, completed("m", 100.0)]);
    assert_eq!(stats.total_runs, 3);
    assert!((stats.average_score - 100.0 / 3.0).abs() < 1e-9);
    assert!((stats.success_rate - 100.0 / 3.0).abs() < 1e-9);
}

#[test]
fn success_threshold_matches_medium_bucket_floor() {
    let run = completed("m", 70.0);
    assert_eq!(ScoreBucket::of(run.score()), ScoreBucket::Medium);
    assert_eq!(summarize(&[run]).success_rate, 100.0);

    let run = completed("m", 69.999);
    assert_eq!(ScoreBucket::of(run.score()), ScoreBucket::Low);
    assert_eq!(summarize(&[run]).success_rate, 0.0);
}

#[test]
fn stats_over_filtered_view() {
    let store = RunStore::from_runs(vec![
        completed("a", 100.0),
        completed("a", 40.0),
        completed("b", 80.0),
        failed("b"),
    ])
    .expect("store");

    let only_a = store.query(&RunFilter::all().with_model("a"), Utc::now());
    let stats = summarize(&only_a);
    assert_eq!(stats.total_runs, 2);
    assert_eq!(stats.average_score, 70.0);
    assert_eq!(stats.success_rate, 50.0);

    let failed_only = store.query(&RunFilter::all().with_status(RunStatus::Failed), Utc::now());
    assert_eq!(summarize(&failed_only).success_rate, 0.0);
}

#[test]
fn per_model_breakdown() {
    let runs = vec![completed("a", 100.0), completed("b", 60.0), completed("a", 80.0)];
    let by_model = summarize_by_model(&runs);
    assert_eq!(by_model.len(), 2);
    assert_eq!(by_model["a"].total_runs, 2);
    assert_eq!(by_model["a"].average_score, 90.0);
    assert_eq!(by_model["b"].success_rate, 0.0);
}

#[test]
fn stats_use_a_snapshot_while_writers_append() {
    let store = Arc::new(RunStore::new());
    for _ in 0..10 {
        store.insert(completed("m", 100.0)).expect("insert");
    }

    let writer = {
        let store = store.clone();
        std::thread::spawn(move || {
            for _ in 0..200 {
                store.insert(completed("m", 0.0)).expect("insert");
            }
        })
    };

    for _ in 0..50 {
        let snapshot = store.snapshot();
        let stats = summarize(&snapshot);
        assert_eq!(stats.total_runs, snapshot.len());
        assert!(stats.total_runs >= 10);
        assert!((0.0..=100.0).contains(&stats.average_score));
    }

    writer.join().expect("writer thread");
    assert_eq!(store.stats().total_runs, 210);
}
