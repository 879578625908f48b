//! Evalboard - agent evaluation runs from the command line
//!
//! The `evalboard` command evaluates agent responses offline and browses the
//! resulting runs file.
//!
//! ## Commands
//!
//! - `list`: Filtered listing of recorded runs, newest first
//! - `show`: One run as JSON
//! - `stats`: Dashboard summary over the (filtered) runs
//! - `evaluate`: Score a response and append the run to the runs file
//! - `report`: Write `dashboard.md` and `stats.json`

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use uuid::Uuid;

use evalboard_core::{
    read_runs_json, summarize, write_dashboard_md, write_runs_json, write_stats_json, Agent,
    DashboardArtifact, DashboardStats, EvaluationDriver, EvaluationResponse, EvaluationRun,
    FilterQuery, Judge, JudgeVerdict, ObjectiveMode, RunFilter, RunStore, RunView, ScoreBucket,
    Submission, METRICS,
};

#[derive(Parser)]
#[command(name = "evalboard")]
#[command(author = "Evalboard Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score, filter and summarize agent evaluation runs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "EVALBOARD_LOG_JSON")]
    log_json: bool,

    /// Runs file (JSON array of runs)
    #[arg(long, global = true, env = "EVALBOARD_RUNS_FILE", default_value = "runs.json")]
    runs: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recorded runs, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print runs as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show one run as JSON
    Show {
        /// Run ID
        id: Uuid,
    },

    /// Dashboard summary over the (filtered) runs
    Stats {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a recorded agent response and append the run
    Evaluate(EvaluateArgs),

    /// Write dashboard.md and stats.json
    Report {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Browsing criteria. Omitted flags and the value `all` keep every run.
#[derive(Args, Debug, Default, Clone)]
struct FilterArgs {
    /// Case-insensitive text search over prompt, response, expected output and id
    #[arg(long)]
    search: Option<String>,

    /// pending | running | completed | failed
    #[arg(long)]
    status: Option<String>,

    /// Exact model name
    #[arg(long)]
    model: Option<String>,

    /// string-equality | llm-judge | combined
    #[arg(long)]
    objective: Option<String>,

    /// high (>= 90) | medium (70-89) | low (< 70)
    #[arg(long)]
    score: Option<String>,

    /// today | week | month
    #[arg(long)]
    date: Option<String>,
}

impl FilterArgs {
    fn query(&self) -> FilterQuery {
        FilterQuery {
            search_query: self.search.clone(),
            status: self.status.clone(),
            model: self.model.clone(),
            objective: self.objective.clone(),
            score_range: self.score.clone(),
            date_range: self.date.clone(),
        }
    }

    fn parse(&self) -> Result<RunFilter> {
        self.query().parse().context("Invalid filter")
    }
}

#[derive(Args, Debug, Clone)]
struct EvaluateArgs {
    /// Prompt given to the agent
    #[arg(short, long)]
    prompt: String,

    /// string-equality | llm-judge | combined
    #[arg(short, long)]
    objective: ObjectiveMode,

    /// Model that produced the response
    #[arg(short, long)]
    model: String,

    /// Expected output (required by string-equality and combined)
    #[arg(short, long)]
    expected: Option<String>,

    /// The agent's response to score
    #[arg(short, long)]
    response: String,

    /// Judge verdict as a fraction in [0, 1]
    #[arg(long)]
    judge_score: Option<f64>,

    /// Judge explanation recorded with the verdict
    #[arg(long, default_value = "")]
    judge_reason: String,

    /// Number of agent samples
    #[arg(long, default_value = "1")]
    iterations: u32,
}

/// Agent that replays a response captured elsewhere.
struct FixedResponseAgent {
    response: String,
}

#[async_trait]
impl Agent for FixedResponseAgent {
    async fn invoke(&self, _model: &str, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// Judge that returns a verdict supplied on the command line.
struct FixedJudge {
    verdict: JudgeVerdict,
}

#[async_trait]
impl Judge for FixedJudge {
    async fn judge(&self, _response: &str, _expected: Option<&str>) -> Result<JudgeVerdict> {
        Ok(self.verdict.clone())
    }
}

/// JSON shape of `stats --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsOutput {
    filter: FilterQuery,
    #[serde(flatten)]
    stats: DashboardStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    evalboard_core::init_tracing(cli.log_json, level);

    let result = match cli.command {
        Commands::List { filter, json } => cmd_list(&cli.runs, &filter, json, Utc::now()),
        Commands::Show { id } => cmd_show(&cli.runs, id),
        Commands::Stats { filter, json } => cmd_stats(&cli.runs, &filter, json, Utc::now()),
        Commands::Evaluate(args) => cmd_evaluate(&cli.runs, args).await.and_then(|resp| {
            println!("{}", serde_json::to_string_pretty(&resp)?);
            Ok(())
        }),
        Commands::Report { out, filter } => cmd_report(&cli.runs, &out, &filter, Utc::now()),
    };

    METRICS.flush();
    result
}

/// Load the runs file into a store. Duplicate ids are an error.
fn load_store(runs_path: &Path) -> Result<RunStore> {
    let runs = read_runs_json(runs_path)?;
    RunStore::from_runs(runs).with_context(|| format!("Invalid runs file {:?}", runs_path))
}

fn select_runs(runs_path: &Path, filter: &FilterArgs, now: DateTime<Utc>) -> Result<Vec<EvaluationRun>> {
    let criteria = filter.parse()?;
    Ok(load_store(runs_path)?.query(&criteria, now))
}

fn cmd_list(runs_path: &Path, filter: &FilterArgs, json: bool, now: DateTime<Utc>) -> Result<()> {
    let runs = select_runs(runs_path, filter, now)?;

    if json {
        let views: Vec<RunView> = runs.iter().map(RunView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs match.");
        return Ok(());
    }
    for run in &runs {
        println!("{}", render_run_line(run));
    }
    Ok(())
}

/// One-line summary used by `list`.
fn render_run_line(run: &EvaluationRun) -> String {
    const PROMPT_WIDTH: usize = 40;
    let mut prompt: String = run.prompt().chars().take(PROMPT_WIDTH).collect();
    if run.prompt().chars().count() > PROMPT_WIDTH {
        prompt.push_str("...");
    }
    format!(
        "{}  {:<9}  {:>6.2} {:<10}  {:<15}  {:<16}  {}",
        run.id(),
        run.status().as_str(),
        run.score(),
        format!("({})", ScoreBucket::of(run.score()).label()),
        run.objective().as_str(),
        run.model(),
        prompt
    )
}

fn cmd_show(runs_path: &Path, id: Uuid) -> Result<()> {
    let store = load_store(runs_path)?;
    let run = store
        .get(id)
        .with_context(|| format!("Run {} not found in {:?}", id, runs_path))?;
    println!("{}", serde_json::to_string_pretty(&RunView::from(&run))?);
    Ok(())
}

fn cmd_stats(runs_path: &Path, filter: &FilterArgs, json: bool, now: DateTime<Utc>) -> Result<()> {
    let runs = select_runs(runs_path, filter, now)?;
    let stats = summarize(&runs);

    if json {
        let output = StatsOutput {
            filter: filter.query(),
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", render_stats_text(&stats));
    }
    Ok(())
}

fn render_stats_text(stats: &DashboardStats) -> String {
    format!(
        "Total runs:    {}\nAverage score: {:.2}\nSuccess rate:  {:.2}%",
        stats.total_runs, stats.average_score, stats.success_rate
    )
}

/// Evaluate one response and persist the resulting run.
///
/// The runs file is rewritten whenever a run was recorded, including when the
/// driver reports an aggregation defect after marking the run failed.
async fn cmd_evaluate(runs_path: &Path, args: EvaluateArgs) -> Result<EvaluationResponse> {
    let store = Arc::new(load_store(runs_path)?);
    let before = store.len();

    let mut driver = EvaluationDriver::new(
        Arc::new(FixedResponseAgent {
            response: args.response,
        }),
        store.clone(),
    );
    if let Some(fraction) = args.judge_score {
        driver = driver.with_judge(Arc::new(FixedJudge {
            verdict: JudgeVerdict {
                fraction,
                message: args.judge_reason,
            },
        }));
    }

    let mut submission = Submission::new(args.prompt, args.objective, args.model)
        .with_iterations(args.iterations);
    if let Some(expected) = args.expected {
        submission = submission.with_expected_output(expected);
    }

    let outcome = driver.submit(submission).await;

    if store.len() > before {
        write_runs_json(runs_path, &store.snapshot())?;
        info!(runs_file = ?runs_path, "Recorded evaluation run");
    }

    outcome.context("Evaluation failed")
}

fn cmd_report(runs_path: &Path, out: &Path, filter: &FilterArgs, now: DateTime<Utc>) -> Result<()> {
    let runs = select_runs(runs_path, filter, now)?;
    std::fs::create_dir_all(out).with_context(|| format!("Failed to create {:?}", out))?;

    let artifact = DashboardArtifact::build(&runs, now);
    write_stats_json(&out.join("stats.json"), &artifact)?;
    write_dashboard_md(&out.join("dashboard.md"), &artifact)?;

    println!(
        "Wrote dashboard for {} run(s) to {}",
        artifact.stats.total_runs,
        out.display()
    );
    Ok(())
}
