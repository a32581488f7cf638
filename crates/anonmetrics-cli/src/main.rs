mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anonmetrics_core::{
    Dataset, Error as CoreError, GroupingClassifier, MetricsEngine, QuasiIdentifierSet,
};
use anonmetrics_eval::{
    EvalError, EvaluationEngine, EvaluationReport, load_dataset_csv, load_plan, plan_json_schema,
    render_report, render_summary_lines,
};
use clap::{Args, Parser, Subcommand};
use registry::{
    RunContext, init_console_logging, init_run_logging, start_run, write_metrics, write_report,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0} experiment(s) failed")]
    ExperimentsFailed(usize),
}

#[derive(Parser, Debug)]
#[command(
    name = "anonmetrics",
    version,
    about = "Utility metrics for anonymized datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Average equivalence class size of one anonymized file.
    Cavg(CavgArgs),
    /// Classification metric of one anonymized file.
    Cm(CmArgs),
    /// Evaluate every experiment of a plan and write run artifacts.
    Run(RunArgs),
    /// Print the JSON Schema of experiment plans.
    PlanSchema,
}

#[derive(Args, Debug)]
struct DatasetArgs {
    /// Raw (original) dataset CSV.
    #[arg(long)]
    raw: PathBuf,
    /// Anonymized dataset CSV.
    #[arg(long)]
    anon: PathBuf,
    /// Quasi-identifier column(s), comma separated or repeated.
    #[arg(long = "qi", value_name = "COLUMN", value_delimiter = ',', required = true)]
    quasi_identifiers: Vec<String>,
}

#[derive(Args, Debug)]
struct CavgArgs {
    #[command(flatten)]
    datasets: DatasetArgs,
    /// Anonymity parameter the file was produced with.
    #[arg(long)]
    k: usize,
    /// Normalize by the raw row count (no records were suppressed).
    #[arg(long, default_value_t = false)]
    no_suppression: bool,
}

#[derive(Args, Debug)]
struct CmArgs {
    #[command(flatten)]
    datasets: DatasetArgs,
    /// Sensitive attribute used as the classification label.
    #[arg(long)]
    sensitive: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Experiment plan (TOML, or JSON with a .json extension).
    #[arg(long)]
    plan: PathBuf,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Maximum number of experiments evaluated at once.
    #[arg(long, default_value_t = 4)]
    jobs: usize,
    /// Exit with an error when any experiment fails.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Cavg(args) => run_cavg(args),
        Command::Cm(args) => run_cm(args),
        Command::Run(args) => run_plan(args).await,
        Command::PlanSchema => {
            let schema = serde_json::to_string_pretty(&plan_json_schema())?;
            println!("{schema}");
            Ok(())
        }
    }
}

fn run_cavg(args: CavgArgs) -> Result<(), CliError> {
    init_console_logging()?;
    println!("{}", cavg_line(&args)?);
    Ok(())
}

fn run_cm(args: CmArgs) -> Result<(), CliError> {
    init_console_logging()?;
    println!("{}", cm_line(&args)?);
    Ok(())
}

fn cavg_line(args: &CavgArgs) -> Result<String, CliError> {
    if args.k == 0 {
        return Err(CliError::InvalidConfig("k must be a positive integer".to_string()));
    }

    let (db, db_anon, quasi_identifiers) = load_pair(&args.datasets)?;
    let value = MetricsEngine::new(GroupingClassifier).average_equivalence_class_size(
        &db,
        &db_anon,
        &quasi_identifiers,
        args.k,
        !args.no_suppression,
    )?;
    Ok(format!("File: {}, C_avg: {value}", file_name(&args.datasets.anon)))
}

fn cm_line(args: &CmArgs) -> Result<String, CliError> {
    let (db, db_anon, quasi_identifiers) = load_pair(&args.datasets)?;
    let value = MetricsEngine::new(GroupingClassifier).classification_metric(
        &db,
        &db_anon,
        &quasi_identifiers,
        &args.sensitive,
    )?;
    Ok(format!("File: {}, CM: {value}", file_name(&args.datasets.anon)))
}

async fn run_plan(args: RunArgs) -> Result<(), CliError> {
    let RunArgs {
        plan: plan_path,
        run_dir,
        jobs,
        strict,
    } = args;

    let plan = load_plan(&plan_path)?;
    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir,
        plan_path,
        plan,
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    let plan = Arc::new(run_ctx.plan);
    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        run_dir = %run_paths.root.display(),
        experiments = plan.experiments.len(),
        jobs = jobs
    );

    let engine: Arc<EvaluationEngine> = Arc::new(EvaluationEngine::default());
    let report = engine.run_with_jobs(plan, &run_id, jobs).await?;

    write_metrics(&run_paths, &report)?;
    tracing::info!(event = "metrics_written", path = %run_paths.metrics_path.display());
    write_report(&run_paths, &render_report(&report))?;
    tracing::info!(event = "report_written", path = %run_paths.report_path.display());

    for line in render_summary_lines(&report) {
        println!("{line}");
    }

    let failures = report.failures().count();
    tracing::info!(
        event = "run_finished",
        status = if failures == 0 { "success" } else { "partial" },
        failures = failures,
        duration_ms = report.performance.total_ms
    );

    check_failures(&report, strict)
}

/// Under `--strict` any failed experiment fails the whole run.
fn check_failures(report: &EvaluationReport, strict: bool) -> Result<(), CliError> {
    let failures = report.failures().count();
    if strict && failures > 0 {
        return Err(CliError::ExperimentsFailed(failures));
    }
    Ok(())
}

fn load_pair(args: &DatasetArgs) -> Result<(Dataset, Dataset, QuasiIdentifierSet), CliError> {
    let quasi_identifiers = QuasiIdentifierSet::new(args.quasi_identifiers.iter().cloned())?;
    let db = load_dataset_csv(&args.raw)?;
    let db_anon = load_dataset_csv(&args.anon)?;
    Ok((db, db_anon, quasi_identifiers))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../anonmetrics-eval/tests/fixtures")
            .join(name)
            .display()
            .to_string()
    }

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("anonmetrics").chain(args.iter().copied()))
            .expect("parse args")
            .command
    }

    fn fixture_report() -> EvaluationReport {
        let plan = load_plan(Path::new(&fixture("plan.toml"))).expect("load plan");
        let engine: EvaluationEngine = EvaluationEngine::default();
        engine.run(&plan, "cli-test").expect("run plan")
    }

    #[test]
    fn cavg_command_prints_file_and_value() {
        let raw = fixture("adult.csv");
        let anon = fixture("adult_k5_new.csv");
        let Command::Cavg(args) = parse(&[
            "cavg",
            "--raw",
            raw.as_str(),
            "--anon",
            anon.as_str(),
            "--qi",
            "age,education,sex",
            "--k",
            "5",
        ]) else {
            panic!("expected cavg command");
        };

        assert_eq!(cavg_line(&args).unwrap(), "File: adult_k5_new.csv, C_avg: 1");
    }

    #[test]
    fn cavg_command_rejects_zero_k() {
        let raw = fixture("adult.csv");
        let anon = fixture("adult_k5_new.csv");
        let Command::Cavg(args) = parse(&[
            "cavg", "--raw", raw.as_str(), "--anon", anon.as_str(), "--qi", "age", "--k", "0",
        ]) else {
            panic!("expected cavg command");
        };

        assert!(matches!(cavg_line(&args), Err(CliError::InvalidConfig(_))));
    }

    #[test]
    fn cm_command_prints_file_and_value() {
        let raw = fixture("adult.csv");
        let anon = fixture("adult_k4_sup.csv");
        let Command::Cm(args) = parse(&[
            "cm",
            "--raw",
            raw.as_str(),
            "--anon",
            anon.as_str(),
            "--qi",
            "age",
            "--qi",
            "education,sex",
            "--sensitive",
            "salary-class",
        ]) else {
            panic!("expected cm command");
        };

        assert_eq!(cm_line(&args).unwrap(), "File: adult_k4_sup.csv, CM: 0.4");
    }

    #[test]
    fn cm_command_reports_missing_sensitive_column() {
        let raw = fixture("adult.csv");
        let anon = fixture("adult_no_label.csv");
        let Command::Cm(args) = parse(&[
            "cm",
            "--raw",
            raw.as_str(),
            "--anon",
            anon.as_str(),
            "--qi",
            "age",
            "--sensitive",
            "salary-class",
        ]) else {
            panic!("expected cm command");
        };

        assert!(matches!(cm_line(&args), Err(CliError::Core(_))));
    }

    #[test]
    fn run_defaults_to_four_jobs_and_lenient_mode() {
        let Command::Run(args) = parse(&["run", "--plan", "plan.toml"]) else {
            panic!("expected run command");
        };
        assert_eq!(args.jobs, 4);
        assert!(!args.strict);
        assert_eq!(args.run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn strict_mode_turns_failures_into_an_error() {
        let report = fixture_report();
        assert_eq!(report.failures().count(), 2);

        let err = check_failures(&report, true).unwrap_err();
        assert!(matches!(err, CliError::ExperimentsFailed(2)));
        assert!(check_failures(&report, false).is_ok());
    }

    #[test]
    fn strict_mode_passes_clean_runs() {
        let mut report = fixture_report();
        report.results.retain(|outcome| outcome.is_success());
        assert!(check_failures(&report, true).is_ok());
    }
}
