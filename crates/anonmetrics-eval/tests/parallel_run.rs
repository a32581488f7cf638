use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anonmetrics_core::{
    Dataset, EquivalenceClass, EquivalenceClassifier, GroupingClassifier, MetricsEngine,
    QuasiIdentifierSet,
};
use anonmetrics_eval::{EvalError, EvaluationEngine, ExperimentPlan, load_plan};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Groups like `GroupingClassifier` while recording how many calls overlap.
#[derive(Debug, Clone, Default)]
struct OverlapClassifier {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl EquivalenceClassifier for OverlapClassifier {
    fn classify(
        &self,
        dataset: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
    ) -> anonmetrics_core::Result<Vec<EquivalenceClass>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(25));
        let classes = GroupingClassifier.classify(dataset, quasi_identifiers);
        self.active.fetch_sub(1, Ordering::SeqCst);
        classes
    }
}

fn repeated_plan(count: usize) -> ExperimentPlan {
    let mut contents = String::from(
        r#"
raw = "adult.csv"
quasi_identifiers = ["age", "education", "sex"]
sensitive_attribute = "salary-class"
"#,
    );
    for idx in 0..count {
        contents.push_str(&format!(
            "\n[[experiments]]\nid = \"copy_{idx}\"\npath = \"adult_k5_new.csv\"\nk = 5\n"
        ));
    }
    let mut plan = ExperimentPlan::from_toml_str(&contents).expect("parse plan");
    plan.data_dir = Some(fixtures_dir());
    plan
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_run_keeps_plan_order() {
    let plan = load_plan(&fixtures_dir().join("plan.toml")).expect("load plan");
    let engine: Arc<EvaluationEngine> = Arc::new(EvaluationEngine::default());

    let report = engine
        .run_with_jobs(Arc::new(plan), "parallel", 3)
        .await
        .expect("run plan");

    let ids = report
        .results
        .iter()
        .map(|outcome| outcome.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        [
            "adult_k5_new.csv",
            "suppressed",
            "adult_no_label.csv",
            "adult_k9_missing.csv"
        ]
    );
    assert_eq!(report.raw.rows, 10);
    assert_eq!(report.failures().count(), 2);
    assert_eq!(report.results[1].cm, Some(0.4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_run_matches_sequential_run() {
    let plan = load_plan(&fixtures_dir().join("plan.toml")).expect("load plan");
    let engine: Arc<EvaluationEngine> = Arc::new(EvaluationEngine::default());

    let sequential = engine.run(&plan, "seq").expect("sequential run");
    let parallel = Arc::clone(&engine)
        .run_with_jobs(Arc::new(plan), "par", 4)
        .await
        .expect("parallel run");

    for (left, right) in sequential.results.iter().zip(&parallel.results) {
        assert_eq!(left.id, right.id);
        assert_eq!(left.cavg, right.cavg);
        assert_eq!(left.cm, right.cm);
        assert_eq!(left.error, right.error);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_run_never_exceeds_jobs() {
    let classifier = OverlapClassifier::default();
    let peak = Arc::clone(&classifier.peak);
    let engine = Arc::new(EvaluationEngine::new(MetricsEngine::new(classifier)));

    let report = engine
        .run_with_jobs(Arc::new(repeated_plan(8)), "capped", 2)
        .await
        .expect("run plan");

    assert_eq!(report.results.len(), 8);
    assert!(report.results.iter().all(|outcome| outcome.is_success()));
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency {peak}");
}

#[tokio::test]
async fn single_job_runs_experiments_one_at_a_time() {
    let classifier = OverlapClassifier::default();
    let peak = Arc::clone(&classifier.peak);
    let engine = Arc::new(EvaluationEngine::new(MetricsEngine::new(classifier)));

    engine
        .run_with_jobs(Arc::new(repeated_plan(3)), "serial", 1)
        .await
        .expect("run plan");

    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_jobs_is_rejected() {
    let engine: Arc<EvaluationEngine> = Arc::new(EvaluationEngine::default());
    let err = engine
        .run_with_jobs(Arc::new(repeated_plan(1)), "none", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidPlan(message) if message.contains("jobs")));
}
