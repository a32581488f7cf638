use crate::model::{EvaluationReport, ExperimentOutcome};

/// Render a deterministic markdown report from an evaluation.
pub fn render_report(report: &EvaluationReport) -> String {
    let mut lines = Vec::new();

    lines.push("# Anonymization Quality Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!("- run_id: {}", report.run_id));
    lines.push(format!("- raw: {} ({} rows)", report.raw.path, report.raw.rows));
    lines.push(format!(
        "- quasi_identifiers: {}",
        report.quasi_identifiers.join(", ")
    ));
    if let Some(sensitive_attribute) = &report.sensitive_attribute {
        lines.push(format!("- sensitive_attribute: {sensitive_attribute}"));
    }
    lines.push(format!("- suppression: {}", report.suppression));
    lines.push(String::new());

    let cavg_rows = report
        .results
        .iter()
        .filter(|outcome| outcome.cavg.is_some())
        .collect::<Vec<_>>();
    if !cavg_rows.is_empty() {
        lines.push("## Average equivalence class size (C_avg)".to_string());
        lines.push("| experiment | k | rows | classes | C_avg |".to_string());
        lines.push("| --- | --- | --- | --- | --- |".to_string());
        for outcome in cavg_rows {
            lines.push(format!(
                "| {} | {} | {} | {} | {} |",
                outcome.id,
                optional(outcome.k),
                optional(outcome.rows),
                optional(outcome.equivalence_classes),
                metric(outcome.cavg)
            ));
        }
        lines.push(String::new());
    }

    let cm_rows = report
        .results
        .iter()
        .filter(|outcome| outcome.cm.is_some())
        .collect::<Vec<_>>();
    if !cm_rows.is_empty() {
        lines.push("## Classification metric (CM)".to_string());
        lines.push("| experiment | rows | suppressed | classes | CM |".to_string());
        lines.push("| --- | --- | --- | --- | --- |".to_string());
        for outcome in cm_rows {
            lines.push(format!(
                "| {} | {} | {} | {} | {} |",
                outcome.id,
                optional(outcome.rows),
                suppressed(report.raw.rows, outcome),
                optional(outcome.equivalence_classes),
                metric(outcome.cm)
            ));
        }
        lines.push(String::new());
    }

    if report.has_failures() {
        lines.push("## Failures".to_string());
        for outcome in report.failures() {
            let error = outcome.error.as_deref().unwrap_or_default();
            lines.push(format!("- {} ({}): {}", outcome.id, outcome.file, error));
        }
        lines.push(String::new());
    }

    lines.push("## Notes".to_string());
    lines.extend(notes(report));
    lines.join("\n")
}

/// One line per metric value, in the `File: <name>, <metric>: <value>` form.
pub fn render_summary_lines(report: &EvaluationReport) -> Vec<String> {
    let mut lines = Vec::new();
    for outcome in &report.results {
        if let Some(value) = outcome.cavg {
            lines.push(format!("File: {}, C_avg: {value}", outcome.file));
        }
        if let Some(value) = outcome.cm {
            lines.push(format!("File: {}, CM: {value}", outcome.file));
        }
        if let Some(error) = &outcome.error {
            lines.push(format!("File: {}, error: {error}", outcome.file));
        }
    }
    lines
}

fn optional(value: Option<usize>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn metric(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.4}"))
        .unwrap_or_else(|| "-".to_string())
}

fn suppressed(raw_rows: usize, outcome: &ExperimentOutcome) -> String {
    outcome
        .rows
        .map(|rows| raw_rows.saturating_sub(rows).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn notes(report: &EvaluationReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report
        .results
        .iter()
        .filter_map(|outcome| outcome.cavg)
        .any(|value| value > 1.0)
    {
        lines.push(
            "- C_avg above 1.0 indicates classes larger than k (over-generalization).".to_string(),
        );
    }
    if report
        .results
        .iter()
        .filter_map(|outcome| outcome.cm)
        .any(|value| value > 0.0)
    {
        lines.push(
            "- CM counts suppressed rows and minority labels within each class as errors."
                .to_string(),
        );
    }
    if report.has_failures() {
        lines.push("- fix the failing inputs and rerun the affected experiments.".to_string());
    }
    if lines.is_empty() {
        lines.push("- no issues detected; compare metrics across runs for drift.".to_string());
    }
    lines
}
