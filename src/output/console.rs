use crate::aggregate::pmd::PmdSummary;
use crate::aggregate::pylint::PylintSummary;
use crate::aggregate::{percent, DefectTally};
use crate::complexity::stats::{ComplexityReport, FieldSummary, MetricStats};
use crate::runner::semgrep::BatchRunSummary;
use crate::semgrep::summary::SecurityReport;

use super::Report;

const RULE: &str = "────────────────────────────";

/// Render a report as plain console text.
pub fn render(report: &Report<'_>) -> String {
    match report {
        Report::Pmd {
            summary,
            dataset_size,
        } => render_pmd(summary, *dataset_size),
        Report::Pylint(summary) => render_pylint(summary),
        Report::PylintRun { stats, output } => {
            let mut out = String::new();
            out.push_str(&format!(
                "\n  Linted {} sample(s) from {} line(s)\n",
                stats.samples_linted, stats.lines_read
            ));
            out.push_str(&format!(
                "  Timeouts: {}, crashes: {}, unparseable output: {}\n",
                stats.timeouts, stats.crashes, stats.malformed_outputs
            ));
            out.push_str(&format!(
                "  Skipped: {} blank, {} malformed\n",
                stats.blank_skipped, stats.malformed_lines
            ));
            out.push_str(&format!("  Output saved to {}\n\n", output.display()));
            out
        }
        Report::WrapJava { stats, output_dir } => {
            let mut out = String::new();
            out.push_str(&format!(
                "\n  Wrapped {} sample(s), renamed {}, skipped {} malformed and {} empty, {} failed\n",
                stats.wrapped,
                stats.renamed,
                stats.malformed_lines,
                stats.empty_skipped,
                stats.failed
            ));
            out.push_str(&format!(
                "  Saved {} .java files in: {}\n\n",
                stats.files_in_output,
                output_dir.display()
            ));
            out
        }
        Report::SemgrepBatches(summary) => render_batches(summary),
        Report::Security(report) => render_security(report),
        Report::Complexity(report) => render_complexity(report),
    }
}

fn render_pmd(summary: &PmdSummary, dataset_size: Option<usize>) -> String {
    let tally = &summary.tally;
    let size = dataset_size.unwrap_or(0);
    let mut out = String::new();

    out.push_str("\nPMD + ODC stats\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "Reports read: {} ({} skipped)\n",
        summary.reports_read, summary.reports_skipped
    ));
    match dataset_size {
        Some(n) => out.push_str(&format!("Total number of samples: {}\n", n)),
        None => out.push_str("Total number of samples: unknown\n"),
    }
    out.push_str(&format!("Total number of defects: {}\n", tally.total_defects));
    out.push_str(&format!(
        "Total number of defective samples: {} ({:.2}%)\n",
        tally.defective_sample_count(),
        percent(tally.defective_sample_count(), size)
    ));
    out.push_str(&format!(
        "Average number of defects per sample: {:.2}\n",
        tally.average_defects_per_sample()
    ));
    out.push_str(&format!(
        "Total number of samples with ParseException: {} ({:.2}%)\n",
        summary.parse_exception_files.len(),
        percent(summary.parse_exception_files.len(), size)
    ));

    push_tally(&mut out, tally);

    out.push_str("\nDistribution of defects per priority (severity):\n");
    for (priority, count) in summary.priorities.iter() {
        out.push_str(&format!("  - Priority {}: {}\n", priority, count));
    }

    if summary.processing_errors > 0 {
        out.push_str(&format!(
            "\nProcessing errors: {}\n",
            summary.processing_errors
        ));
        for (kind, count) in summary.error_types.most_common(None) {
            out.push_str(&format!("  - {}: {}\n", kind, count));
        }
    }
    out.push('\n');
    out
}

fn render_pylint(summary: &PylintSummary) -> String {
    let tally = &summary.tally;
    let mut out = String::new();

    out.push_str("\nPylint + ODC stats\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Total number of samples: {}\n", summary.samples));
    out.push_str(&format!("Total number of defects: {}\n", tally.total_defects));
    out.push_str(&format!(
        "Total number of defective samples: {} ({:.2}%)\n",
        tally.defective_sample_count(),
        percent(tally.defective_sample_count(), summary.samples)
    ));
    out.push_str(&format!(
        "Total number of syntax errors: {} ({:.2}%)\n",
        summary.syntax_errors,
        percent(summary.syntax_errors, summary.samples)
    ));
    out.push_str(&format!(
        "Average number of defects per sample: {:.2}\n",
        tally.average_defects_per_sample()
    ));
    if summary.malformed_lines > 0 {
        out.push_str(&format!("Malformed lines skipped: {}\n", summary.malformed_lines));
    }

    push_tally(&mut out, tally);
    out.push('\n');
    out
}

/// Category totals, top rules, category spread and per-category rules.
fn push_tally<S: Ord + Clone>(out: &mut String, tally: &DefectTally<S>) {
    out.push_str("\nTotal defects divided per ODC Defect Type:\n");
    for (category, count) in tally.by_category.most_common(None) {
        out.push_str(&format!("  - {}: {}\n", category, count));
    }

    out.push_str("\nTop 10 defects:\n");
    for (rule, count) in tally.by_rule.most_common(Some(10)) {
        out.push_str(&format!("  - {}: {}\n", rule, count));
    }

    out.push_str("\nDistribution of ODC Defect Types per sample:\n");
    for (categories, samples) in tally.category_spread() {
        out.push_str(&format!(
            "  - {} samples in {} different ODC defect types\n",
            samples, categories
        ));
    }

    out.push_str("\nDistribution of defects per ODC Defect Type:\n");
    for (category, rules) in &tally.rules_by_category {
        out.push_str(&format!("\n  {} ({})\n", category, rules.total()));
        for (rule, count) in rules.most_common(None) {
            out.push_str(&format!("   • {}: {}\n", rule, count));
        }
    }
}

fn render_batches(summary: &BatchRunSummary) -> String {
    let total = summary.total_time.as_secs_f64();
    let mut out = String::new();

    out.push_str(&format!(
        "\n  {} batch(es), {} file(s), {} failed\n",
        summary.batches.len(),
        summary.files(),
        summary.failed()
    ));
    out.push_str(&format!(
        "  Total execution time: {:.2} seconds ({:.2} minutes)\n",
        total,
        total / 60.0
    ));

    out.push_str("\n  Detailed timings per batch:\n");
    for batch in &summary.batches {
        match (&batch.error, batch.scan_time) {
            (Some(error), _) => out.push_str(&format!(
                "  Batch {}: {} file(s), FAILED: {}\n",
                batch.index, batch.files, error
            )),
            (None, Some(scan)) => out.push_str(&format!(
                "  Batch {}: {} file(s), Semgrep time: {:.2} s, Batch cleanup time: {:.2} s\n",
                batch.index,
                batch.files,
                scan.as_secs_f64(),
                batch.cleanup_time.as_secs_f64()
            )),
            (None, None) => out.push_str(&format!(
                "  Batch {}: {} file(s), not scanned\n",
                batch.index, batch.files
            )),
        }
    }
    out.push('\n');
    out
}

fn render_security(report: &SecurityReport) -> String {
    let mut out = String::new();

    out.push_str("\nSemgrep + CWE stats\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Batches read: {}\n", report.batches_read));
    if !report.missing_batches.is_empty() {
        let missing: Vec<String> = report.missing_batches.iter().map(|b| b.to_string()).collect();
        out.push_str(&format!("Missing batches: {}\n", missing.join(", ")));
    }
    out.push_str(&format!(
        "Total skipped functions: {} (errors + incompatible rules)\n",
        report.skipped
    ));
    out.push_str(&format!("Total scanned functions: {} (100%)\n", report.scanned));
    out.push_str(&format!(
        "Total clean functions: {} ({:.2}%)\n",
        report.clean_samples,
        report.clean_rate()
    ));
    out.push_str(&format!(
        "Total defective functions (excluding errors): {} ({:.2}%)\n",
        report.defective_samples,
        report.defective_rate()
    ));
    out.push_str(&format!(
        "Total errors: {}. Errors w/o duplicates: {} ({:.2}%)\n",
        report.errors_total,
        report.error_samples,
        report.error_rate()
    ));
    out.push_str(&format!(
        "Total issues (considering multiple issues per function and excluding errors): {}\n",
        report.issues
    ));

    out.push_str(&format!(
        "\nFinal Unified CWE Set (without duplicates): {}\n",
        report.unified_cwes.len()
    ));

    out.push_str("\nTop 10 CWEs by occurrence (across all severities):\n");
    for (rank, (cwe, count)) in report.top_cwes.iter().enumerate() {
        out.push_str(&format!("{:2}. {}: {}\n", rank + 1, cwe, count));
    }

    let severities: Vec<&str> = report.severity_types.iter().map(String::as_str).collect();
    out.push_str(&format!("\nSeverity types: {}\n", severities.join(", ")));
    out.push_str("CWEs divided by severity:\n");
    for (severity, cwes) in &report.cwes_by_severity {
        out.push_str(&format!("\n  {} ({})\n", severity, cwes.total()));
        for (cwe, count) in cwes.most_common(None) {
            out.push_str(&format!("   • {}: {}\n", cwe, count));
        }
    }
    out.push('\n');
    out
}

fn render_complexity(report: &ComplexityReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\nComplexity stats ({}, {} samples",
        report.language, report.samples_read
    ));
    if report.malformed_lines > 0 || report.analysis_failures > 0 {
        out.push_str(&format!(
            ", {} malformed, {} failed",
            report.malformed_lines, report.analysis_failures
        ));
    }
    out.push_str(")\n");

    for field in &report.fields {
        out.push_str(&format!(
            "\nStats for {} ({} functions):\n",
            field.field, field.functions
        ));
        push_field(&mut out, field);
    }

    out.push_str(&format!(
        "\nAggregated Stats across ALL fields ({} functions):\n",
        report.aggregate.functions
    ));
    push_field(&mut out, &report.aggregate);
    out.push('\n');
    out
}

fn push_field(out: &mut String, field: &FieldSummary) {
    for (name, stats) in field.metrics() {
        let label = name.to_uppercase();
        match stats {
            MetricStats::Empty => out.push_str(&format!("  {:20} | No values\n", label)),
            MetricStats::Single { value } => {
                out.push_str(&format!("  {:20} | Only one value: {}\n", label, value))
            }
            MetricStats::Summary {
                mean,
                min,
                max,
                stdev,
            } => out.push_str(&format!(
                "  {:20} | Avg: {:6.2} | Min: {:3} | Max: {:3} | Std: {:6.2}\n",
                label, mean, min, max, stdev
            )),
        }
    }
    out.push_str(&format!(
        "  {:20} | Total: {}\n",
        "UNIQUE_TOKENS", field.unique_tokens
    ));
}
