use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::cwe::{self, SecurityIssue};
use super::MergedScan;
use crate::aggregate::{percent, Counter, SampleId};

/// Final statistics of a semgrep security scan.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub batches_read: usize,
    pub missing_batches: Vec<usize>,
    pub skipped: usize,
    pub scanned: usize,
    /// Error occurrences after dropping incompatible-rule errors.
    pub errors_total: usize,
    /// Distinct samples with at least one error.
    pub error_samples: usize,
    /// Distinct error-free samples with at least one security issue.
    pub defective_samples: usize,
    /// `scanned - defective - errors`; can go negative when semgrep
    /// reports errors for files it did not list as scanned.
    pub clean_samples: i64,
    /// Deduplicated security issues.
    pub issues: usize,
    pub unified_cwes: BTreeSet<String>,
    pub top_cwes: Vec<(String, usize)>,
    pub severity_types: BTreeSet<String>,
    pub cwes_by_severity: BTreeMap<String, Counter<String>>,
}

impl SecurityReport {
    pub fn defective_rate(&self) -> f64 {
        percent(self.defective_samples, self.scanned)
    }

    pub fn error_rate(&self) -> f64 {
        percent(self.error_samples, self.scanned)
    }

    pub fn clean_rate(&self) -> f64 {
        if self.scanned == 0 {
            0.0
        } else {
            self.clean_samples as f64 / self.scanned as f64 * 100.0
        }
    }
}

/// Normalize, deduplicate and summarize a merged scan.
pub fn analyze(scan: &MergedScan) -> SecurityReport {
    let error_samples = scan.error_samples();

    let (table, raw_issues) = cwe::normalize(scan.error_free_results());
    let severity_types: BTreeSet<String> = raw_issues
        .iter()
        .map(|i| i.severity.clone())
        .filter(|s| !s.is_empty())
        .collect();
    let issues = cwe::dedupe(raw_issues);

    let defective: BTreeSet<&SampleId> = issues.iter().map(|i| &i.sample).collect();

    let top_cwes = issues
        .iter()
        .flat_map(|i| i.cwes.iter().cloned())
        .collect::<Counter<String>>()
        .most_common(Some(10));

    let clean_samples =
        scan.scanned.len() as i64 - defective.len() as i64 - error_samples.len() as i64;

    SecurityReport {
        batches_read: scan.batches_read,
        missing_batches: scan.missing_batches.clone(),
        skipped: scan.skipped,
        scanned: scan.scanned.len(),
        errors_total: scan.errors.len(),
        error_samples: error_samples.len(),
        defective_samples: defective.len(),
        clean_samples,
        issues: issues.len(),
        unified_cwes: table.unified().into_iter().map(String::from).collect(),
        top_cwes,
        cwes_by_severity: bucket_by_severity(&issues, &severity_types),
        severity_types,
    }
}

/// Per severity, how many issues carry each CWE. Every observed severity
/// gets an entry, even when deduplication left it empty.
fn bucket_by_severity(
    issues: &[SecurityIssue],
    severity_types: &BTreeSet<String>,
) -> BTreeMap<String, Counter<String>> {
    let mut buckets: BTreeMap<String, Counter<String>> = severity_types
        .iter()
        .map(|s| (s.clone(), Counter::default()))
        .collect();
    for issue in issues.iter().filter(|i| !i.severity.is_empty()) {
        let bucket = buckets.entry(issue.severity.clone()).or_default();
        for cwe in &issue.cwes {
            bucket.add(cwe.clone());
        }
    }
    buckets
}
