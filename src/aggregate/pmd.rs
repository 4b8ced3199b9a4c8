//! PMD report aggregation.
//!
//! PMD is run in batches and writes one `report_*.json` per batch. Each
//! report lists violations per file plus the files PMD failed to process.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Counter, DefectTally};
use crate::error::{AuditError, Result};
use crate::odc::{ExclusionPolicy, OdcMapping};

/// File-name pattern of PMD batch reports.
pub const REPORT_GLOB: &str = "report_*.json";

static EXCEPTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+Exception)").unwrap());

/// One PMD JSON report (the subset we consume).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PmdReport {
    #[serde(default)]
    pub files: Vec<PmdFile>,
    #[serde(default, rename = "processingErrors")]
    pub processing_errors: Vec<ProcessingError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmdFile {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Violation {
    #[serde(default)]
    pub rule: String,
    pub priority: Option<u32>,
    pub beginline: Option<usize>,
    pub description: Option<String>,
    pub ruleset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingError {
    pub filename: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Aggregated PMD statistics over every report in a directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PmdSummary {
    pub reports_read: usize,
    pub reports_skipped: usize,
    pub tally: DefectTally<String>,
    /// Violations per PMD priority, counted before exclusion/categorization.
    pub priorities: Counter<u32>,
    pub processing_errors: usize,
    pub error_types: Counter<String>,
    pub parse_exception_files: BTreeSet<String>,
}

impl PmdSummary {
    /// Fold one report into the summary.
    pub fn fold_report(
        &mut self,
        report: &PmdReport,
        mapping: &OdcMapping,
        policy: &ExclusionPolicy,
    ) {
        for error in &report.processing_errors {
            self.processing_errors += 1;
            if let Some(caps) = EXCEPTION_RE.captures(&error.message) {
                let error_type = caps[1].to_string();
                if error_type == "ParseException" {
                    if let Some(filename) = error.filename.as_deref().filter(|f| !f.is_empty()) {
                        self.parse_exception_files.insert(filename.to_string());
                    }
                }
                self.error_types.add(error_type);
            }
        }

        for file in &report.files {
            for violation in &file.violations {
                if let Some(priority) = violation.priority.filter(|&p| p > 0) {
                    self.priorities.add(priority);
                }
                let disposition =
                    policy.classify(&violation.rule, mapping.lookup(&violation.rule));
                self.tally.record(&file.filename, &violation.rule, disposition);
            }
        }

        self.reports_read += 1;
    }
}

/// Report files in `dir` matching [`REPORT_GLOB`], sorted by name.
pub fn report_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(REPORT_GLOB)
        .map_err(|e| AuditError::Internal(format!("bad report pattern: {e}")))?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| pattern.matches(n))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read and aggregate every PMD report in `dir`.
///
/// A report that cannot be read or parsed is logged and skipped.
pub fn aggregate_dir(
    dir: &Path,
    mapping: &OdcMapping,
    policy: &ExclusionPolicy,
) -> Result<PmdSummary> {
    let mut summary = PmdSummary::default();

    for path in report_files(dir)? {
        let report = std::fs::read_to_string(&path)
            .map_err(AuditError::from)
            .and_then(|content| serde_json::from_str::<PmdReport>(&content).map_err(AuditError::from));
        match report {
            Ok(report) => summary.fold_report(&report, mapping, policy),
            Err(e) => {
                summary.reports_skipped += 1;
                tracing::warn!(
                    report = %path.display(),
                    error = %e,
                    "unreadable PMD report, skipping"
                );
            }
        }
    }

    tracing::info!(
        reports = summary.reports_read,
        defects = summary.tally.total_defects,
        "aggregated PMD reports"
    );
    Ok(summary)
}
