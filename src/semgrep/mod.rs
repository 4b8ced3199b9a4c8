//! Semgrep results processing.
//!
//! A scan of a large corpus produces one JSON file per batch. This module
//! merges the batches, maps every path back to the dataset sample it came
//! from, drops samples semgrep failed on, and hands the remaining results
//! to CWE normalization ([`cwe`]) and summarization ([`summary`]).

pub mod cwe;
pub mod summary;

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::aggregate::SampleId;
use crate::error::Result;

pub use cwe::{CweTable, SecurityIssue};
pub use summary::SecurityReport;

/// Errors reported against registry URLs are rules incompatible with the
/// installed semgrep version or the target language, not scan failures.
const INCOMPATIBLE_RULE_PREFIX: &str = "https:/semgrep.dev/...";

static SAMPLE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d+)\.py$").unwrap());

/// Top-level semgrep `--json` output (the subset we consume).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SemgrepOutput {
    #[serde(default)]
    pub errors: Vec<SemgrepError>,
    #[serde(default)]
    pub results: Vec<SemgrepResult>,
    #[serde(default)]
    pub paths: ScanPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemgrepError {
    pub path: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanPaths {
    #[serde(default)]
    pub scanned: Vec<String>,
    #[serde(default)]
    pub skipped: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemgrepResult {
    #[serde(default)]
    pub check_id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub extra: ResultExtra,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultExtra {
    pub severity: Option<String>,
    pub lines: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultMetadata {
    pub cwe: Option<CweField>,
}

/// Semgrep rules declare `cwe` either as one string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CweField {
    One(String),
    Many(Vec<String>),
}

impl CweField {
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// A result attributed to its dataset sample.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub sample: SampleId,
    pub result: SemgrepResult,
}

/// All batches merged into one view.
#[derive(Debug, Clone, Default)]
pub struct MergedScan {
    pub batches_read: usize,
    pub missing_batches: Vec<usize>,
    /// Errors after dropping incompatible-rule entries, one per occurrence.
    pub errors: Vec<SampleId>,
    pub results: Vec<SampleResult>,
    pub scanned: Vec<SampleId>,
    pub skipped: usize,
}

impl MergedScan {
    /// Append one batch.
    pub fn merge(&mut self, output: SemgrepOutput) {
        for error in output.errors {
            match error.path {
                Some(path) if !path.starts_with(INCOMPATIBLE_RULE_PREFIX) => {
                    self.errors.push(sample_id_from_path(&path));
                }
                _ => {
                    tracing::debug!(message = ?error.message, "ignoring rule-level semgrep error");
                }
            }
        }
        self.results
            .extend(output.results.into_iter().map(|result| SampleResult {
                sample: sample_id_from_path(&result.path),
                result,
            }));
        self.scanned
            .extend(output.paths.scanned.iter().map(|p| sample_id_from_path(p)));
        self.skipped += output.paths.skipped.len();
        self.batches_read += 1;
    }

    /// Distinct samples semgrep reported an error for.
    pub fn error_samples(&self) -> BTreeSet<SampleId> {
        self.errors.iter().cloned().collect()
    }

    /// Results whose sample did not error.
    pub fn error_free_results(&self) -> impl Iterator<Item = &SampleResult> {
        let failed = self.error_samples();
        self.results
            .iter()
            .filter(move |r| !failed.contains(&r.sample))
    }
}

/// Map a scanned path to its sample: the trailing `_<n>.py` number when
/// present, otherwise the path itself. Wrapped Java files are already
/// unique per sample (`Foo_2.java` is a renamed class, not sample 2), so
/// they keep their path.
pub fn sample_id_from_path(path: &str) -> SampleId {
    SAMPLE_NUMBER_RE
        .captures(path)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(SampleId::Index)
        .unwrap_or_else(|| SampleId::Name(path.to_string()))
}

/// Path of batch `index` for the given base name (`<base>_<index>.json`).
pub fn batch_path(base: &str, index: usize) -> String {
    format!("{}_{}.json", base, index)
}

/// Read `<base>_1.json` through `<base>_<max_batch>.json`.
///
/// A missing batch (its scan failed) is logged and skipped; a batch that
/// exists but does not parse is an error.
pub fn load_batches(base: &str, max_batch: usize) -> Result<MergedScan> {
    let mut merged = MergedScan::default();
    for index in 1..=max_batch {
        let path = batch_path(base, index);
        let path = Path::new(&path);
        if !path.exists() {
            tracing::warn!(batch = index, path = %path.display(), "batch results missing, skipping");
            merged.missing_batches.push(index);
            continue;
        }
        let content = std::fs::read_to_string(path)?;
        let output: SemgrepOutput =
            serde_json::from_str(&content).map_err(|e| crate::error::AuditError::Parse {
                file: path.display().to_string(),
                message: e.to_string(),
            })?;
        merged.merge(output);
    }
    tracing::info!(
        batches = merged.batches_read,
        results = merged.results.len(),
        errors = merged.errors.len(),
        "merged semgrep batches"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn output(json: &str) -> SemgrepOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn sample_ids_from_paths() {
        assert_eq!(
            sample_id_from_path("tmp/humaneval_12.py"),
            SampleId::Index(12)
        );
        assert_eq!(
            sample_id_from_path("Foo_3.java"),
            SampleId::Name("Foo_3.java".into())
        );
        assert_eq!(
            sample_id_from_path("TempClass.java"),
            SampleId::Name("TempClass.java".into())
        );
    }

    #[test]
    fn merge_filters_incompatible_rule_errors() {
        let mut merged = MergedScan::default();
        merged.merge(output(
            r#"{
                "errors": [
                    {"path": "https:/semgrep.dev/.../rule.yaml", "message": "bad rule"},
                    {"path": "ds_4.py", "message": "Syntax error"},
                    {"path": "ds_4.py", "message": "Timeout"},
                    {"message": "no path at all"}
                ],
                "results": [
                    {"check_id": "a", "path": "ds_4.py", "extra": {"severity": "ERROR"}},
                    {"check_id": "b", "path": "ds_5.py", "extra": {"severity": "ERROR"}}
                ],
                "paths": {"scanned": ["ds_4.py", "ds_5.py", "ds_6.py"], "skipped": [{"path": "ds_4.py", "reason": "analysis_failed_parser_or_internal_error"}]}
            }"#,
        ));

        assert_eq!(merged.errors.len(), 2);
        assert_eq!(merged.error_samples().len(), 1);
        assert_eq!(merged.scanned.len(), 3);
        assert_eq!(merged.skipped, 1);
        let clean: Vec<_> = merged.error_free_results().collect();
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].sample, SampleId::Index(5));
    }

    #[test]
    fn cwe_field_accepts_string_or_list() {
        let one: CweField = serde_json::from_str(r#""CWE-79: XSS""#).unwrap();
        let many: CweField = serde_json::from_str(r#"["CWE-79: XSS", "CWE-80"]"#).unwrap();
        assert_eq!(one.labels(), vec!["CWE-79: XSS".to_string()]);
        assert_eq!(many.labels().len(), 2);
    }

    #[test]
    fn load_batches_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("ds_semgrep_results_batch");
        let base = base.to_string_lossy();
        std::fs::write(
            batch_path(&base, 1),
            r#"{"errors": [], "results": [], "paths": {"scanned": ["ds_1.py"], "skipped": []}}"#,
        )
        .unwrap();
        std::fs::write(
            batch_path(&base, 3),
            r#"{"errors": [], "results": [], "paths": {"scanned": ["ds_2.py", "ds_3.py"], "skipped": []}}"#,
        )
        .unwrap();

        let merged = load_batches(&base, 3).unwrap();
        assert_eq!(merged.batches_read, 2);
        assert_eq!(merged.missing_batches, vec![2]);
        assert_eq!(merged.scanned.len(), 3);
    }
}
