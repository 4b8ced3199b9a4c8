//! CWE label normalization and issue deduplication.
//!
//! Different semgrep rule packs spell the same weakness differently
//! (`"CWE-79: Improper Neutralization ..."` vs `"CWE-79"`). Labels are
//! keyed by their `CWE-nnn` prefix and every occurrence is rewritten to
//! the longest description seen for that key; on equal length the first
//! one seen is kept. Issues are deduplicated only after rewriting, since
//! two spellings of one CWE must produce the same key.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use super::SampleResult;
use crate::aggregate::SampleId;

static CWE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(CWE-\d+)").unwrap());

/// `CWE-nnn` prefix of a label, upper-cased; labels without one key on
/// themselves.
pub fn base_cwe(label: &str) -> String {
    let label = label.trim();
    CWE_PREFIX_RE
        .captures(label)
        .map(|caps| caps[1].to_uppercase())
        .unwrap_or_else(|| label.to_string())
}

/// Base CWE → canonical (longest) description.
#[derive(Debug, Clone, Default)]
pub struct CweTable {
    canonical: BTreeMap<String, String>,
}

impl CweTable {
    /// Build the table from every label in `labels`, in order.
    pub fn build<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::default();
        for label in labels {
            table.observe(label.as_ref());
        }
        table
    }

    /// Record one occurrence of `label`.
    pub fn observe(&mut self, label: &str) {
        let label = label.trim();
        let current = self
            .canonical
            .entry(base_cwe(label))
            .or_insert_with(|| label.to_string());
        if label.len() > current.len() {
            *current = label.to_string();
        }
    }

    /// Canonical spelling of `label`.
    pub fn canonical(&self, label: &str) -> String {
        self.canonical
            .get(&base_cwe(label))
            .cloned()
            .unwrap_or_else(|| label.trim().to_string())
    }

    /// Distinct canonical labels.
    pub fn unified(&self) -> BTreeSet<&str> {
        self.canonical.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// A security-relevant finding with canonical CWE labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityIssue {
    pub sample: SampleId,
    pub check_id: String,
    pub cwes: Vec<String>,
    pub severity: String,
    pub lines: String,
}

impl SecurityIssue {
    /// Identity used for deduplication.
    fn key(&self) -> (SampleId, Vec<String>, String, String) {
        let mut cwes = self.cwes.clone();
        cwes.sort();
        (
            self.sample.clone(),
            cwes,
            self.severity.clone(),
            self.lines.trim().to_string(),
        )
    }
}

/// Normalize CWE labels of every result that carries any, returning the
/// table and the rewritten issues (not yet deduplicated). Results without
/// a CWE are not security issues and are dropped.
pub fn normalize<'a, I>(results: I) -> (CweTable, Vec<SecurityIssue>)
where
    I: IntoIterator<Item = &'a SampleResult>,
{
    let raw: Vec<SecurityIssue> = results
        .into_iter()
        .filter_map(|r| {
            let cwes: Vec<String> = r
                .result
                .extra
                .metadata
                .cwe
                .as_ref()?
                .labels()
                .into_iter()
                .filter(|c| !c.trim().is_empty())
                .collect();
            if cwes.is_empty() {
                return None;
            }
            Some(SecurityIssue {
                sample: r.sample.clone(),
                check_id: r.result.check_id.clone(),
                cwes,
                severity: r.result.extra.severity.clone().unwrap_or_default(),
                lines: r.result.extra.lines.clone().unwrap_or_default(),
            })
        })
        .collect();

    let table = CweTable::build(raw.iter().flat_map(|i| i.cwes.iter()));
    let issues = raw
        .into_iter()
        .map(|mut issue| {
            issue.cwes = issue.cwes.iter().map(|c| table.canonical(c)).collect();
            issue
        })
        .collect();
    (table, issues)
}

/// Drop issues whose (sample, CWE set, severity, line text) key was
/// already seen; the first occurrence wins.
pub fn dedupe(issues: Vec<SecurityIssue>) -> Vec<SecurityIssue> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.key()))
        .collect()
}
