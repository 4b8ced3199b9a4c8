//! Aggregation of pylint JSONL output annotated with ODC categories.
//!
//! Input is what `odcscan pylint-run` writes: one line per sample,
//! `{"hm_index": .., "pylint_output": [{"symbol": .., "odc_category": ..}]}`.

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{DefectTally, SampleId};
use crate::error::Result;
use crate::odc::{self, Disposition, ExclusionPolicy};

/// Symbol pylint emits when the sample does not parse.
pub const SYNTAX_ERROR_SYMBOL: &str = "syntax-error";

#[derive(Debug, Clone, Deserialize)]
struct PylintMessage {
    symbol: Option<String>,
    odc_category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PylintSummary {
    /// Lines successfully read (one sample each).
    pub samples: usize,
    pub malformed_lines: usize,
    pub syntax_errors: usize,
    pub tally: DefectTally<SampleId>,
}

impl PylintSummary {
    /// Fold the messages of one sample.
    fn fold_sample(&mut self, sample: &SampleId, messages: &[PylintMessage], policy: &ExclusionPolicy) {
        self.samples += 1;
        for msg in messages {
            let symbol = msg.symbol.as_deref().unwrap_or_default();
            let disposition = if policy.is_excluded(symbol) {
                Disposition::Excluded
            } else if symbol == SYNTAX_ERROR_SYMBOL {
                self.syntax_errors += 1;
                Disposition::Excluded
            } else {
                policy.classify(symbol, odc::parse_category(msg.odc_category.as_deref()))
            };
            self.tally.record(sample, symbol, disposition);
        }
    }

    /// Fold one JSONL line. `line_no` is 1-based and only used when the
    /// line carries no usable id.
    pub fn fold_line(
        &mut self,
        line: &str,
        line_no: usize,
        id_field: &str,
        policy: &ExclusionPolicy,
    ) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let sample = value
            .get(id_field)
            .and_then(SampleId::from_json)
            .unwrap_or_else(|| SampleId::Name(format!("#{}", line_no)));
        let messages: Vec<PylintMessage> = match value.get("pylint_output") {
            Some(output) if !output.is_null() => serde_json::from_value(output.clone())?,
            _ => Vec::new(),
        };
        self.fold_sample(&sample, &messages, policy);
        Ok(())
    }
}

/// Aggregate a pylint JSONL file. Malformed lines are logged and skipped.
pub fn aggregate_file(path: &Path, id_field: &str, policy: &ExclusionPolicy) -> Result<PylintSummary> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut summary = PylintSummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = summary.fold_line(&line, idx + 1, id_field, policy) {
            summary.malformed_lines += 1;
            tracing::warn!(line = idx + 1, error = %e, "skipping malformed pylint record");
        }
    }

    tracing::info!(
        samples = summary.samples,
        defects = summary.tally.total_defects,
        "aggregated pylint output"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::new(["invalid-name", "import-error"])
    }

    #[test]
    fn counts_defects_and_syntax_errors() {
        let mut summary = PylintSummary::default();
        let lines = [
            r#"{"hm_index": 1, "pylint_output": [{"symbol": "unused-variable", "odc_category": "Assignment"}, {"symbol": "invalid-name", "odc_category": "Documentation"}]}"#,
            r#"{"hm_index": 2, "pylint_output": [{"symbol": "syntax-error", "odc_category": "--"}]}"#,
            r#"{"hm_index": 3, "pylint_output": [{"symbol": "line-too-long", "odc_category": "--"}, {"type": "fatal", "message": "Pylint timeout", "odc_category": "--"}]}"#,
            r#"{"hm_index": 4, "pylint_output": []}"#,
        ];
        for (i, line) in lines.iter().enumerate() {
            summary.fold_line(line, i + 1, "hm_index", &policy()).unwrap();
        }

        assert_eq!(summary.samples, 4);
        assert_eq!(summary.syntax_errors, 1);
        assert_eq!(summary.tally.total_defects, 1);
        assert_eq!(summary.tally.excluded, 2);
        assert_eq!(summary.tally.uncategorized, 2);
        assert!(summary.tally.is_defective(&SampleId::Index(1)));
        assert!(!summary.tally.is_defective(&SampleId::Index(2)));
    }

    #[test]
    fn excluded_syntax_error_is_not_counted_as_syntax_error() {
        let policy = ExclusionPolicy::new([SYNTAX_ERROR_SYMBOL]);
        let mut summary = PylintSummary::default();
        summary
            .fold_line(
                r#"{"hm_index": 9, "pylint_output": [{"symbol": "syntax-error"}]}"#,
                1,
                "hm_index",
                &policy,
            )
            .unwrap();
        assert_eq!(summary.syntax_errors, 0);
        assert_eq!(summary.tally.excluded, 1);
    }

    #[test]
    fn aggregate_file_skips_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"hm_index": 1, "pylint_output": [{{"symbol": "unused-import", "odc_category": "Checking"}}]}}"#
        )
        .unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"hm_index": 2, "pylint_output": [{{"symbol": "unused-import", "odc_category": "Checking"}}]}}"#
        )
        .unwrap();

        let summary = aggregate_file(file.path(), "hm_index", &policy()).unwrap();
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.tally.by_rule.get(&"unused-import".to_string()), 2);
        assert_eq!(summary.tally.defective_sample_count(), 2);
    }
}
