//! Per-function size, complexity and token statistics.
//!
//! Functions are located with tree-sitter. For each one the analyzer
//! reports its line span, non-comment line count (NLOC) and cyclomatic
//! complexity (CCN: one plus the number of decision points, nested
//! functions excluded). The function's source lines are then run through
//! the `cl100k_base` tokenizer.

#[cfg(feature = "java")]
pub mod java;
#[cfg(feature = "python")]
pub mod python;
pub mod stats;
#[cfg(any(feature = "java", feature = "python"))]
mod syntax;
pub mod tokens;

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;

use self::stats::{ComplexityReport, FieldSummary};
use self::tokens::Tokenizer;
use crate::error::{AuditError, Result};
use crate::language::Language;

/// A function located in a code sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub nloc: usize,
    pub ccn: usize,
}

/// Metrics of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionMetrics {
    pub name: String,
    pub nloc: usize,
    pub ccn: usize,
    pub token_count: usize,
    pub function_name_length: usize,
}

/// Finds functions in source code of one language.
pub trait FunctionAnalyzer: Send + Sync {
    fn language(&self) -> Language;
    fn functions(&self, code: &str) -> Result<Vec<FunctionSpan>>;
}

/// Get the analyzer for a language, if its grammar was compiled in.
pub fn analyzer_for_language(lang: Language) -> Option<Box<dyn FunctionAnalyzer>> {
    match lang {
        #[cfg(feature = "java")]
        Language::Java => Some(Box::new(java::JavaAnalyzer)),
        #[cfg(feature = "python")]
        Language::Python => Some(Box::new(python::PythonAnalyzer)),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Functions of a body of code plus every token id they contain.
#[derive(Debug, Clone, Default)]
pub struct CodeProfile {
    pub functions: Vec<FunctionMetrics>,
    pub tokens: HashSet<usize>,
}

impl CodeProfile {
    pub fn merge(&mut self, other: CodeProfile) {
        self.functions.extend(other.functions);
        self.tokens.extend(other.tokens);
    }

    fn summary(&self, field: &str) -> FieldSummary {
        FieldSummary::from_functions(field, &self.functions, self.tokens.len())
    }
}

/// Measure every function in `code`.
pub fn analyze_code(analyzer: &dyn FunctionAnalyzer, code: &str) -> Result<CodeProfile> {
    let lines: Vec<&str> = code.lines().collect();
    let mut profile = CodeProfile::default();

    for span in analyzer.functions(code)? {
        let start = span.start_line.saturating_sub(1).min(lines.len());
        let end = span.end_line.min(lines.len()).max(start);
        let ids = Tokenizer::encode(&lines[start..end].join("\n"))?;

        profile.functions.push(FunctionMetrics {
            function_name_length: span.name.chars().count(),
            name: span.name,
            nloc: span.nloc,
            ccn: span.ccn,
            token_count: ids.len(),
        });
        profile.tokens.extend(ids);
    }
    Ok(profile)
}

/// Profile the code in `fields` of every JSONL record in `path`.
pub fn profile_dataset(
    path: &Path,
    fields: &[String],
    analyzer: &dyn FunctionAnalyzer,
) -> Result<ComplexityReport> {
    if fields.is_empty() {
        return Err(AuditError::Config("no code fields to profile".into()));
    }
    Tokenizer::load()?;
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let mut profiles: Vec<CodeProfile> = vec![CodeProfile::default(); fields.len()];
    let mut samples_read = 0;
    let mut malformed_lines = 0;
    let mut analysis_failures = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let entry: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                malformed_lines += 1;
                tracing::warn!(line = idx + 1, error = %e, "skipping malformed JSON line");
                continue;
            }
        };
        samples_read += 1;

        for (field, profile) in fields.iter().zip(profiles.iter_mut()) {
            let code = match entry.get(field).and_then(|v| v.as_str()) {
                Some(code) if !code.is_empty() => code,
                _ => continue,
            };
            match analyze_code(analyzer, code) {
                Ok(found) => profile.merge(found),
                Err(e) => {
                    analysis_failures += 1;
                    tracing::warn!(line = idx + 1, field = %field, error = %e, "skipping sample");
                }
            }
        }
    }

    let mut everything = CodeProfile::default();
    for profile in &profiles {
        everything.merge(profile.clone());
    }

    Ok(ComplexityReport {
        language: analyzer.language(),
        samples_read,
        malformed_lines,
        analysis_failures,
        fields: fields
            .iter()
            .zip(&profiles)
            .map(|(field, profile)| profile.summary(field))
            .collect(),
        aggregate: everything.summary("ALL"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::stats::MetricStats;

    struct FixedAnalyzer;

    impl FunctionAnalyzer for FixedAnalyzer {
        fn language(&self) -> Language {
            Language::Python
        }

        fn functions(&self, code: &str) -> Result<Vec<FunctionSpan>> {
            if code.contains("boom") {
                return Err(AuditError::Internal("boom".into()));
            }
            Ok(vec![FunctionSpan {
                name: "whole".into(),
                start_line: 1,
                end_line: code.lines().count() + 5,
                nloc: code.lines().count(),
                ccn: 1,
            }])
        }
    }

    #[test]
    fn span_past_end_is_clamped() {
        let profile = analyze_code(&FixedAnalyzer, "x = 1\ny = 2").unwrap();
        assert_eq!(profile.functions.len(), 1);
        assert_eq!(profile.functions[0].function_name_length, 5);
        assert_eq!(profile.functions[0].nloc, 2);
        assert!(profile.functions[0].token_count > 0);
        assert!(!profile.tokens.is_empty());
    }

    #[test]
    fn dataset_profile_per_field_and_overall() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ds.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"human_code\": \"a = 1\", \"qwen_code\": \"b = 2\\nc = 3\"}\n",
                "not json\n",
                "{\"human_code\": \"boom\", \"qwen_code\": \"\"}\n",
                "{\"human_code\": \"d = 4\"}\n",
            ),
        )
        .unwrap();
        let fields = vec![
            "human_code".to_string(),
            "qwen_code".to_string(),
            "dsc_code".to_string(),
        ];

        let report = profile_dataset(&path, &fields, &FixedAnalyzer).unwrap();
        assert_eq!(report.samples_read, 3);
        assert_eq!(report.malformed_lines, 1);
        assert_eq!(report.analysis_failures, 1);
        assert_eq!(report.fields[0].functions, 2);
        assert_eq!(report.fields[1].functions, 1);
        assert_eq!(report.fields[1].nloc, MetricStats::Single { value: 2.0 });
        assert_eq!(report.fields[2].functions, 0);
        assert_eq!(report.fields[2].nloc, MetricStats::Empty);
        assert_eq!(report.aggregate.field, "ALL");
        assert_eq!(report.aggregate.functions, 3);
    }

    #[test]
    fn empty_field_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ds.jsonl");
        std::fs::write(&path, "{}\n").unwrap();
        assert!(profile_dataset(&path, &[], &FixedAnalyzer).is_err());
    }

    #[cfg(feature = "java")]
    #[test]
    fn java_analyzer_end_to_end() {
        let analyzer = analyzer_for_language(Language::Java).unwrap();
        let code = "public class A {\n    int f(int x) {\n        return x > 0 ? 1 : 0;\n    }\n}";
        let profile = analyze_code(analyzer.as_ref(), code).unwrap();
        assert_eq!(profile.functions.len(), 1);
        assert_eq!(profile.functions[0].name, "A::f");
        assert_eq!(profile.functions[0].function_name_length, 4);
        assert_eq!(profile.functions[0].ccn, 2);
        assert_eq!(profile.functions[0].nloc, 3);
    }
}
