pub mod console;
pub mod json;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate::pmd::PmdSummary;
use crate::aggregate::pylint::PylintSummary;
use crate::complexity::stats::ComplexityReport;
use crate::error::Result;
use crate::java::WrapStats;
use crate::runner::pylint::PylintRunStats;
use crate::runner::semgrep::BatchRunSummary;
use crate::semgrep::summary::SecurityReport;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Some(Self::Console),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Anything a subcommand prints when it finishes.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Report<'a> {
    Pmd {
        summary: &'a PmdSummary,
        /// Size of the scanned dataset; PMD reports only list files
        /// that had violations.
        dataset_size: Option<usize>,
    },
    Pylint(&'a PylintSummary),
    PylintRun {
        stats: &'a PylintRunStats,
        output: &'a Path,
    },
    WrapJava {
        stats: &'a WrapStats,
        output_dir: &'a Path,
    },
    SemgrepBatches(&'a BatchRunSummary),
    Security(&'a SecurityReport),
    Complexity(&'a ComplexityReport),
}

/// Render a report into the specified format.
pub fn render(report: &Report<'_>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render(report)),
        OutputFormat::Json => json::render(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_format_names() {
        assert_eq!(OutputFormat::from_str_lenient("TEXT"), Some(OutputFormat::Console));
        assert_eq!(OutputFormat::from_str_lenient("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str_lenient("sarif"), None);
    }
}
