//! Run pylint on every code sample of a JSONL dataset and annotate its
//! messages with ODC categories.

use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use super::{run_with_timeout, ToolOutcome};
use crate::config::PylintConfig;
use crate::error::Result;
use crate::odc::OdcMapping;

/// Why a pylint invocation produced a placeholder instead of real output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintFailure {
    Timeout,
    Crash(String),
    MalformedOutput(String),
}

/// Annotated pylint messages for one sample.
#[derive(Debug, Clone)]
pub struct LintReport {
    pub messages: Vec<Value>,
    pub failure: Option<LintFailure>,
}

/// Counters for one `pylint-run` pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PylintRunStats {
    pub lines_read: usize,
    pub samples_linted: usize,
    pub blank_skipped: usize,
    pub malformed_lines: usize,
    pub timeouts: usize,
    pub crashes: usize,
    pub malformed_outputs: usize,
}

pub struct PylintRunner<'a> {
    mapping: &'a OdcMapping,
    program: String,
    jobs: usize,
    timeout: Duration,
}

impl<'a> PylintRunner<'a> {
    pub fn new(mapping: &'a OdcMapping, config: &PylintConfig) -> Self {
        Self {
            mapping,
            program: "pylint".into(),
            jobs: config.jobs,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Use a different executable (a wrapper script or a virtualenv pylint).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Lint one code sample. The temporary `.py` file is removed when this
    /// returns, whatever the outcome.
    pub fn lint(&self, code: &str) -> Result<LintReport> {
        let mut tmp = tempfile::Builder::new()
            .prefix("odcscan_")
            .suffix(".py")
            .tempfile()?;
        tmp.write_all(code.as_bytes())?;
        tmp.flush()?;

        let mut command = Command::new(&self.program);
        command
            .arg(tmp.path())
            .arg("--output-format=json")
            .arg("--score=no")
            .arg(format!("-j={}", self.jobs));

        let (messages, failure) = match run_with_timeout(&mut command, self.timeout) {
            ToolOutcome::Completed { stdout, .. } => match parse_output(&stdout) {
                Ok(messages) => (messages, None),
                Err(e) => {
                    let message = e.to_string();
                    (
                        vec![fatal(&message)],
                        Some(LintFailure::MalformedOutput(message)),
                    )
                }
            },
            ToolOutcome::TimedOut => (vec![fatal("Pylint timeout")], Some(LintFailure::Timeout)),
            ToolOutcome::Failed(message) => {
                (vec![fatal(&message)], Some(LintFailure::Crash(message)))
            }
        };

        Ok(LintReport {
            messages: annotate(messages, self.mapping),
            failure,
        })
    }

    /// Lint `code_field` of every line in `input`, writing one annotated
    /// record per non-blank sample to `output`.
    pub fn run_dataset(
        &self,
        input: &Path,
        output: &Path,
        code_field: &str,
        id_field: &str,
    ) -> Result<PylintRunStats> {
        let reader = std::io::BufReader::new(std::fs::File::open(input)?);
        let mut writer = BufWriter::new(std::fs::File::create(output)?);
        let mut stats = PylintRunStats::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines_read += 1;

            let item: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    stats.malformed_lines += 1;
                    tracing::warn!(line = idx + 1, error = %e, "skipping malformed dataset line");
                    continue;
                }
            };

            let code = item.get(code_field).and_then(Value::as_str).unwrap_or("");
            if code.trim().is_empty() {
                stats.blank_skipped += 1;
                continue;
            }

            let report = self.lint(code)?;
            match &report.failure {
                Some(LintFailure::Timeout) => stats.timeouts += 1,
                Some(LintFailure::Crash(_)) => stats.crashes += 1,
                Some(LintFailure::MalformedOutput(_)) => stats.malformed_outputs += 1,
                None => {}
            }
            if let Some(failure) = &report.failure {
                tracing::debug!(line = idx + 1, ?failure, "pylint did not produce output");
            }

            let record = json!({
                id_field: item.get(id_field).cloned().unwrap_or(Value::Null),
                "pylint_output": report.messages,
            });
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
            stats.samples_linted += 1;

            if stats.samples_linted % 1000 == 0 {
                tracing::info!(samples = stats.samples_linted, "pylint progress");
            }
        }

        writer.flush()?;
        Ok(stats)
    }
}

/// Parse pylint's JSON stdout. Empty output means no messages.
pub fn parse_output(stdout: &str) -> serde_json::Result<Vec<Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
}

/// Attach `odc_category` (or `"--"`) to every message object.
pub fn annotate(messages: Vec<Value>, mapping: &OdcMapping) -> Vec<Value> {
    messages
        .into_iter()
        .map(|mut msg| {
            let label = msg
                .get("symbol")
                .and_then(Value::as_str)
                .map(|symbol| mapping.label(symbol))
                .unwrap_or(crate::odc::UNCATEGORIZED)
                .to_string();
            if let Some(obj) = msg.as_object_mut() {
                obj.insert("odc_category".into(), Value::String(label));
            }
            msg
        })
        .collect()
}

fn fatal(message: &str) -> Value {
    json!({ "type": "fatal", "message": message })
}
