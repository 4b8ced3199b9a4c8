//! Batched semgrep scans.
//!
//! Corpora are far too large for one semgrep process, so samples are
//! staged into a scratch directory a batch at a time and semgrep is run
//! once per batch. The scratch directory lives exactly as long as its
//! batch. A failing batch is reported and the loop moves on.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::SemgrepConfig;
use crate::error::{AuditError, Result};
use crate::language::Language;

/// What happened to one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// 1-based batch number, as used in the result file name.
    pub index: usize,
    pub files: usize,
    pub result_path: PathBuf,
    pub stage_time: Duration,
    pub scan_time: Option<Duration>,
    pub cleanup_time: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRunSummary {
    pub batches: Vec<BatchOutcome>,
    pub total_time: Duration,
}

impl BatchRunSummary {
    pub fn failed(&self) -> usize {
        self.batches.iter().filter(|b| b.error.is_some()).count()
    }

    pub fn files(&self) -> usize {
        self.batches.iter().map(|b| b.files).sum()
    }
}

pub struct SemgrepRunner {
    program: String,
    config: SemgrepConfig,
}

impl SemgrepRunner {
    pub fn new(config: SemgrepConfig) -> Self {
        Self {
            program: "semgrep".into(),
            config,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Build the semgrep invocation scanning the current directory of
    /// `staging` and writing JSON to `output`.
    pub fn command(&self, language: Language, staging: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(staging)
            .args(["scan", "--verbose", "--json", "--no-git-ignore"])
            .arg("--output")
            .arg(output)
            .args(["-j", &self.config.jobs.to_string()])
            .arg(format!("--max-memory={}", self.config.max_memory_mb))
            .arg(format!("--max-target-bytes={}", self.config.max_target_bytes))
            .args(["--timeout-threshold", &self.config.timeout_threshold.to_string()])
            .args(["--timeout", &self.config.rule_timeout_secs.to_string()])
            .args(["--metrics", "off"])
            .args(["--include", &format!("*.{}", language.extension())]);
        for ruleset in rulesets_for(&self.config.rulesets, language) {
            cmd.args(["--config", &ruleset]);
        }
        cmd.arg(".");
        cmd
    }

    /// Run semgrep once over `staging`. A non-zero exit is an error for
    /// this batch.
    pub fn scan(&self, language: Language, staging: &Path, output: &Path) -> Result<Duration> {
        let start = Instant::now();
        tracing::info!(
            staging = %staging.display(),
            output = %output.display(),
            "running semgrep"
        );
        let status = self
            .command(language, staging, output)
            .status()
            .map_err(|e| AuditError::Tool {
                tool: "semgrep".into(),
                message: format!("failed to spawn {}: {}", self.program, e),
            })?;
        if !status.success() {
            return Err(AuditError::Tool {
                tool: "semgrep".into(),
                message: format!("exited with {}", status),
            });
        }
        Ok(start.elapsed())
    }

    /// Scan every `*.java` file under `input` in batches of `batch_size`.
    pub fn run_java(
        &self,
        input: &Path,
        output_dir: &Path,
        dataset: &str,
        batch_size: usize,
    ) -> Result<BatchRunSummary> {
        if batch_size == 0 {
            return Err(AuditError::Config("batch size must be positive".into()));
        }
        let start = Instant::now();
        let output_dir = prepare_output_dir(output_dir)?;
        let files = collect_files(input, Language::Java.extension());
        tracing::info!(files = files.len(), batch_size, "collected Java files");

        let mut summary = BatchRunSummary::default();
        for (i, chunk) in files.chunks(batch_size).enumerate() {
            let index = i + 1;
            let outcome = self.run_batch(Language::Java, index, &output_dir, dataset, |dir| {
                stage_files(chunk, dir)
            })?;
            summary.batches.push(outcome);
        }

        summary.total_time = start.elapsed();
        Ok(summary)
    }

    /// Split `code_field` of a JSONL dataset into `<prefix>_<n>.py` files
    /// (n = 1-based sample number) and scan them in batches.
    pub fn run_python(
        &self,
        dataset: &Path,
        code_field: &str,
        output_dir: &Path,
        prefix: &str,
    ) -> Result<BatchRunSummary> {
        let batch_size = self.config.files_per_batch;
        if batch_size == 0 {
            return Err(AuditError::Config("files_per_batch must be positive".into()));
        }
        let start = Instant::now();
        let output_dir = prepare_output_dir(output_dir)?;
        let reader = std::io::BufReader::new(std::fs::File::open(dataset)?);

        let mut summary = BatchRunSummary::default();
        let mut pending: Vec<(usize, String)> = Vec::with_capacity(batch_size.min(4096));
        let mut sample_no = 0usize;

        let mut lines = reader.lines().enumerate();
        loop {
            let next = lines.next();
            let exhausted = next.is_none();
            if let Some((idx, line)) = next {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                sample_no += 1;
                let code = match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(item) => item
                        .get(code_field)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    Err(e) => {
                        tracing::warn!(line = idx + 1, error = %e, "skipping malformed dataset line");
                        continue;
                    }
                };
                pending.push((sample_no, code));
                if pending.len() < batch_size {
                    continue;
                }
            }

            if !pending.is_empty() {
                let index = summary.batches.len() + 1;
                let batch = std::mem::take(&mut pending);
                let outcome =
                    self.run_batch(Language::Python, index, &output_dir, prefix, |dir| {
                        for (n, code) in &batch {
                            std::fs::write(dir.join(format!("{}_{}.py", prefix, n)), code)?;
                        }
                        Ok(batch.len())
                    })?;
                summary.batches.push(outcome);
            }

            if exhausted {
                break;
            }
        }

        summary.total_time = start.elapsed();
        Ok(summary)
    }

    /// Stage one batch with `stage`, scan it, and remove the staging dir.
    ///
    /// Staging failures are fatal (the disk is the problem, not the batch);
    /// scan failures are recorded in the outcome.
    fn run_batch<F>(
        &self,
        language: Language,
        index: usize,
        output_dir: &Path,
        dataset: &str,
        stage: F,
    ) -> Result<BatchOutcome>
    where
        F: FnOnce(&Path) -> Result<usize>,
    {
        let staging: TempDir = tempfile::Builder::new()
            .prefix("odcscan_batch_")
            .tempdir()?;
        let result_path = output_dir.join(batch_result_name(dataset, index));

        let stage_start = Instant::now();
        let files = stage(staging.path())?;
        let stage_time = stage_start.elapsed();

        let (scan_time, error) = match self.scan(language, staging.path(), &result_path) {
            Ok(elapsed) => {
                tracing::info!(
                    batch = index,
                    files,
                    secs = elapsed.as_secs_f64(),
                    "batch completed"
                );
                (Some(elapsed), None)
            }
            Err(e) => {
                tracing::error!(batch = index, error = %e, "error processing batch");
                (None, Some(e.to_string()))
            }
        };

        let cleanup_start = Instant::now();
        staging.close()?;
        let cleanup_time = cleanup_start.elapsed();

        Ok(BatchOutcome {
            index,
            files,
            result_path,
            stage_time,
            scan_time,
            cleanup_time,
            error,
        })
    }
}

/// Name of the JSON file holding batch `index` (1-based).
pub fn batch_result_name(dataset: &str, index: usize) -> String {
    format!("{}_semgrep_results_batch_{}.json", dataset, index)
}

/// Base name accepted by `semgrep-report` for the batches of `dataset`.
pub fn batch_result_base(dataset: &str) -> String {
    format!("{}_semgrep_results_batch", dataset)
}

/// Registry pack with the language-specific rules.
pub fn rule_pack(language: Language) -> &'static str {
    match language {
        Language::Java => "p/java",
        Language::Python => "p/python",
    }
}

/// Shared rule packs with the language pack inserted after `p/comment`
/// (or appended when `p/comment` is absent).
pub fn rulesets_for(shared: &[String], language: Language) -> Vec<String> {
    let mut rulesets = shared.to_vec();
    let pack = rule_pack(language).to_string();
    if !rulesets.contains(&pack) {
        let pos = rulesets
            .iter()
            .position(|r| r == "p/comment")
            .map(|p| p + 1)
            .unwrap_or(rulesets.len());
        rulesets.insert(pos, pack);
    }
    rulesets
}

/// Files under `root` with the given extension, sorted for stable batches.
pub fn collect_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|e| e == extension))
        .collect();
    files.sort();
    files
}

/// Copy `files` flat into `dir` and return how many were staged. A file
/// whose name is already taken in `dir` is skipped with a warning.
pub fn stage_files(files: &[PathBuf], dir: &Path) -> Result<usize> {
    let mut staged = 0;
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = dir.join(name);
        if target.exists() {
            tracing::warn!(
                file = %file.display(),
                "file name already staged in this batch, skipping"
            );
            continue;
        }
        std::fs::copy(file, &target)?;
        staged += 1;
    }
    Ok(staged)
}

fn prepare_output_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    // semgrep runs inside the staging dir, so the output path must be absolute.
    Ok(dir.canonicalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn language_pack_follows_comment_pack() {
        let rulesets = rulesets_for(&SemgrepConfig::default().rulesets, Language::Java);
        let comment = rulesets.iter().position(|r| r == "p/comment").unwrap();
        assert_eq!(rulesets[comment + 1], "p/java");
        assert_eq!(rulesets.len(), 14);
    }

    #[test]
    fn command_targets_staging_dir() {
        let runner = SemgrepRunner::new(SemgrepConfig::default());
        let cmd = runner.command(
            Language::Python,
            Path::new("/tmp/stage"),
            Path::new("/out/x.json"),
        );
        let args = args_of(&cmd);
        assert_eq!(args.first().map(String::as_str), Some("scan"));
        assert_eq!(args.last().map(String::as_str), Some("."));
        assert!(args.windows(2).any(|w| w[0] == "--include" && w[1] == "*.py"));
        assert!(args.windows(2).any(|w| w[0] == "--config" && w[1] == "p/python"));
        assert!(args.windows(2).any(|w| w[0] == "--output" && w[1] == "/out/x.json"));
        assert!(args.contains(&"--max-memory=30000".to_string()));
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp/stage")));
    }

    #[test]
    fn batch_names_match_report_base() {
        let name = batch_result_name("humaneval", 3);
        assert_eq!(name, "humaneval_semgrep_results_batch_3.json");
        assert!(name.starts_with(&batch_result_base("humaneval")));
    }

    #[cfg(unix)]
    fn stub(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-semgrep");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    const COUNTING_STUB: &str = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; shift; fi
  shift
done
echo "{\"files\": $(ls | wc -l)}" > "$out"
"#;

    #[cfg(unix)]
    #[test]
    fn java_files_are_scanned_in_batches() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("wrapped");
        std::fs::create_dir_all(input.join("nested")).unwrap();
        for name in ["A", "B", "C", "D"] {
            std::fs::write(input.join(format!("{name}.java")), "class X {}").unwrap();
        }
        std::fs::write(input.join("nested/E.java"), "class E {}").unwrap();
        std::fs::write(input.join("notes.txt"), "ignored").unwrap();

        let runner = SemgrepRunner::new(SemgrepConfig::default())
            .with_program(stub(work.path(), COUNTING_STUB));
        let out = work.path().join("batches");
        let summary = runner.run_java(&input, &out, "ds", 2).unwrap();

        assert_eq!(summary.batches.len(), 3);
        assert_eq!(summary.failed(), 0);
        assert_eq!(summary.files(), 5);
        let last = std::fs::read_to_string(out.join("ds_semgrep_results_batch_3.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&last).unwrap();
        assert_eq!(value["files"], 1);
    }

    #[test]
    fn staging_skips_colliding_names() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("wrapped");
        std::fs::create_dir_all(input.join("a")).unwrap();
        std::fs::create_dir_all(input.join("b")).unwrap();
        std::fs::write(input.join("a/Foo.java"), "class Foo { int a; }").unwrap();
        std::fs::write(input.join("b/Foo.java"), "class Foo { int b; }").unwrap();
        std::fs::write(input.join("b/Bar.java"), "class Bar {}").unwrap();

        let staging = work.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        let files = collect_files(&input, "java");
        assert_eq!(files.len(), 3);

        let staged = stage_files(&files, &staging).unwrap();
        assert_eq!(staged, 2);
        assert_eq!(
            std::fs::read_to_string(staging.join("Foo.java")).unwrap(),
            "class Foo { int a; }"
        );
        assert!(staging.join("Bar.java").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_batch_does_not_stop_the_run() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("wrapped");
        std::fs::create_dir_all(&input).unwrap();
        for name in ["A", "B", "C"] {
            std::fs::write(input.join(format!("{name}.java")), "class X {}").unwrap();
        }
        let runner = SemgrepRunner::new(SemgrepConfig::default())
            .with_program(stub(work.path(), "exit 2\n"));
        let summary = runner
            .run_java(&input, &work.path().join("out"), "ds", 1)
            .unwrap();
        assert_eq!(summary.batches.len(), 3);
        assert_eq!(summary.failed(), 3);
        assert!(summary.batches.iter().all(|b| b.scan_time.is_none()));
    }

    #[cfg(unix)]
    #[test]
    fn python_dataset_split_into_numbered_files() {
        let work = tempfile::tempdir().unwrap();
        let dataset = work.path().join("ds.jsonl");
        std::fs::write(
            &dataset,
            concat!(
                "{\"code\": \"print(1)\"}\n",
                "\n",
                "{\"code\": \"print(2)\"}\n",
                "{\"other\": 1}\n",
            ),
        )
        .unwrap();

        let listing_stub = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; shift; fi
  shift
done
ls | tr '\n' ' ' > "$out"
"#;
        let config = SemgrepConfig {
            files_per_batch: 2,
            ..SemgrepConfig::default()
        };
        let runner = SemgrepRunner::new(config).with_program(stub(work.path(), listing_stub));
        let out = work.path().join("out");
        let summary = runner.run_python(&dataset, "code", &out, "ds").unwrap();

        assert_eq!(summary.batches.len(), 2);
        let first = std::fs::read_to_string(out.join("ds_semgrep_results_batch_1.json")).unwrap();
        assert!(first.contains("ds_1.py"));
        assert!(first.contains("ds_2.py"));
        let second = std::fs::read_to_string(out.join("ds_semgrep_results_batch_2.json")).unwrap();
        assert!(second.contains("ds_3.py"));
    }
}
