use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use odcscan::aggregate::{pmd, pylint};
use odcscan::complexity;
use odcscan::config::Config;
use odcscan::error::AuditError;
use odcscan::java;
use odcscan::odc::OdcMapping;
use odcscan::output::{self, OutputFormat, Report};
use odcscan::runner::pylint::PylintRunner;
use odcscan::runner::semgrep::{batch_result_base, SemgrepRunner};
use odcscan::semgrep::{self as semgrep_results, summary};
use odcscan::Language;

#[derive(Parser)]
#[command(
    name = "odcscan",
    about = "Static-analysis batch utilities with ODC and CWE reporting",
    version,
    author
)]
struct Cli {
    /// Config file path
    #[arg(long, short = 'c', global = true, default_value = odcscan::CONFIG_FILE)]
    config: PathBuf,

    /// Output format (console, json)
    #[arg(long, short = 'f', global = true, default_value = "console")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate PMD JSON reports (report_*.json) into ODC statistics
    PmdReport {
        /// Directory holding the PMD reports
        #[arg(default_value = ".")]
        reports: PathBuf,

        /// Rule to ODC mapping (spreadsheet or TOML)
        #[arg(long, short = 'm')]
        mapping: PathBuf,

        /// Number of samples in the analyzed dataset
        #[arg(long)]
        samples: Option<usize>,
    },

    /// Aggregate ODC-annotated pylint output (JSONL) into statistics
    PylintReport {
        /// JSONL file written by `pylint-run`
        input: PathBuf,
    },

    /// Run pylint on every sample of a JSONL dataset and annotate with ODC
    PylintRun {
        /// Input dataset (JSONL)
        input: PathBuf,

        /// Output file (JSONL)
        output: PathBuf,

        /// Field holding the code to lint
        #[arg(long)]
        field: String,

        /// Symbol to ODC mapping (spreadsheet or TOML)
        #[arg(long, short = 'm')]
        mapping: PathBuf,

        /// pylint executable
        #[arg(long, default_value = "pylint")]
        pylint: String,
    },

    /// Turn Java snippets of a JSONL dataset into compilable .java files
    WrapJava {
        /// Input dataset (JSONL)
        input: PathBuf,

        /// Field holding the Java code
        #[arg(long)]
        field: String,

        /// Directory for the generated files
        #[arg(long, short = 'o', default_value = "wrapped")]
        output_dir: PathBuf,
    },

    /// Scan a directory of .java files with semgrep, in batches
    SemgrepJava {
        /// Dataset name used in the batch result file names
        dataset: String,

        /// Files per batch
        batch_size: usize,

        /// Directory holding the .java files
        #[arg(long, default_value = "wrapped")]
        input: PathBuf,

        /// Directory for the batch results
        #[arg(long, short = 'o', default_value = "semgrep_batches")]
        output_dir: PathBuf,

        /// semgrep executable
        #[arg(long, default_value = "semgrep")]
        semgrep: String,
    },

    /// Scan the Python samples of a JSONL dataset with semgrep, in batches
    SemgrepPython {
        /// Input dataset (JSONL)
        input: PathBuf,

        /// Field holding the Python code
        #[arg(long)]
        field: String,

        /// Directory for the batch results
        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,

        /// Sample file prefix (defaults to the dataset file stem)
        #[arg(long)]
        prefix: Option<String>,

        /// semgrep executable
        #[arg(long, default_value = "semgrep")]
        semgrep: String,
    },

    /// Merge semgrep batch results and report CWE statistics
    SemgrepReport {
        /// Base name of the batch files (<base>_<n>.json)
        base: String,

        /// Highest batch number to read
        max_batch: usize,
    },

    /// Per-function complexity and token statistics of a JSONL dataset
    Complexity {
        /// Input dataset (JSONL)
        input: PathBuf,

        /// Language of the code (java, python)
        #[arg(long, short = 'l', default_value = "java")]
        language: String,

        /// Code field to profile (repeatable; defaults to the config list)
        #[arg(long = "field")]
        fields: Vec<String>,
    },

    /// Generate a starter .odcscan.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = OutputFormat::from_str_lenient(&cli.format).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", cli.format);
        OutputFormat::Console
    });

    let result = match cli.command {
        Commands::Init { force } => cmd_init(force),
        command => Config::load(&cli.config).and_then(|config| run(command, &config, format)),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(command: Commands, config: &Config, format: OutputFormat) -> Result<i32, AuditError> {
    match command {
        Commands::PmdReport {
            reports,
            mapping,
            samples,
        } => {
            let mapping = OdcMapping::load(&mapping, &config.pmd.mapping_key_column)?;
            let summary = pmd::aggregate_dir(&reports, &mapping, &config.pmd.policy())?;
            emit(
                &Report::Pmd {
                    summary: &summary,
                    dataset_size: samples,
                },
                format,
            )
        }
        Commands::PylintReport { input } => {
            let summary =
                pylint::aggregate_file(&input, &config.pylint.id_field, &config.pylint.policy())?;
            emit(&Report::Pylint(&summary), format)
        }
        Commands::PylintRun {
            input,
            output,
            field,
            mapping,
            pylint,
        } => {
            let mapping = OdcMapping::load(&mapping, &config.pylint.mapping_key_column)?;
            let runner = PylintRunner::new(&mapping, &config.pylint).with_program(pylint);
            let stats = runner.run_dataset(&input, &output, &field, &config.pylint.id_field)?;
            emit(
                &Report::PylintRun {
                    stats: &stats,
                    output: &output,
                },
                format,
            )
        }
        Commands::WrapJava {
            input,
            field,
            output_dir,
        } => {
            let stats = java::wrap_dataset(&input, &output_dir, &field)?;
            emit(
                &Report::WrapJava {
                    stats: &stats,
                    output_dir: &output_dir,
                },
                format,
            )
        }
        Commands::SemgrepJava {
            dataset,
            batch_size,
            input,
            output_dir,
            semgrep,
        } => {
            let runner = SemgrepRunner::new(config.semgrep.clone()).with_program(semgrep);
            let summary = runner.run_java(&input, &output_dir, &dataset, batch_size)?;
            log_result_base(&output_dir, &dataset);
            emit(&Report::SemgrepBatches(&summary), format)
        }
        Commands::SemgrepPython {
            input,
            field,
            output_dir,
            prefix,
            semgrep,
        } => {
            let prefix = match prefix {
                Some(prefix) => prefix,
                None => dataset_stem(&input)?,
            };
            let runner = SemgrepRunner::new(config.semgrep.clone()).with_program(semgrep);
            let summary = runner.run_python(&input, &field, &output_dir, &prefix)?;
            log_result_base(&output_dir, &prefix);
            emit(&Report::SemgrepBatches(&summary), format)
        }
        Commands::SemgrepReport { base, max_batch } => {
            let merged = semgrep_results::load_batches(&base, max_batch)?;
            let report = summary::analyze(&merged);
            emit(&Report::Security(&report), format)
        }
        Commands::Complexity {
            input,
            language,
            fields,
        } => {
            let language: Language = language.parse()?;
            let analyzer = complexity::analyzer_for_language(language).ok_or_else(|| {
                AuditError::Config(format!("odcscan was built without {} support", language))
            })?;
            let fields = if fields.is_empty() {
                config.complexity.fields.clone()
            } else {
                fields
            };
            let report = complexity::profile_dataset(&input, &fields, analyzer.as_ref())?;
            emit(&Report::Complexity(&report), format)
        }
        Commands::Init { force } => cmd_init(force),
    }
}

fn emit(report: &Report<'_>, format: OutputFormat) -> Result<i32, AuditError> {
    let rendered = output::render(report, format)?;
    print!("{}", rendered);
    if format == OutputFormat::Json {
        println!();
    }
    Ok(0)
}

fn dataset_stem(input: &Path) -> Result<String, AuditError> {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| AuditError::Config(format!("cannot derive a prefix from {}", input.display())))
}

fn log_result_base(output_dir: &Path, dataset: &str) {
    tracing::info!(
        base = %output_dir.join(batch_result_base(dataset)).display(),
        "batch results written; pass this base to `odcscan semgrep-report`"
    );
}

fn cmd_init(force: bool) -> Result<i32, AuditError> {
    let path = PathBuf::from(odcscan::CONFIG_FILE);

    if path.exists() && !force {
        eprintln!("{} already exists. Use --force to overwrite.", odcscan::CONFIG_FILE);
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {}", odcscan::CONFIG_FILE);

    Ok(0)
}
