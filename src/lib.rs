//! odcscan: static-analysis batch utilities for code corpora.
//!
//! Runs or post-processes PMD, pylint and semgrep over datasets of code
//! samples and summarizes the findings in terms of the Orthogonal Defect
//! Classification (ODC) and CWE. Also profiles per-function complexity
//! and token counts.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use odcscan::aggregate::pylint;
//! use odcscan::config::Config;
//!
//! let config = Config::load(Path::new(".odcscan.toml")).unwrap();
//! let summary = pylint::aggregate_file(
//!     Path::new("pylint_output.jsonl"),
//!     &config.pylint.id_field,
//!     &config.pylint.policy(),
//! )
//! .unwrap();
//! println!("defects: {}", summary.tally.total_defects);
//! ```

pub mod aggregate;
pub mod complexity;
pub mod config;
pub mod error;
pub mod java;
pub mod language;
pub mod odc;
pub mod output;
pub mod runner;
pub mod semgrep;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".odcscan.toml";

pub use error::{AuditError, Result};
pub use language::Language;
