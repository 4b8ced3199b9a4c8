//! Turn raw Java snippets into standalone compilable files.
//!
//! Datasets hold Java functions as free text: sometimes a whole class,
//! often a lone method. PMD and semgrep want one compilation unit per
//! file, so each snippet is normalized here:
//!
//! - the `package` line and `import` statements are lifted to the top,
//! - a snippet that is a public class with no top-level methods is kept
//!   and the file is named after the class (repeated names become
//!   `Foo_2`, `Foo_3`, … and are renamed inside the code as well),
//! - anything else is wrapped in `public class TempClass<idx>`.

pub mod rename;

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::Result;

static PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*package\s+[^\n;]+;\n?").unwrap());

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*import\s+[^\n;]+;\n?").unwrap());

static PUBLIC_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*public\s+class\s+\w+").unwrap());

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"public\s+(class|interface|enum)\s+(\w+)").unwrap());

// Method header: optional visibility, optional static, return type, name,
// parameter list, optional throws clause, opening brace.
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(public|protected|private)?\s+(static\s+)?[\w<>\[\]]+\s+\w+\s*\([^;]*\)\s*(throws\s+[\w, ]+)?\s*\{",
    )
    .unwrap()
});

/// Prefix of generated wrapper class names.
pub const TEMP_CLASS_PREFIX: &str = "TempClass";

/// One rewritten snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedSource {
    /// File name without `.java`.
    pub file_stem: String,
    pub content: String,
    pub wrapped: bool,
    pub renamed: bool,
}

/// Remove the first `package` declaration; returns it (trimmed) and the
/// remaining code.
pub fn split_package(code: &str) -> (String, String) {
    let package = PACKAGE_RE
        .find(code)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let cleaned = PACKAGE_RE.replace_all(code, "").trim().to_string();
    (package, cleaned)
}

/// Remove every `import` statement; returns them joined by newlines and
/// the remaining code.
pub fn split_imports(code: &str) -> (String, String) {
    let imports: Vec<&str> = IMPORT_RE.find_iter(code).map(|m| m.as_str().trim()).collect();
    let cleaned = IMPORT_RE.replace_all(code, "").trim().to_string();
    (imports.join("\n"), cleaned)
}

/// Whether `code` declares a method outside any braces.
pub fn has_orphan_methods(code: &str) -> bool {
    METHOD_RE
        .find_iter(code)
        .any(|m| brace_depth(&code[..m.start()]) <= 0)
}

/// Name of the first public class/interface/enum in `code`.
pub fn top_level_type_name(code: &str) -> Option<&str> {
    TYPE_NAME_RE
        .captures(code)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Indent `code` by four spaces inside `public class <name> { … }`.
pub fn wrap_in_class(code: &str, class_name: &str) -> String {
    let body: Vec<String> = code.lines().map(|line| format!("    {}", line)).collect();
    format!("public class {} {{\n{}\n}}", class_name, body.join("\n"))
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn brace_depth(prefix: &str) -> i64 {
    prefix.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

fn join_sections(sections: &[&str]) -> String {
    sections
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Hands out run-unique class names: `Foo`, `Foo_2`, `Foo_3`, …
#[derive(Debug, Default)]
pub struct ClassNameRegistry {
    seen: HashMap<String, usize>,
}

impl ClassNameRegistry {
    pub fn claim(&mut self, name: &str) -> String {
        let count = self.seen.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            name.to_string()
        } else {
            format!("{}_{}", name, count)
        }
    }
}

/// Stateful wrapper: class-name collisions are tracked across calls.
#[derive(Debug, Default)]
pub struct JavaWrapper {
    names: ClassNameRegistry,
}

impl JavaWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite one snippet; `idx` is its 0-based dataset line.
    pub fn wrap(&mut self, code: &str, idx: usize) -> Result<WrappedSource> {
        let (package, without_package) = split_package(code);
        let (imports, cleaned) = split_imports(&without_package);

        let should_wrap = has_orphan_methods(&cleaned) || !PUBLIC_CLASS_RE.is_match(&cleaned);

        if !should_wrap {
            if let Some(class_name) = top_level_type_name(&cleaned) {
                let final_name = self.names.claim(class_name);
                let renamed = final_name != class_name;
                let body = if renamed {
                    rename::rename_class(&cleaned, class_name, &final_name)?
                } else {
                    cleaned.clone()
                };
                return Ok(WrappedSource {
                    file_stem: sanitize_file_stem(&final_name),
                    content: join_sections(&[&package, &imports, &body]),
                    wrapped: false,
                    renamed,
                });
            }
        }

        let class_name = format!("{}{}", TEMP_CLASS_PREFIX, idx);
        let body = wrap_in_class(&cleaned, &class_name);
        Ok(WrappedSource {
            file_stem: class_name,
            content: join_sections(&[&package, &imports, &body]),
            wrapped: true,
            renamed: false,
        })
    }
}

/// Counters for one `wrap-java` pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WrapStats {
    pub lines_read: usize,
    pub written: usize,
    pub wrapped: usize,
    pub renamed: usize,
    pub empty_skipped: usize,
    pub malformed_lines: usize,
    pub failed: usize,
    /// `.java` files present in the output directory afterwards.
    pub files_in_output: usize,
}

/// Wrap `code_field` of every JSONL line in `input`, writing one `.java`
/// file per sample into `output_dir`.
pub fn wrap_dataset(input: &Path, output_dir: &Path, code_field: &str) -> Result<WrapStats> {
    std::fs::create_dir_all(output_dir)?;
    let reader = std::io::BufReader::new(std::fs::File::open(input)?);
    let mut wrapper = JavaWrapper::new();
    let mut stats = WrapStats::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        stats.lines_read += 1;

        let entry: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                stats.malformed_lines += 1;
                tracing::warn!(line = idx, error = %e, "skipping malformed JSON line");
                continue;
            }
        };

        let code = match entry.get(code_field).and_then(|v| v.as_str()) {
            Some(code) if !code.is_empty() => code,
            _ => {
                stats.empty_skipped += 1;
                continue;
            }
        };

        let written = wrapper.wrap(code, idx).and_then(|source| {
            let path = output_dir.join(format!("{}.java", source.file_stem));
            std::fs::write(&path, &source.content)?;
            Ok(source)
        });
        match written {
            Ok(source) => {
                stats.written += 1;
                stats.wrapped += usize::from(source.wrapped);
                stats.renamed += usize::from(source.renamed);
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(line = idx, error = %e, "error processing line");
            }
        }
    }

    stats.files_in_output = std::fs::read_dir(output_dir)?
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "java"))
        .count();
    Ok(stats)
}
