use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::odc::ExclusionPolicy;

/// Top-level configuration from `.odcscan.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pmd: PmdConfig,
    #[serde(default)]
    pub pylint: PylintConfig,
    #[serde(default)]
    pub semgrep: SemgrepConfig,
    #[serde(default)]
    pub complexity: ComplexityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmdConfig {
    /// PMD rules that never count as defects.
    #[serde(default = "default_pmd_excluded")]
    pub excluded_rules: Vec<String>,
    /// Header of the rule column in the mapping spreadsheet.
    #[serde(default = "default_pmd_key_column")]
    pub mapping_key_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylintConfig {
    /// Pylint symbols that never count as defects.
    #[serde(default = "default_pylint_excluded")]
    pub excluded_symbols: Vec<String>,
    /// Header of the symbol column in the mapping spreadsheet.
    #[serde(default = "default_pylint_key_column")]
    pub mapping_key_column: String,
    /// Value passed to `pylint -j`.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Wall-clock limit for one pylint invocation.
    #[serde(default = "default_pylint_timeout")]
    pub timeout_secs: u64,
    /// Dataset field identifying a sample.
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemgrepConfig {
    /// Value passed to `semgrep -j`.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Registry rule packs shared by every language.
    #[serde(default = "default_rulesets")]
    pub rulesets: Vec<String>,
    #[serde(default = "default_max_memory")]
    pub max_memory_mb: u64,
    #[serde(default = "default_max_target_bytes")]
    pub max_target_bytes: u64,
    #[serde(default = "default_timeout_threshold")]
    pub timeout_threshold: u32,
    /// Per-rule per-file timeout handed to semgrep, in seconds.
    #[serde(default = "default_rule_timeout")]
    pub rule_timeout_secs: u64,
    /// Files staged per batch by the Python runner.
    #[serde(default = "default_files_per_batch")]
    pub files_per_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityConfig {
    /// Dataset fields holding code to profile.
    #[serde(default = "default_code_fields")]
    pub fields: Vec<String>,
}

fn default_pmd_excluded() -> Vec<String> {
    [
        "AvoidDuplicateLiterals",
        "UseLocaleWithCaseConversions",
        "AbstractClassWithoutAbstractMethod",
        "AccessorClassGeneration",
        "AbstractClassWithoutAnyMethod",
        "ClassWithOnlyPrivateConstructorsShouldBeFinal",
        "DataClass",
        "GodClass",
        "CloneMethodReturnTypeMustMatchClassName",
        "MethodWithSameNameAsEnclosingClass",
        "MissingStaticMethodInNonInstantiatableClass",
        "UseUtilityClass",
        "LawOfDemeter",
        "UnusedPrivateMethod",
        "AvoidLiteralsInIfCondition",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_pylint_excluded() -> Vec<String> {
    [
        "bad-indentation",
        "missing-module-docstring",
        "missing-function-docstring",
        "missing-final-newline",
        "bad-docstring-quotes",
        "consider-using-f-string",
        "undefined-variable",
        "import-error",
        "invalid-name",
        "redundant-u-string-prefix",
        "multiple-statements",
        "pointless-string-statement",
        "unnecessary-comprehension",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_pmd_key_column() -> String {
    "PMD Rule".into()
}

fn default_pylint_key_column() -> String {
    "Pylint Symbol".into()
}

fn default_jobs() -> usize {
    21
}

fn default_pylint_timeout() -> u64 {
    10
}

fn default_id_field() -> String {
    "hm_index".into()
}

fn default_rulesets() -> Vec<String> {
    [
        "p/trailofbits",
        "p/default",
        "p/comment",
        "p/cwe-top-25",
        "p/owasp-top-ten",
        "p/r2c-security-audit",
        "p/insecure-transport",
        "p/secrets",
        "p/findsecbugs",
        "p/gitlab",
        "p/mobsfscan",
        "p/command-injection",
        "p/sql-injection",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_memory() -> u64 {
    30_000
}

fn default_max_target_bytes() -> u64 {
    1_000_000
}

fn default_timeout_threshold() -> u32 {
    10
}

fn default_rule_timeout() -> u64 {
    60
}

fn default_files_per_batch() -> usize {
    20_000
}

fn default_code_fields() -> Vec<String> {
    ["human_code", "chatgpt_code", "dsc_code", "qwen_code"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for PmdConfig {
    fn default() -> Self {
        Self {
            excluded_rules: default_pmd_excluded(),
            mapping_key_column: default_pmd_key_column(),
        }
    }
}

impl Default for PylintConfig {
    fn default() -> Self {
        Self {
            excluded_symbols: default_pylint_excluded(),
            mapping_key_column: default_pylint_key_column(),
            jobs: default_jobs(),
            timeout_secs: default_pylint_timeout(),
            id_field: default_id_field(),
        }
    }
}

impl Default for SemgrepConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            rulesets: default_rulesets(),
            max_memory_mb: default_max_memory(),
            max_target_bytes: default_max_target_bytes(),
            timeout_threshold: default_timeout_threshold(),
            rule_timeout_secs: default_rule_timeout(),
            files_per_batch: default_files_per_batch(),
        }
    }
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            fields: default_code_fields(),
        }
    }
}

impl PmdConfig {
    pub fn policy(&self) -> ExclusionPolicy {
        ExclusionPolicy::new(self.excluded_rules.iter().cloned())
    }
}

impl PylintConfig {
    pub fn policy(&self) -> ExclusionPolicy {
        ExclusionPolicy::new(self.excluded_symbols.iter().cloned())
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# odcscan configuration

[pmd]
# Header of the rule column in the PMD mapping spreadsheet.
mapping_key_column = "PMD Rule"
# Rules that never count as defects (replaces the built-in list).
# excluded_rules = ["GodClass", "DataClass"]

[pylint]
mapping_key_column = "Pylint Symbol"
jobs = 21
timeout_secs = 10
id_field = "hm_index"
# excluded_symbols = ["invalid-name", "import-error"]

[semgrep]
jobs = 21
max_memory_mb = 30000
max_target_bytes = 1000000
timeout_threshold = 10
rule_timeout_secs = 60
files_per_batch = 20000

[complexity]
fields = ["human_code", "chatgpt_code", "dsc_code", "qwen_code"]
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/.odcscan.toml")).unwrap();
        assert_eq!(config.pylint.timeout_secs, 10);
        assert!(config.pmd.policy().is_excluded("GodClass"));
        assert_eq!(config.semgrep.files_per_batch, 20_000);
    }

    #[test]
    fn starter_config_parses() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        assert_eq!(config.pylint.id_field, "hm_index");
        assert_eq!(config.complexity.fields.len(), 4);
        assert!(config.pylint.policy().is_excluded("pointless-string-statement"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[pmd]\nexcluded_rules = [\"ShortVariable\"]\n").unwrap();
        let policy = config.pmd.policy();
        assert!(policy.is_excluded("ShortVariable"));
        assert!(!policy.is_excluded("GodClass"));
        assert_eq!(config.pmd.mapping_key_column, "PMD Rule");
    }
}
