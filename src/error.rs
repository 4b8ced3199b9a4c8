use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("ODC mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error ({tool}): {message}")]
    Tool { tool: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuditError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}
