use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Source language of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
}

impl Language {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "py",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "java" => Some(Self::Java),
            "py" => Some(Self::Python),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Java => write!(f, "java"),
            Self::Python => write!(f, "python"),
        }
    }
}

impl FromStr for Language {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "java" => Ok(Self::Java),
            "python" | "py" => Ok(Self::Python),
            other => Err(AuditError::Config(format!(
                "unsupported language '{}' (expected java or python)",
                other
            ))),
        }
    }
}
