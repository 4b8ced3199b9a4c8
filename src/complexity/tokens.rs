use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::error::{AuditError, Result};

/// The `cl100k_base` encoding used by GPT-4, loaded on first use.
static BPE: Lazy<std::result::Result<CoreBPE, String>> =
    Lazy::new(|| tiktoken_rs::cl100k_base().map_err(|e| e.to_string()));

pub struct Tokenizer;

impl Tokenizer {
    /// Load the encoding, failing if it is unusable.
    pub fn load() -> Result<&'static CoreBPE> {
        BPE.as_ref().map_err(|e| {
            AuditError::Internal(format!("failed to load cl100k_base tokenizer: {}", e))
        })
    }

    /// Token ids of `text`, special tokens treated as plain text.
    pub fn encode(text: &str) -> Result<Vec<usize>> {
        Ok(Self::load()?.encode_ordinary(text))
    }

    pub fn count(text: &str) -> Result<usize> {
        Ok(Self::encode(text)?.len())
    }
}
