use std::path::Path;
use tokenizers::tokenizer::Tokenizer;

use crate::errors::{ConfigError, ConfigResult};

/// Counts prompt tokens for the truncation budget.
///
/// Uses a HuggingFace tokenizer when one is loaded, otherwise estimates one token per four
/// characters.
#[derive(Clone, Default)]
pub struct TokenCounter {
    tokenizer: Option<Tokenizer>,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `tokenizer.json`
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ConfigError::Tokenizer(format!("Failed to load {}: {}", path.display(), e))
        })?;
        Ok(Self {
            tokenizer: Some(tokenizer),
        })
    }

    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> ConfigResult<Self> {
        let tokenizer =
            Tokenizer::from_bytes(bytes).map_err(|e| ConfigError::Tokenizer(e.to_string()))?;
        Ok(Self {
            tokenizer: Some(tokenizer),
        })
    }

    /// True when counts come from a real tokenizer rather than the estimate
    pub fn is_exact(&self) -> bool {
        self.tokenizer.is_some()
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        let Some(tokenizer) = &self.tokenizer else {
            return estimate_tokens(text);
        };
        match tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer failed, using the character estimate");
                estimate_tokens(text)
            }
        }
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.is_exact())
            .finish()
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
