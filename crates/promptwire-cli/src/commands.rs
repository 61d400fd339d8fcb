pub mod architectures;
pub mod build;
pub mod process;
pub mod version;

use anyhow::{Context, Result};
use promptwire::token_counter::TokenCounter;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::configuration::EngineSettings;

/// Read a JSON or YAML document, picking the format from the file extension
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&contents).with_context(|| format!("Invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

pub fn engine_token_counter(settings: &EngineSettings) -> Result<TokenCounter> {
    match &settings.tokenizer {
        Some(path) => TokenCounter::from_file(path)
            .with_context(|| format!("Failed to load tokenizer {}", path.display())),
        None => Ok(TokenCounter::new()),
    }
}
