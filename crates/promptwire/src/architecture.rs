use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::{ConfigError, ConfigResult};
use crate::labels::{self, Labels};

/// A model family's prompt grammar and tool-call micro-syntax
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Architecture {
    /// Qwen / Hermes style `<|im_start|>` turns with `<tool_call>` tags
    ChatMl,
    /// Llama 3.x header tokens with a `tool_calls` payload after `<|python_tag|>`
    Llama3,
    /// Gemma turns; no system role and no native tool syntax
    Gemma,
    /// Phi-3 role blocks; no native tool syntax
    Phi3,
}

impl Architecture {
    pub fn labels(&self) -> &'static Labels {
        match self {
            Architecture::ChatMl => &labels::CHATML,
            Architecture::Llama3 => &labels::LLAMA3,
            Architecture::Gemma => &labels::GEMMA,
            Architecture::Phi3 => &labels::PHI3,
        }
    }

    pub fn supports_tools(&self) -> bool {
        self.labels().tool.is_some()
    }

    /// Resolve an architecture from its own name, e.g. "chatml" or "llama3"
    pub fn from_name(name: &str) -> ConfigResult<Self> {
        Architecture::from_str(name.trim())
            .map_err(|_| ConfigError::UnknownArchitecture(name.to_string()))
    }

    /// Infer the architecture from a model name such as "qwen2.5-7b-instruct"
    pub fn for_model(model_name: &str) -> ConfigResult<Self> {
        let model_name = model_name.to_lowercase();
        let Some((_, architecture)) = MODEL_FAMILIES
            .iter()
            .find(|(pattern, _)| pattern.is_match(&model_name))
        else {
            return Architecture::from_name(&model_name);
        };
        tracing::debug!(model = %model_name, %architecture, "resolved architecture");
        Ok(*architecture)
    }
}

lazy_static! {
    // first match wins
    static ref MODEL_FAMILIES: Vec<(Regex, Architecture)> = vec![
        (Regex::new(r"qwen|hermes").unwrap(), Architecture::ChatMl),
        (Regex::new(r"llama").unwrap(), Architecture::Llama3),
        (Regex::new(r"gemma").unwrap(), Architecture::Gemma),
        (Regex::new(r"(^|[^a-z])phi").unwrap(), Architecture::Phi3),
    ];
}

/// The target model of a build or process call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub architecture: Architecture,
}

impl ModelDescriptor {
    pub fn new<S: Into<String>>(name: S, architecture: Architecture) -> Self {
        Self {
            name: name.into(),
            architecture,
        }
    }

    /// Build a descriptor from a model name, inferring its architecture
    pub fn from_model_name<S: Into<String>>(name: S) -> ConfigResult<Self> {
        let name = name.into();
        let architecture = Architecture::for_model(&name)?;
        Ok(Self { name, architecture })
    }
}
