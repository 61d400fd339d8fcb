use anyhow::{Context, Result};
use promptwire::architecture::ModelDescriptor;
use promptwire::engine::Engine;
use promptwire::models::message::BuildParameters;
use promptwire::models::tool::ToolDefinition;
use promptwire::tool::StaticToolRegistry;
use serde_json::Value;
use std::path::Path;

use super::{engine_token_counter, read_document};
use crate::configuration::EngineSettings;

/// Render the prompt described by `params_path` to stdout
pub fn execute(settings: &EngineSettings, params_path: &Path, tools_path: Option<&Path>) -> Result<()> {
    let prompt = render(settings, params_path, tools_path)?;
    print!("{}", prompt);
    Ok(())
}

pub fn render(settings: &EngineSettings, params_path: &Path, tools_path: Option<&Path>) -> Result<String> {
    let params = load_params(settings, params_path)?;

    let mut registry = StaticToolRegistry::new();
    if let Some(path) = tools_path {
        let tools: Vec<ToolDefinition> = read_document(path)?;
        for tool in tools {
            registry.register(tool)?;
        }
    }

    let engine = Engine::new(registry).with_token_counter(engine_token_counter(settings)?);
    let prompt = engine
        .build(&params)
        .with_context(|| format!("Failed to build prompt for {}", params.model.name))?;
    Ok(prompt)
}

/// Read build parameters, filling the token budget and model from settings when absent
fn load_params(settings: &EngineSettings, path: &Path) -> Result<BuildParameters> {
    let mut document: Value = read_document(path)?;
    let object = document
        .as_object_mut()
        .context("Build parameters must be an object")?;

    if let Some(context) = object.get_mut("context").and_then(Value::as_object_mut) {
        context
            .entry("maxTokens")
            .or_insert_with(|| Value::from(settings.max_tokens));
    }
    if !object.contains_key("model") {
        let model = ModelDescriptor::from_model_name(settings.require_model()?)?;
        object.insert("model".to_string(), serde_json::to_value(model)?);
    }

    serde_json::from_value(document).context("Invalid build parameters")
}
