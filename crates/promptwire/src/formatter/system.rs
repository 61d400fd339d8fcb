use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{ConfigError, ConfigResult};
use crate::labels::Labels;
use crate::models::message::ContextConfiguration;
use crate::models::tool::ToolDefinition;
use crate::prompt_template::load_embedded_prompt;

#[derive(Serialize)]
struct SystemContext<'a> {
    instruction: &'a str,
    knowledge_cutoff: Option<&'a str>,
    current_date: Option<String>,
    reasoning: Option<String>,
}

#[derive(Serialize)]
struct ToolsContext {
    tools: Vec<ToolSignature>,
}

#[derive(Serialize)]
struct ToolSignature {
    signature: String,
}

/// Text of the system block: the instruction, its date and reasoning lines, then the tool block
pub(crate) fn render_system_text(
    context: &ContextConfiguration,
    tools: &[ToolDefinition],
    labels: &Labels,
) -> ConfigResult<String> {
    let date = context.date.as_ref();
    let system = SystemContext {
        instruction: context.system_instruction.trim(),
        knowledge_cutoff: date.and_then(|date| date.knowledge_cutoff.as_deref()),
        current_date: date.map(|date| {
            date.current_date
                .unwrap_or_else(|| Utc::now().date_naive())
                .format("%Y-%m-%d")
                .to_string()
        }),
        reasoning: context.reasoning.map(|effort| effort.to_string()),
    };
    let mut blocks = vec![render("system.md", &system)?];

    if !tools.is_empty() {
        let syntax = labels
            .tool
            .as_ref()
            .ok_or_else(|| ConfigError::Template("no tool syntax to describe tools with".into()))?;
        let tools = ToolsContext {
            tools: tools
                .iter()
                .map(|tool| ToolSignature {
                    signature: tool_signature(tool),
                })
                .collect(),
        };
        blocks.push(render(syntax.definitions_template, &tools)?);
    }

    blocks.retain(|block| !block.is_empty());
    Ok(blocks.join("\n\n"))
}

fn render<T: Serialize>(name: &str, context: &T) -> ConfigResult<String> {
    load_embedded_prompt(name, context)
        .map(|rendered| rendered.trim().to_string())
        .map_err(|e| ConfigError::Template(format!("{}: {}", name, e)))
}

/// One line of JSON describing a tool, in the OpenAI function layout
pub fn tool_signature(tool: &ToolDefinition) -> String {
    format!(
        r#"{{"type": "function", "function": {{"name": {}, "description": {}, "parameters": {}}}}}"#,
        Value::String(tool.name.clone()),
        Value::String(tool.description.clone()),
        tool.parameters
    )
}
