//! Renders conversation state into the prompt text an architecture expects.
//!
//! A prompt is the beginning-of-text token, the system block, then every kept turn in order.
//! Families without a system role get the system block prepended to the first kept user input.
//! The last turn's assistant section is left open so generation continues inside it.
//!
//! When the prompt exceeds `max_tokens` the oldest turns are dropped one at a time. The system
//! block and the last turn are never dropped, so the result may still exceed a very small budget.

mod system;
mod turn;

use std::collections::HashSet;

use crate::architecture::Architecture;
use crate::errors::{ConfigError, ConfigResult};
use crate::labels::Labels;
use crate::models::message::{Action, BuildParameters, MessageData};
use crate::models::tool::{ToolDefinition, ToolResponse};
use crate::token_counter::TokenCounter;
use crate::tool::ToolDefinitionProvider;

pub use system::tool_signature;

pub struct PromptFormatter {
    tools: Box<dyn ToolDefinitionProvider>,
    counter: TokenCounter,
}

impl PromptFormatter {
    pub fn new(tools: impl ToolDefinitionProvider + 'static) -> Self {
        Self {
            tools: Box::new(tools),
            counter: TokenCounter::new(),
        }
    }

    pub fn with_token_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn token_counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn build(&self, params: &BuildParameters) -> ConfigResult<String> {
        let architecture = params.model.architecture;
        let labels = architecture.labels();
        let tools = self.resolve_tools(architecture, &params.action)?;
        let system = system::render_system_text(&params.context, &tools, labels)?;

        let turns = &params.context.turns;
        let budget = params.context.max_tokens;
        let mut start = 0;
        loop {
            let prompt = assemble(labels, &system, &turns[start..], &params.tool_responses);
            let tokens = self.counter.count_tokens(&prompt);
            if tokens <= budget || start + 1 >= turns.len() {
                if start > 0 {
                    tracing::debug!(
                        dropped = start,
                        kept = turns.len() - start,
                        tokens,
                        budget,
                        "dropped oldest turns"
                    );
                }
                if tokens > budget {
                    tracing::debug!(tokens, budget, "prompt still over budget");
                }
                return Ok(prompt);
            }
            start += 1;
        }
    }

    /// Definitions of the tools enabled for the action, checked against the architecture
    fn resolve_tools(
        &self,
        architecture: Architecture,
        action: &Action,
    ) -> ConfigResult<Vec<ToolDefinition>> {
        let enabled = action.enabled_tools();
        if matches!(action, Action::ImageGeneration { .. }) && enabled.is_empty() {
            return Err(ConfigError::InvalidAction(
                "image generation needs at least one enabled tool".to_string(),
            ));
        }
        if enabled.is_empty() {
            return Ok(Vec::new());
        }
        if !architecture.supports_tools() {
            return Err(ConfigError::ToolsUnsupported(architecture.to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = enabled.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ConfigError::DuplicateTool(duplicate.clone()));
        }
        self.tools.definitions(enabled)
    }
}

fn assemble(
    labels: &Labels,
    system: &str,
    turns: &[MessageData],
    responses: &[ToolResponse],
) -> String {
    let mut prompt = String::from(labels.begin_of_text);
    let mut folded = None;
    if !system.is_empty() {
        match &labels.system {
            Some(role) => {
                prompt.push_str(role.open);
                prompt.push_str(system);
                prompt.push_str(role.close);
            }
            None => folded = Some(system),
        }
    }

    if turns.is_empty() {
        if let Some(system) = folded {
            prompt.push_str(labels.user.open);
            prompt.push_str(system);
            prompt.push_str(labels.user.close);
        }
        prompt.push_str(labels.assistant.open);
        return prompt;
    }

    let last = turns.len() - 1;
    for (index, message) in turns.iter().enumerate() {
        let preamble = if index == 0 { folded } else { None };
        prompt.push_str(&turn::render_turn(
            message,
            labels,
            responses,
            preamble,
            index == last,
        ));
    }
    prompt
}
