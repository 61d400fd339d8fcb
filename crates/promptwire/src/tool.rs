#[cfg(test)]
use mockall::automock;

use crate::errors::{ConfigError, ConfigResult};
use crate::models::tool::ToolDefinition;

/// Source of the tool schemas written into the system block
#[cfg_attr(test, automock)]
pub trait ToolDefinitionProvider: Send + Sync {
    /// Definitions for the enabled tools, in the order given.
    ///
    /// An unknown name is a `ConfigError::UnknownTool`.
    fn definitions(&self, enabled: &[String]) -> ConfigResult<Vec<ToolDefinition>>;
}

/// A fixed set of tool definitions registered up front
#[derive(Debug, Clone, Default)]
pub struct StaticToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl StaticToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) -> ConfigResult<()> {
        if self.get(&tool.name).is_some() {
            return Err(ConfigError::DuplicateTool(tool.name));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> ConfigResult<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name.as_str())
    }
}

impl ToolDefinitionProvider for StaticToolRegistry {
    fn definitions(&self, enabled: &[String]) -> ConfigResult<Vec<ToolDefinition>> {
        enabled
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownTool(name.clone()))
            })
            .collect()
    }
}
