use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool the model may call, as described to it in the prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the arguments the tool accepts
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A canonical tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    pub id: String,
    /// Normalized tool name
    pub name: String,
    /// Raw JSON text of the arguments
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ToolRequest {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            display_name: None,
        }
    }

    pub fn with_display_name<S: Into<String>>(mut self, display_name: S) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Arguments decoded as JSON, falling back to an empty object when the text is not JSON
    pub fn arguments_value(&self) -> Value {
        serde_json::from_str(&self.arguments).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// The result of executing a tool, supplied by the caller to be inlined into the next prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub request_id: String,
    pub tool_name: String,
    /// Opaque result text, typically JSON
    pub result: String,
}

impl ToolResponse {
    pub fn new<I, N, R>(request_id: I, tool_name: N, result: R) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        R: Into<String>,
    {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            result: result.into(),
        }
    }
}
