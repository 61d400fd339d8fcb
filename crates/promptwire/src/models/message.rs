use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::channel::Channel;
use super::tool::{ToolRequest, ToolResponse};
use crate::architecture::ModelDescriptor;
use crate::objectid::create_object_id;

/// One conversational turn: the user's input and the assistant's reply to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub id: String,
    pub created: DateTime<Utc>,
    pub user_input: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Tool calls made during this turn, in call order
    #[serde(default)]
    pub tool_calls: Vec<ToolRequest>,
}

impl MessageData {
    /// Create a new turn with the current timestamp
    pub fn new<S: Into<String>>(user_input: S) -> Self {
        MessageData {
            id: create_object_id("msg"),
            created: Utc::now(),
            user_input: user_input.into(),
            channels: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    /// Add an assistant channel to the turn
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Record a tool call made during the turn
    pub fn with_tool_call(mut self, request: ToolRequest) -> Self {
        self.tool_calls.push(request);
        self
    }

    pub fn has_reply(&self) -> bool {
        !self.channels.is_empty() || !self.tool_calls.is_empty()
    }

    /// Every tool request of the turn, whether recorded as a tool channel or only as a call
    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolRequest> {
        self.channels
            .iter()
            .filter_map(|channel| channel.tool_request.as_ref())
            .chain(self.tool_calls.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// Date details added to the system instruction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateInjection {
    /// Date to present as today; the current UTC date when unset
    #[serde(default)]
    pub current_date: Option<NaiveDate>,
    #[serde(default)]
    pub knowledge_cutoff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfiguration {
    pub system_instruction: String,
    /// Turns in chronological order; the last one is the turn being answered
    #[serde(default)]
    pub turns: Vec<MessageData>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub reasoning: Option<ReasoningEffort>,
    #[serde(default)]
    pub date: Option<DateInjection>,
}

impl ContextConfiguration {
    pub const DEFAULT_MAX_TOKENS: usize = 8192;

    pub fn new<S: Into<String>>(system_instruction: S) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            turns: Vec::new(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            reasoning: None,
            date: None,
        }
    }

    pub fn with_turn(mut self, turn: MessageData) -> Self {
        self.turns.push(turn);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningEffort) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn with_date(mut self, date: DateInjection) -> Self {
        self.date = Some(date);
        self
    }
}

fn default_max_tokens() -> usize {
    ContextConfiguration::DEFAULT_MAX_TOKENS
}

/// What the prompt is being built for, with the tools enabled for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
    TextGeneration {
        #[serde(default)]
        tools: Vec<String>,
    },
    ImageGeneration {
        #[serde(default)]
        tools: Vec<String>,
    },
}

impl Action {
    pub fn text() -> Self {
        Action::TextGeneration { tools: Vec::new() }
    }

    pub fn enabled_tools(&self) -> &[String] {
        match self {
            Action::TextGeneration { tools } | Action::ImageGeneration { tools } => tools,
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::text()
    }
}

/// Everything needed to render one prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildParameters {
    #[serde(default)]
    pub action: Action,
    pub context: ContextConfiguration,
    /// Tool results to inline after the matching tool calls
    #[serde(default)]
    pub tool_responses: Vec<ToolResponse>,
    pub model: ModelDescriptor,
}

impl BuildParameters {
    pub fn new(context: ContextConfiguration, model: ModelDescriptor) -> Self {
        Self {
            action: Action::default(),
            context,
            tool_responses: Vec::new(),
            model,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_tool_response(mut self, response: ToolResponse) -> Self {
        self.tool_responses.push(response);
        self
    }
}
