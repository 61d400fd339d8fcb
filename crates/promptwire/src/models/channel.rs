use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::tool::ToolRequest;

/// Recipient used for channels addressed to the person reading the conversation
pub const USER_RECIPIENT: &str = "user";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelType {
    /// Private reasoning
    Analysis,
    /// Remarks made while working, usually a preamble to a tool call
    Commentary,
    /// A tool invocation
    Tool,
    /// The answer shown to the user
    Final,
}

/// One ordered, typed segment of an assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub content: String,
    /// Position within the owning turn, strictly increasing in emission order
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_tool_id: Option<String>,
    pub is_complete: bool,
    pub updated_at: DateTime<Utc>,
    /// Present on tool channels only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_request: Option<ToolRequest>,
}

impl Channel {
    pub fn new<I, S>(id: I, channel_type: ChannelType, content: S, order: u32) -> Self
    where
        I: Into<String>,
        S: Into<String>,
    {
        Channel {
            id: id.into(),
            channel_type,
            content: content.into(),
            order,
            recipient: None,
            associated_tool_id: None,
            is_complete: true,
            updated_at: Utc::now(),
            tool_request: None,
        }
    }

    /// Create a tool channel; the content is the request's argument text
    pub fn tool<I: Into<String>>(id: I, request: ToolRequest, order: u32) -> Self {
        let mut channel = Channel::new(id, ChannelType::Tool, request.arguments.clone(), order);
        channel.recipient = Some(request.name.clone());
        channel.tool_request = Some(request);
        channel
    }

    pub fn with_recipient<S: Into<String>>(mut self, recipient: S) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_associated_tool<S: Into<String>>(mut self, tool_id: S) -> Self {
        self.associated_tool_id = Some(tool_id.into());
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.is_complete = false;
        self
    }

    /// Id of the tool request carried by a tool channel
    pub fn tool_id(&self) -> Option<&str> {
        self.tool_request.as_ref().map(|request| request.id.as_str())
    }

    /// True when both channels describe the same segment, ignoring timestamps
    pub fn same_segment(&self, other: &Channel) -> bool {
        self.id == other.id
            && self.channel_type == other.channel_type
            && self.order == other.order
            && self.content == other.content
            && self.tool_request == other.tool_request
    }
}

/// The channels parsed from one generation pass, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedOutput {
    pub channels: Vec<Channel>,
}

impl ProcessedOutput {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels whose content can no longer change as the output grows
    pub fn completed(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|channel| channel.is_complete)
    }

    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.channels
            .iter()
            .filter_map(|channel| channel.tool_request.as_ref())
            .collect()
    }

    /// Text of every final channel joined by newlines
    pub fn final_text(&self) -> String {
        self.channels
            .iter()
            .filter(|channel| channel.channel_type == ChannelType::Final)
            .map(|channel| channel.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_channel_type_names() {
        assert_eq!(ChannelType::Commentary.to_string(), "commentary");
        assert_eq!(ChannelType::from_str("final").unwrap(), ChannelType::Final);
        assert!(ChannelType::from_str("summary").is_err());
    }

    #[test]
    fn test_channel_serialization() {
        let channel = Channel::new("ch_1", ChannelType::Commentary, "Looking it up", 0)
            .with_associated_tool("call_1");
        let value = serde_json::to_value(&channel).unwrap();
        assert_eq!(value["type"], "commentary");
        assert_eq!(value["associatedToolId"], "call_1");
        assert_eq!(value["isComplete"], true);
        assert!(value.get("toolRequest").is_none());
    }

    #[test]
    fn test_tool_channel() {
        let request = ToolRequest::new("call_1", "search", r#"{"q":"x"}"#);
        let channel = Channel::tool("ch_1", request, 3);
        assert_eq!(channel.channel_type, ChannelType::Tool);
        assert_eq!(channel.recipient.as_deref(), Some("search"));
        assert_eq!(channel.tool_id(), Some("call_1"));
        assert_eq!(channel.content, r#"{"q":"x"}"#);
    }

    #[test]
    fn test_same_segment_ignores_timestamp() {
        let a = Channel::new("ch_1", ChannelType::Final, "Hello", 0);
        let mut b = a.clone();
        b.updated_at = a.updated_at + chrono::Duration::seconds(5);
        assert!(a.same_segment(&b));
        b.content.push('!');
        assert!(!a.same_segment(&b));
    }

    #[test]
    fn test_processed_output_helpers() {
        let output = ProcessedOutput::new(vec![
            Channel::new("a", ChannelType::Final, "one", 0),
            Channel::tool("b", ToolRequest::new("call_1", "search", "{}"), 1),
            Channel::new("c", ChannelType::Final, "two", 2).incomplete(),
        ]);
        assert_eq!(output.len(), 3);
        assert_eq!(output.completed().count(), 2);
        assert_eq!(output.tool_requests().len(), 1);
        assert_eq!(output.final_text(), "one\ntwo");
    }
}
