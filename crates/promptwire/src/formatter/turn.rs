use serde_json::Value;

use crate::labels::{Labels, ToolPayloadShape, ToolSyntax};
use crate::models::channel::ChannelType;
use crate::models::message::MessageData;
use crate::models::tool::{ToolRequest, ToolResponse};
use crate::ordering::{arrange_turn, TurnItem};

/// Write one turn: the user section, then the assistant section.
///
/// `preamble` is prepended to the user input when the system block is folded into the first
/// turn. An `open` turn leaves its assistant section unclosed for generation.
pub(crate) fn render_turn(
    turn: &MessageData,
    labels: &Labels,
    responses: &[ToolResponse],
    preamble: Option<&str>,
    open: bool,
) -> String {
    let mut out = String::new();
    out.push_str(labels.user.open);
    if let Some(preamble) = preamble {
        out.push_str(preamble);
        out.push_str("\n\n");
    }
    out.push_str(&turn.user_input);
    out.push_str(labels.user.close);
    out.push_str(labels.assistant.open);

    let mut body = AssistantBody::new(labels, responses);
    for item in arrange_turn(turn) {
        body.push(item);
    }
    out.push_str(&body.finish(open));
    out
}

struct AssistantBody<'a> {
    labels: &'a Labels,
    responses: &'a [ToolResponse],
    text: String,
    // nothing written since the assistant section was (re)opened
    at_section_start: bool,
    // the last thing written reopened the assistant section after tool results
    after_break: bool,
    pending_tools: Vec<&'a ToolRequest>,
}

impl<'a> AssistantBody<'a> {
    fn new(labels: &'a Labels, responses: &'a [ToolResponse]) -> Self {
        Self {
            labels,
            responses,
            text: String::new(),
            at_section_start: true,
            after_break: false,
            pending_tools: Vec::new(),
        }
    }

    fn push(&mut self, item: TurnItem<'a>) {
        let channel = match item {
            TurnItem::ToolCall(request) => return self.push_tool(request),
            TurnItem::Channel(channel) => channel,
        };
        if channel.channel_type == ChannelType::Tool {
            match &channel.tool_request {
                Some(request) => self.push_tool(request),
                None => tracing::warn!(channel = %channel.id, "tool channel without a request"),
            }
            return;
        }

        self.flush_tools();
        let content = channel.content.trim();
        if content.is_empty() {
            return;
        }
        let labels = self.labels;
        match channel.channel_type {
            ChannelType::Analysis => match &labels.analysis {
                Some(tag) => self.push_segment(&tag.wrap(content)),
                None => tracing::debug!(channel = %channel.id, "dropping analysis channel"),
            },
            ChannelType::Commentary => match &labels.commentary {
                Some(tag) => self.push_segment(&tag.wrap(content)),
                None => self.push_segment(content),
            },
            _ => self.push_segment(content),
        }
    }

    fn push_tool(&mut self, request: &'a ToolRequest) {
        if self.labels.tool.is_none() {
            tracing::warn!(
                tool = %request.name,
                "architecture has no tool syntax, leaving the tool call out of the prompt"
            );
            return;
        }
        self.pending_tools.push(request);
    }

    fn push_segment(&mut self, segment: &str) {
        if !self.at_section_start {
            self.text.push('\n');
        }
        self.text.push_str(segment);
        self.at_section_start = false;
        self.after_break = false;
    }

    /// Write the queued tool calls, then break out to the results of those that have one
    fn flush_tools(&mut self) {
        let labels = self.labels;
        let responses = self.responses;
        let Some(syntax) = labels.tool.as_ref() else {
            return;
        };
        if self.pending_tools.is_empty() {
            return;
        }
        let requests = std::mem::take(&mut self.pending_tools);

        match syntax.shape {
            ToolPayloadShape::SingleObject => {
                for request in &requests {
                    self.push_segment(&syntax.tag.wrap(&single_object_payload(request)));
                }
            }
            ToolPayloadShape::CallsArray => {
                self.push_segment(&syntax.tag.wrap(&calls_array_payload(&requests)));
            }
        }

        let results: Vec<&ToolResponse> = requests
            .iter()
            .filter_map(|request| {
                responses
                    .iter()
                    .find(|response| response.request_id == request.id)
            })
            .collect();
        if !results.is_empty() {
            self.break_for_results(syntax, &results);
        }
    }

    fn break_for_results(&mut self, syntax: &ToolSyntax, results: &[&ToolResponse]) {
        if !syntax.ends_message {
            self.text.push_str(self.labels.assistant.close);
        }
        for response in results {
            self.text.push_str(syntax.result.open);
            self.text.push_str(&response.result);
            self.text.push_str(syntax.result.close);
        }
        self.text.push_str(self.labels.assistant.open);
        self.at_section_start = true;
        self.after_break = true;
    }

    /// Close the section unless the turn is `open`. A closed turn ending in tool results ends
    /// with the results rather than an empty assistant section.
    fn finish(mut self, open: bool) -> String {
        self.flush_tools();
        if !open {
            if self.after_break {
                let end = self.text.len() - self.labels.assistant.open.len();
                self.text.truncate(end);
            } else {
                self.text.push_str(self.labels.assistant.close);
            }
        }
        self.text
    }
}

fn arguments_json(request: &ToolRequest) -> String {
    match serde_json::from_str::<Value>(&request.arguments) {
        Ok(value) => value.to_string(),
        Err(_) => Value::String(request.arguments.clone()).to_string(),
    }
}

fn called_name(request: &ToolRequest) -> Value {
    Value::String(
        request
            .display_name
            .clone()
            .unwrap_or_else(|| request.name.clone()),
    )
}

/// `{"name": ..., "arguments": {...}}`
fn single_object_payload(request: &ToolRequest) -> String {
    format!(
        r#"{{"name": {}, "arguments": {}}}"#,
        called_name(request),
        arguments_json(request)
    )
}

/// `{"tool_calls": [...]}` with the arguments as a JSON string
fn calls_array_payload(requests: &[&ToolRequest]) -> String {
    let calls: Vec<String> = requests
        .iter()
        .map(|request| {
            format!(
                r#"{{"id": {}, "type": "function", "function": {{"name": {}, "arguments": {}}}}}"#,
                Value::String(request.id.clone()),
                called_name(request),
                Value::String(arguments_json(request))
            )
        })
        .collect();
    format!(r#"{{"tool_calls": [{}]}}"#, calls.join(", "))
}
