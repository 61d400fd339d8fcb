//! Tag-scanning parser turning raw model output into ordered channels.
//!
//! The whole text is scanned from the start on every call. Channels are finalized only by text
//! that is already present (a closing tag, or the opening tag that ends a run of plain text), so
//! parsing a longer version of the same output always reproduces the channels finalized before.

mod json;
mod streaming;

pub use json::{find_unquoted, is_balanced, JsonScanState};
pub use streaming::StreamingParser;

use uuid::Uuid;

use crate::architecture::Architecture;
use crate::labels::{Labels, TagPair};
use crate::models::channel::{Channel, ChannelType, ProcessedOutput, USER_RECIPIENT};
use crate::normalizer::normalize_payload;
use crate::objectid::derive_object_id;
use crate::ordering::OrderAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    PlainText,
    InsideAnalysisTag,
    InsideCommentaryTag,
    InsideToolTag,
}

impl ScanState {
    fn inside(channel_type: ChannelType) -> Self {
        match channel_type {
            ChannelType::Analysis => ScanState::InsideAnalysisTag,
            ChannelType::Commentary => ScanState::InsideCommentaryTag,
            ChannelType::Tool => ScanState::InsideToolTag,
            ChannelType::Final => ScanState::PlainText,
        }
    }

    fn channel_type(&self) -> ChannelType {
        match self {
            ScanState::PlainText => ChannelType::Final,
            ScanState::InsideAnalysisTag => ChannelType::Analysis,
            ScanState::InsideCommentaryTag => ChannelType::Commentary,
            ScanState::InsideToolTag => ChannelType::Tool,
        }
    }
}

/// Parser for the output of one architecture.
///
/// Ids of channels and of tool calls without an id of their own are derived from `seed` and the
/// channel order, so they are stable across re-parses of the same generation.
#[derive(Debug, Clone)]
pub struct OutputParser {
    architecture: Architecture,
    seed: Uuid,
}

impl OutputParser {
    pub fn new(architecture: Architecture) -> Self {
        Self::with_seed(architecture, Uuid::nil())
    }

    pub fn with_seed(architecture: Architecture, seed: Uuid) -> Self {
        Self { architecture, seed }
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Parse output that may still grow
    pub fn parse(&self, text: &str) -> ProcessedOutput {
        self.scan(text, false)
    }

    /// Parse output the caller knows is complete
    pub fn parse_final(&self, text: &str) -> ProcessedOutput {
        self.scan(text, true)
    }

    fn scan(&self, text: &str, finished: bool) -> ProcessedOutput {
        let labels = self.architecture.labels();
        let tags = labels.tagged_channels();
        let mut builder = ChannelBuilder::new(self);
        let mut state = ScanState::PlainText;
        let mut pos = 0;

        loop {
            let (rest, stopped) =
                until_stop(&text[pos..], labels, state == ScanState::InsideToolTag);
            // nothing after a stop sequence can complete a marker
            let hold_back = !finished && !stopped;
            match state {
                ScanState::PlainText => match earliest_open_tag(rest, &tags) {
                    Some((index, channel_type, tag)) => {
                        // plain text running into a tool tag is that tool's preamble
                        let plain_type = if channel_type == ChannelType::Tool {
                            ChannelType::Commentary
                        } else {
                            ChannelType::Final
                        };
                        builder.push_text(plain_type, &rest[..index], true);
                        pos += index + tag.open.len();
                        state = ScanState::inside(channel_type);
                    }
                    None => {
                        let held = if hold_back {
                            let markers = tags.iter().map(|(_, tag)| tag.open);
                            held_back_len(rest, markers.chain(labels.stop_sequences.iter().copied()))
                        } else {
                            0
                        };
                        builder.push_text(ChannelType::Final, &rest[..rest.len() - held], finished);
                        break;
                    }
                },
                inside => {
                    let channel_type = inside.channel_type();
                    let Some(tag) = labels.tag_for(channel_type) else {
                        break;
                    };
                    let close = if inside == ScanState::InsideToolTag {
                        // a stray quote hides the close tag from the JSON-aware search; once the
                        // output is complete the first literal close tag ends the payload
                        find_unquoted(rest, tag.close)
                            .or_else(|| if finished { rest.find(tag.close) } else { None })
                    } else {
                        rest.find(tag.close)
                    };
                    match close {
                        Some(index) => {
                            let body = &rest[..index];
                            if inside == ScanState::InsideToolTag {
                                builder.push_tool_payload(body);
                            } else {
                                builder.push_text(channel_type, body, true);
                            }
                            pos += index + tag.close.len();
                            state = ScanState::PlainText;
                        }
                        None if finished => {
                            tracing::debug!(
                                architecture = %self.architecture,
                                %channel_type,
                                "unclosed tag at end of output, keeping it as final text"
                            );
                            builder.push_text(ChannelType::Final, rest, true);
                            break;
                        }
                        None => {
                            // a partial tool call is never surfaced
                            if inside != ScanState::InsideToolTag {
                                let held = if hold_back {
                                    let markers = std::iter::once(tag.close)
                                        .chain(labels.stop_sequences.iter().copied());
                                    held_back_len(rest, markers)
                                } else {
                                    0
                                };
                                builder.push_text(channel_type, &rest[..rest.len() - held], false);
                            }
                            break;
                        }
                    }
                }
            }
        }

        builder.finish()
    }
}

/// Parse output that may still grow, with ids seeded from the nil UUID
pub fn parse_output(text: &str, architecture: Architecture) -> ProcessedOutput {
    OutputParser::new(architecture).parse(text)
}

/// Collects channels for one scan, assigning orders and ids
struct ChannelBuilder<'a> {
    parser: &'a OutputParser,
    orders: OrderAllocator,
    channels: Vec<Channel>,
}

impl<'a> ChannelBuilder<'a> {
    fn new(parser: &'a OutputParser) -> Self {
        Self {
            parser,
            orders: OrderAllocator::new(),
            channels: Vec::new(),
        }
    }

    fn channel_id(&self, order: u32) -> String {
        derive_object_id("ch", &self.parser.seed, &order.to_string())
    }

    fn push_text(&mut self, channel_type: ChannelType, content: &str, complete: bool) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let order = self.orders.next_order();
        let mut channel = Channel::new(self.channel_id(order), channel_type, content, order);
        if channel_type == ChannelType::Final {
            channel = channel.with_recipient(USER_RECIPIENT);
        }
        if !complete {
            channel = channel.incomplete();
        }
        self.channels.push(channel);
    }

    fn push_tool_payload(&mut self, body: &str) {
        if body.trim().is_empty() {
            return;
        }
        let parsed = if is_balanced(body) {
            normalize_payload(body)
        } else {
            Err(crate::errors::NormalizeError::InvalidJson(
                "unbalanced brackets".to_string(),
            ))
        };
        let requests = match parsed {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(
                    architecture = %self.parser.architecture,
                    error = %e,
                    "tool payload could not be read, keeping it as final text"
                );
                self.push_text(ChannelType::Final, body, true);
                return;
            }
        };

        let preamble = self.channels.len().checked_sub(1);
        let mut first_tool_id = None;
        for mut request in requests {
            let order = self.orders.next_order();
            if request.id.is_empty() {
                request.id =
                    derive_object_id("call", &self.parser.seed, &format!("tool:{}", order));
            }
            first_tool_id.get_or_insert_with(|| request.id.clone());
            self.channels
                .push(Channel::tool(self.channel_id(order), request, order));
        }

        if let (Some(index), Some(tool_id)) = (preamble, first_tool_id) {
            let previous = &mut self.channels[index];
            if previous.channel_type == ChannelType::Commentary
                && previous.is_complete
                && previous.associated_tool_id.is_none()
            {
                previous.associated_tool_id = Some(tool_id);
            }
        }
    }

    fn finish(self) -> ProcessedOutput {
        ProcessedOutput::new(self.channels)
    }
}

/// `text` up to the first stop sequence, and whether one was found.
///
/// Inside a tool payload a stop sequence within a JSON string is argument text.
fn until_stop<'t>(text: &'t str, labels: &Labels, in_payload: bool) -> (&'t str, bool) {
    labels
        .stop_sequences
        .iter()
        .filter_map(|stop| {
            if in_payload {
                find_unquoted(text, stop)
            } else {
                text.find(stop)
            }
        })
        .min()
        .map_or((text, false), |index| (&text[..index], true))
}

fn earliest_open_tag<'l>(
    text: &str,
    tags: &[(ChannelType, &'l TagPair)],
) -> Option<(usize, ChannelType, &'l TagPair)> {
    tags.iter()
        .filter_map(|(channel_type, tag)| {
            text.find(tag.open).map(|index| (index, *channel_type, *tag))
        })
        .min_by_key(|(index, _, _)| *index)
}

/// Length of the longest suffix of `text` that could still grow into one of `markers`
fn held_back_len<'m>(text: &str, markers: impl IntoIterator<Item = &'m str>) -> usize {
    markers
        .into_iter()
        .flat_map(|marker| {
            (1..marker.len())
                .rev()
                .find(|&len| text.ends_with(&marker[..len]))
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "<commentary>Do it</commentary><tool_call>{\"name\":\"search\",\"arguments\":{\"q\":\"x\"}}</tool_call>Final";

    fn kinds(output: &ProcessedOutput) -> Vec<ChannelType> {
        output.channels.iter().map(|c| c.channel_type).collect()
    }

    #[test]
    fn test_commentary_tool_final() {
        let output = parse_output(SCENARIO, Architecture::ChatMl);
        assert_eq!(
            kinds(&output),
            vec![ChannelType::Commentary, ChannelType::Tool, ChannelType::Final]
        );
        assert_eq!(output.channels[0].content, "Do it");
        let request = output.channels[1].tool_request.as_ref().unwrap();
        assert_eq!(request.name, "search");
        assert_eq!(request.arguments, r#"{"q":"x"}"#);
        assert_eq!(output.channels[2].content, "Final");
        assert!(!output.channels[2].is_complete);
        let orders: Vec<u32> = output.channels.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_commentary_is_associated_with_following_tool() {
        let output = parse_output(SCENARIO, Architecture::ChatMl);
        let tool_id = output.channels[1].tool_id().unwrap().to_string();
        assert_eq!(output.channels[0].associated_tool_id.as_deref(), Some(tool_id.as_str()));
        assert_eq!(output.channels[1].recipient.as_deref(), Some("search"));
        assert_eq!(output.channels[2].recipient.as_deref(), Some(USER_RECIPIENT));
    }

    #[test]
    fn test_empty_tag_pair_is_dropped() {
        let output = parse_output("<commentary>\n</commentary>Final", Architecture::ChatMl);
        assert_eq!(kinds(&output), vec![ChannelType::Final]);
        assert_eq!(output.channels[0].content, "Final");
        assert_eq!(output.channels[0].order, 0);
    }

    #[test]
    fn test_no_tags_is_one_streaming_final() {
        let output = parse_output("Just an answer", Architecture::Gemma);
        assert_eq!(output.len(), 1);
        assert_eq!(output.channels[0].channel_type, ChannelType::Final);
        assert!(!output.channels[0].is_complete);

        let output = OutputParser::new(Architecture::Gemma).parse_final("Just an answer");
        assert!(output.channels[0].is_complete);
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_output("", Architecture::ChatMl).is_empty());
        assert!(parse_output("  \n", Architecture::ChatMl).is_empty());
    }

    #[test]
    fn test_thinking_then_answer() {
        let output = parse_output("<think>\nLet me see.\n</think>\n\nIt is 4.", Architecture::ChatMl);
        assert_eq!(kinds(&output), vec![ChannelType::Analysis, ChannelType::Final]);
        assert_eq!(output.channels[0].content, "Let me see.");
        assert_eq!(output.channels[1].content, "It is 4.");
    }

    #[test]
    fn test_unclosed_analysis_streams_incomplete() {
        let output = parse_output("<think>Still thinking</th", Architecture::ChatMl);
        assert_eq!(output.len(), 1);
        assert_eq!(output.channels[0].channel_type, ChannelType::Analysis);
        assert_eq!(output.channels[0].content, "Still thinking");
        assert!(!output.channels[0].is_complete);
    }

    #[test]
    fn test_plain_text_before_tool_is_commentary() {
        let output = parse_output(
            "Let me look that up.\n<tool_call>\n{\"name\": \"search\", \"arguments\": {}}\n</tool_call>",
            Architecture::ChatMl,
        );
        assert_eq!(kinds(&output), vec![ChannelType::Commentary, ChannelType::Tool]);
        assert!(output.channels[0].associated_tool_id.is_some());
    }

    #[test]
    fn test_plain_text_before_analysis_is_final() {
        let output = parse_output("Sure.<think>hm</think>", Architecture::ChatMl);
        assert_eq!(kinds(&output), vec![ChannelType::Final, ChannelType::Analysis]);
        assert!(output.channels[0].is_complete);
    }

    #[test]
    fn test_two_tool_calls_in_source_order() {
        let text = "<tool_call>{\"name\":\"a\",\"arguments\":{}}</tool_call>\n<tool_call>{\"name\":\"b\",\"arguments\":{}}</tool_call>";
        let output = parse_output(text, Architecture::ChatMl);
        let names: Vec<&str> = output
            .tool_requests()
            .iter()
            .map(|request| request.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_ne!(output.channels[0].tool_id(), output.channels[1].tool_id());
    }

    #[test]
    fn test_llama3_tool_calls_payload() {
        let text = "<|python_tag|>{\"tool_calls\": [{\"id\": \"c1\", \"type\": \"function\", \"function\": {\"name\": \"browser.search\", \"arguments\": \"{\\\"query\\\": \\\"rust\\\"}\"}}, {\"id\": \"c2\", \"type\": \"function\", \"function\": {\"name\": \"clock\", \"arguments\": \"{}\"}}]}<|eom_id|>";
        let output = parse_output(text, Architecture::Llama3);
        assert_eq!(kinds(&output), vec![ChannelType::Tool, ChannelType::Tool]);
        assert_eq!(output.channels[0].tool_id(), Some("c1"));
        assert_eq!(
            output.channels[0].tool_request.as_ref().unwrap().name,
            "browser.search"
        );
        assert_eq!(output.channels[1].tool_id(), Some("c2"));
        assert_eq!(output.channels[1].order, 1);
    }

    #[test]
    fn test_malformed_tool_payload_degrades_to_final() {
        let output = parse_output(
            "<tool_call>{\"name\": search}</tool_call>after",
            Architecture::ChatMl,
        );
        assert_eq!(kinds(&output), vec![ChannelType::Final, ChannelType::Final]);
        assert_eq!(output.channels[0].content, "{\"name\": search}");
        assert!(output.channels[0].is_complete);
        assert_eq!(output.channels[1].content, "after");
    }

    #[test]
    fn test_close_tag_inside_json_string_does_not_close() {
        let text = "<tool_call>{\"name\":\"echo\",\"arguments\":{\"text\":\"</tool_call>\"}}</tool_call>";
        let output = parse_output(text, Architecture::ChatMl);
        assert_eq!(kinds(&output), vec![ChannelType::Tool]);
        assert_eq!(
            output.channels[0].tool_request.as_ref().unwrap().arguments,
            r#"{"text":"</tool_call>"}"#
        );
    }

    #[test]
    fn test_stray_quote_in_payload_degrades_and_scanning_resumes() {
        let text = "<tool_call>{\"name\":\"say\",\"arguments\":{\"t\":\"it\"s\"}}</tool_call>Here is the answer.";
        let parser = OutputParser::new(Architecture::ChatMl);
        assert!(parser.parse(text).is_empty());

        let output = parser.parse_final(text);
        assert_eq!(kinds(&output), vec![ChannelType::Final, ChannelType::Final]);
        assert_eq!(
            output.channels[0].content,
            "{\"name\":\"say\",\"arguments\":{\"t\":\"it\"s\"}}"
        );
        assert_eq!(output.channels[1].content, "Here is the answer.");
        assert!(output.channels.iter().all(|c| c.is_complete));
    }

    #[test]
    fn test_stop_sequence_inside_tool_argument_is_text() {
        let text = "<tool_call>{\"name\":\"echo\",\"arguments\":{\"text\":\"<|im_end|>\"}}</tool_call>Done<|im_end|>ignored";
        let output = parse_output(text, Architecture::ChatMl);
        assert_eq!(kinds(&output), vec![ChannelType::Tool, ChannelType::Final]);
        assert_eq!(
            output.channels[0].tool_request.as_ref().unwrap().arguments,
            r#"{"text":"<|im_end|>"}"#
        );
        assert_eq!(output.channels[1].content, "Done");
    }

    #[test]
    fn test_partial_string_arguments_degrade_to_final() {
        let text = "<tool_call>{\"name\":\"search\",\"arguments\":\"{\\\"q\\\": \"}</tool_call>";
        let output = parse_output(text, Architecture::ChatMl);
        assert_eq!(kinds(&output), vec![ChannelType::Final]);
        assert!(output.tool_requests().is_empty());
    }

    #[test]
    fn test_unclosed_tool_at_end_degrades_when_finished() {
        let parser = OutputParser::new(Architecture::ChatMl);
        let text = "<tool_call>{\"name\":\"search\",\"arguments\":{}}";
        assert!(parser.parse(text).is_empty());
        let output = parser.parse_final(text);
        assert_eq!(kinds(&output), vec![ChannelType::Final]);
        assert_eq!(output.channels[0].content, "{\"name\":\"search\",\"arguments\":{}}");
    }

    #[test]
    fn test_partial_opening_tag_is_held_back() {
        let output = parse_output("Answer <tool_ca", Architecture::ChatMl);
        assert_eq!(output.channels[0].content, "Answer");
        let output = OutputParser::new(Architecture::ChatMl).parse_final("Answer <tool_ca");
        assert_eq!(output.channels[0].content, "Answer <tool_ca");
    }

    #[test]
    fn test_text_after_stop_sequence_is_ignored() {
        let output = parse_output(
            "Hello there<|im_end|>\n<|im_start|>user\nmore",
            Architecture::ChatMl,
        );
        assert_eq!(output.len(), 1);
        assert_eq!(output.channels[0].content, "Hello there");
    }

    #[test]
    fn test_tags_of_other_architectures_are_text() {
        let output = parse_output("<commentary>x</commentary>", Architecture::Llama3);
        assert_eq!(kinds(&output), vec![ChannelType::Final]);
        assert_eq!(output.channels[0].content, "<commentary>x</commentary>");
    }

    #[test]
    fn test_ids_depend_on_seed_and_order() {
        let a = OutputParser::with_seed(Architecture::ChatMl, Uuid::new_v4()).parse(SCENARIO);
        let b = OutputParser::with_seed(Architecture::ChatMl, Uuid::new_v4()).parse(SCENARIO);
        assert_ne!(a.channels[0].id, b.channels[0].id);
        let again = parse_output(SCENARIO, Architecture::ChatMl);
        let once = parse_output(SCENARIO, Architecture::ChatMl);
        assert_eq!(again.channels[1].id, once.channels[1].id);
        assert_eq!(again.channels[1].tool_id(), once.channels[1].tool_id());
    }

    #[test]
    fn test_held_back_len() {
        assert_eq!(held_back_len("abc <tool", ["<tool_call>"]), 5);
        assert_eq!(held_back_len("abc <", ["<tool_call>", "<think>"]), 1);
        assert_eq!(held_back_len("abc", ["<tool_call>"]), 0);
        assert_eq!(held_back_len("abc <tool_call>", ["<tool_call>"]), 0);
    }
}
