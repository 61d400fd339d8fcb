//! Fixed vocabulary of each architecture: role tokens, channel tags and tool syntax.
//!
//! Everything here is static data looked up through [`Architecture::labels`](crate::architecture::Architecture::labels).
//! The formatter writes these strings verbatim and the parser scans for them, so a change here
//! changes the wire format of both directions.

use crate::models::channel::ChannelType;

/// Opening and closing token of one role section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTokens {
    pub open: &'static str,
    pub close: &'static str,
}

/// A literal tag pair delimiting one channel in model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagPair {
    pub open: &'static str,
    pub close: &'static str,
    /// Put the content on its own line between the tags when serializing
    pub padded: bool,
}

impl TagPair {
    pub fn wrap(&self, content: &str) -> String {
        if self.padded {
            format!("{}\n{}\n{}", self.open, content, self.close)
        } else {
            format!("{}{}{}", self.open, content, self.close)
        }
    }
}

/// JSON layout the architecture uses inside its tool tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPayloadShape {
    /// `{"name": ..., "arguments": {...}}`
    SingleObject,
    /// `{"tool_calls": [{"id": ..., "type": "function", "function": {...}}]}`
    CallsArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSyntax {
    pub tag: TagPair,
    pub shape: ToolPayloadShape,
    /// The closing tool tag also ends the assistant message
    pub ends_message: bool,
    /// Role section tool results are written into
    pub result: RoleTokens,
    /// Embedded template describing the available tools
    pub definitions_template: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub begin_of_text: &'static str,
    /// `None` when the family has no system role and expects it folded into the first user turn
    pub system: Option<RoleTokens>,
    pub user: RoleTokens,
    pub assistant: RoleTokens,
    pub analysis: Option<TagPair>,
    pub commentary: Option<TagPair>,
    pub tool: Option<ToolSyntax>,
    /// Generation ends at any of these; text after them is ignored
    pub stop_sequences: &'static [&'static str],
}

impl Labels {
    /// Tag pair delimiting a channel type, if the architecture has one
    pub fn tag_for(&self, channel_type: ChannelType) -> Option<&TagPair> {
        match channel_type {
            ChannelType::Analysis => self.analysis.as_ref(),
            ChannelType::Commentary => self.commentary.as_ref(),
            ChannelType::Tool => self.tool.as_ref().map(|tool| &tool.tag),
            ChannelType::Final => None,
        }
    }

    /// Every tagged channel type with its tag pair, in scan priority
    pub fn tagged_channels(&self) -> Vec<(ChannelType, &TagPair)> {
        [
            ChannelType::Analysis,
            ChannelType::Commentary,
            ChannelType::Tool,
        ]
        .into_iter()
        .filter_map(|channel_type| self.tag_for(channel_type).map(|tag| (channel_type, tag)))
        .collect()
    }
}

pub static CHATML: Labels = Labels {
    begin_of_text: "",
    system: Some(RoleTokens {
        open: "<|im_start|>system\n",
        close: "<|im_end|>\n",
    }),
    user: RoleTokens {
        open: "<|im_start|>user\n",
        close: "<|im_end|>\n",
    },
    assistant: RoleTokens {
        open: "<|im_start|>assistant\n",
        close: "<|im_end|>\n",
    },
    analysis: Some(TagPair {
        open: "<think>",
        close: "</think>",
        padded: true,
    }),
    commentary: Some(TagPair {
        open: "<commentary>",
        close: "</commentary>",
        padded: false,
    }),
    tool: Some(ToolSyntax {
        tag: TagPair {
            open: "<tool_call>",
            close: "</tool_call>",
            padded: true,
        },
        shape: ToolPayloadShape::SingleObject,
        ends_message: false,
        result: RoleTokens {
            open: "<|im_start|>user\n<tool_response>\n",
            close: "\n</tool_response><|im_end|>\n",
        },
        definitions_template: "tools_chatml.md",
    }),
    stop_sequences: &["<|im_end|>", "<|endoftext|>", "<|im_start|>"],
};

pub static LLAMA3: Labels = Labels {
    begin_of_text: "<|begin_of_text|>",
    system: Some(RoleTokens {
        open: "<|start_header_id|>system<|end_header_id|>\n\n",
        close: "<|eot_id|>",
    }),
    user: RoleTokens {
        open: "<|start_header_id|>user<|end_header_id|>\n\n",
        close: "<|eot_id|>",
    },
    assistant: RoleTokens {
        open: "<|start_header_id|>assistant<|end_header_id|>\n\n",
        close: "<|eot_id|>",
    },
    analysis: None,
    commentary: None,
    tool: Some(ToolSyntax {
        tag: TagPair {
            open: "<|python_tag|>",
            close: "<|eom_id|>",
            padded: false,
        },
        shape: ToolPayloadShape::CallsArray,
        ends_message: true,
        result: RoleTokens {
            open: "<|start_header_id|>ipython<|end_header_id|>\n\n",
            close: "<|eot_id|>",
        },
        definitions_template: "tools_llama3.md",
    }),
    stop_sequences: &["<|eot_id|>", "<|end_of_text|>", "<|start_header_id|>"],
};

pub static GEMMA: Labels = Labels {
    begin_of_text: "<bos>",
    system: None,
    user: RoleTokens {
        open: "<start_of_turn>user\n",
        close: "<end_of_turn>\n",
    },
    assistant: RoleTokens {
        open: "<start_of_turn>model\n",
        close: "<end_of_turn>\n",
    },
    analysis: None,
    commentary: None,
    tool: None,
    stop_sequences: &["<end_of_turn>", "<eos>", "<start_of_turn>"],
};

pub static PHI3: Labels = Labels {
    begin_of_text: "",
    system: Some(RoleTokens {
        open: "<|system|>\n",
        close: "<|end|>\n",
    }),
    user: RoleTokens {
        open: "<|user|>\n",
        close: "<|end|>\n",
    },
    assistant: RoleTokens {
        open: "<|assistant|>\n",
        close: "<|end|>\n",
    },
    analysis: None,
    commentary: None,
    tool: None,
    stop_sequences: &["<|end|>", "<|endoftext|>", "<|user|>"],
};
