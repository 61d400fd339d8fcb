//! Ordering rules shared by the parser and the formatter.
//!
//! The parser hands out `order` values through [`OrderAllocator`] so they are strictly increasing.
//! The formatter lays a stored turn out with [`arrange_turn`]:
//! - channels sort by their stored `order`
//! - tool calls that have no channel of their own sort after every channel, in call order
//! - a commentary channel naming a tool through `associated_tool_id` is moved directly in front
//!   of that tool, wherever the tool ends up

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::channel::{Channel, ChannelType};
use crate::models::message::MessageData;
use crate::models::tool::ToolRequest;

/// Hands out strictly increasing order values for one turn
#[derive(Debug, Default, Clone)]
pub struct OrderAllocator {
    next: u32,
}

impl OrderAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order(&mut self) -> u32 {
        let order = self.next;
        self.next += 1;
        order
    }

    /// Number of values handed out so far
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingViolation {
    #[error("channel order {current} does not follow {previous}")]
    NotIncreasing { previous: u32, current: u32 },

    #[error("commentary for tool {tool_id} is placed after the tool")]
    CommentaryAfterTool { tool_id: String },
}

/// Check a channel sequence: strictly increasing orders, associated commentary before its tool
pub fn verify_ordering(channels: &[Channel]) -> Result<(), OrderingViolation> {
    for pair in channels.windows(2) {
        if pair[1].order <= pair[0].order {
            return Err(OrderingViolation::NotIncreasing {
                previous: pair[0].order,
                current: pair[1].order,
            });
        }
    }

    let mut seen_tools = HashSet::new();
    for channel in channels {
        if let Some(tool_id) = channel.tool_id() {
            seen_tools.insert(tool_id);
        }
        if channel.channel_type == ChannelType::Commentary {
            if let Some(tool_id) = channel.associated_tool_id.as_deref() {
                if seen_tools.contains(tool_id) {
                    return Err(OrderingViolation::CommentaryAfterTool {
                        tool_id: tool_id.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// One element of a turn laid out for re-serialization
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnItem<'a> {
    Channel(&'a Channel),
    /// A recorded tool call with no tool channel of its own
    ToolCall(&'a ToolRequest),
}

impl<'a> TurnItem<'a> {
    pub fn tool_request(&self) -> Option<&'a ToolRequest> {
        match self {
            TurnItem::Channel(channel) => channel.tool_request.as_ref(),
            TurnItem::ToolCall(request) => Some(request),
        }
    }
}

/// Lay out a stored turn in the order its parts must be written back into a prompt
pub fn arrange_turn(turn: &MessageData) -> Vec<TurnItem<'_>> {
    let tool_ids: HashSet<&str> = turn.tool_requests().map(|r| r.id.as_str()).collect();
    let channel_tool_ids: HashSet<&str> = turn.channels.iter().filter_map(Channel::tool_id).collect();

    let mut attached: HashMap<&str, Vec<&Channel>> = HashMap::new();
    let mut keyed: Vec<(u32, usize, TurnItem<'_>)> = Vec::new();

    for (seq, channel) in turn.channels.iter().enumerate() {
        let associated = channel
            .associated_tool_id
            .as_deref()
            .filter(|id| channel.channel_type == ChannelType::Commentary && tool_ids.contains(id));
        match associated {
            Some(tool_id) => attached.entry(tool_id).or_default().push(channel),
            None => keyed.push((channel.order, seq, TurnItem::Channel(channel))),
        }
    }

    let mut queued = HashSet::new();
    for (index, call) in turn.tool_calls.iter().enumerate() {
        if channel_tool_ids.contains(call.id.as_str()) || !queued.insert(call.id.as_str()) {
            continue;
        }
        keyed.push((u32::MAX, turn.channels.len() + index, TurnItem::ToolCall(call)));
    }

    keyed.sort_by_key(|(order, seq, _)| (*order, *seq));

    let mut items = Vec::with_capacity(turn.channels.len() + turn.tool_calls.len());
    for (_, _, item) in keyed {
        if let Some(request) = item.tool_request() {
            if let Some(mut commentary) = attached.remove(request.id.as_str()) {
                commentary.sort_by_key(|channel| channel.order);
                items.extend(commentary.into_iter().map(TurnItem::Channel));
            }
        }
        items.push(item);
    }
    items
}
