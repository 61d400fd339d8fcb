use crate::architecture::ModelDescriptor;
use crate::errors::ConfigResult;
use crate::formatter::PromptFormatter;
use crate::models::channel::ProcessedOutput;
use crate::models::message::BuildParameters;
use crate::objectid::generation_seed;
use crate::parser::{OutputParser, StreamingParser};
use crate::token_counter::TokenCounter;
use crate::tool::{StaticToolRegistry, ToolDefinitionProvider};

/// The two boundary operations: render a prompt and parse what the model produced.
///
/// Both are synchronous and hold no per-conversation state, so one engine can be shared by every
/// conversation.
pub struct Engine {
    formatter: PromptFormatter,
}

impl Engine {
    pub fn new(tools: impl ToolDefinitionProvider + 'static) -> Self {
        Self {
            formatter: PromptFormatter::new(tools),
        }
    }

    pub fn with_token_counter(mut self, counter: TokenCounter) -> Self {
        self.formatter = self.formatter.with_token_counter(counter);
        self
    }

    pub fn build(&self, params: &BuildParameters) -> ConfigResult<String> {
        self.formatter.build(params)
    }

    /// Parse output that may still grow. Never fails.
    ///
    /// `generation` names the generation being parsed, usually the id of the turn it answers.
    /// Re-parsing the same generation reproduces its ids; two generations never share one.
    pub fn process(&self, text: &str, model: &ModelDescriptor, generation: &str) -> ProcessedOutput {
        self.parser(model, generation).parse(text)
    }

    /// Parse output the caller knows is complete
    pub fn finish(&self, text: &str, model: &ModelDescriptor, generation: &str) -> ProcessedOutput {
        self.parser(model, generation).parse_final(text)
    }

    fn parser(&self, model: &ModelDescriptor, generation: &str) -> OutputParser {
        OutputParser::with_seed(model.architecture, generation_seed(generation))
    }

    pub fn streaming_parser(&self, model: &ModelDescriptor) -> StreamingParser {
        StreamingParser::new(model.architecture)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(StaticToolRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::Architecture;
    use crate::models::channel::ChannelType;
    use crate::models::message::ContextConfiguration;

    #[test]
    fn test_build_then_process() {
        let engine = Engine::default();
        let model = ModelDescriptor::new("qwen2.5-7b", Architecture::ChatMl);
        let prompt = engine
            .build(&BuildParameters::new(ContextConfiguration::new("Hi."), model.clone()))
            .unwrap();
        assert!(prompt.ends_with("<|im_start|>assistant\n"));

        let output = engine.process("<think>ok</think>Hello<|im_end|>", &model, "msg_1");
        assert_eq!(output.len(), 2);
        assert_eq!(output.channels[1].channel_type, ChannelType::Final);
        assert!(!output.channels[1].is_complete);
        let done = engine.finish("<think>ok</think>Hello", &model, "msg_1");
        assert!(done.channels[1].is_complete);
        assert_eq!(done.channels[0].id, output.channels[0].id);
    }

    #[test]
    fn test_ids_are_stable_within_a_generation() {
        let engine = Engine::default();
        let model = ModelDescriptor::new("llama-3.1-8b", Architecture::Llama3);
        let text = r#"<|python_tag|>{"tool_calls": [{"type": "function", "function": {"name": "clock", "arguments": "{}"}}]}<|eom_id|>"#;
        let a = engine.process(text, &model, "msg_1");
        let b = engine.process(text, &model, "msg_1");
        assert_eq!(a.channels[0].id, b.channels[0].id);
        assert_eq!(a.channels[0].tool_id(), b.channels[0].tool_id());
    }

    #[test]
    fn test_generations_never_share_ids() {
        let engine = Engine::default();
        let model = ModelDescriptor::new("qwen2.5-7b", Architecture::ChatMl);
        let paris = engine.finish(
            r#"<tool_call>{"name":"weather","arguments":{"city":"Paris"}}</tool_call>"#,
            &model,
            "msg_1",
        );
        let oslo = engine.finish(
            r#"<tool_call>{"name":"weather","arguments":{"city":"Oslo"}}</tool_call>"#,
            &model,
            "msg_2",
        );
        assert_ne!(paris.channels[0].id, oslo.channels[0].id);
        assert_ne!(paris.channels[0].tool_id(), oslo.channels[0].tool_id());
    }
}
