use anyhow::Result;
use chrono::NaiveDate;
use promptwire::{
    architecture::{Architecture, ModelDescriptor},
    engine::Engine,
    models::{
        channel::{Channel, ChannelType},
        message::{
            Action, BuildParameters, ContextConfiguration, DateInjection, MessageData,
            ReasoningEffort,
        },
        tool::{ToolDefinition, ToolRequest, ToolResponse},
    },
    tool::StaticToolRegistry,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

/// Renders one shared conversation for every architecture and compares against fixtures
struct FixtureHarness {
    engine: Engine,
}

impl FixtureHarness {
    fn new() -> Result<Self> {
        let registry = StaticToolRegistry::new().with_tool(ToolDefinition::new(
            "weather",
            "Get the weather for a city",
            json!({
                "properties": {"city": {"type": "string"}},
                "required": ["city"],
                "type": "object"
            }),
        ))?;
        Ok(Self {
            engine: Engine::new(registry),
        })
    }

    fn context() -> ContextConfiguration {
        let weather = ToolRequest::new("call_1", "weather", r#"{"city":"Paris"}"#);
        let first = MessageData::new("What is the weather in Paris?")
            .with_channel(Channel::new(
                "ch_0",
                ChannelType::Analysis,
                "The user wants the weather.",
                0,
            ))
            .with_channel(
                Channel::new("ch_1", ChannelType::Commentary, "Let me check.", 1)
                    .with_associated_tool("call_1"),
            )
            .with_channel(Channel::tool("ch_2", weather.clone(), 2))
            .with_channel(Channel::new("ch_3", ChannelType::Final, "It is sunny in Paris.", 3))
            .with_tool_call(weather);

        ContextConfiguration::new("You are a helpful assistant.")
            .with_turn(first)
            .with_turn(MessageData::new("Thanks! And tomorrow?"))
            .with_reasoning(ReasoningEffort::High)
            .with_date(DateInjection {
                current_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                knowledge_cutoff: Some("2024-06".to_string()),
            })
    }

    fn params(architecture: Architecture) -> BuildParameters {
        let tools = if architecture.supports_tools() {
            vec!["weather".to_string()]
        } else {
            Vec::new()
        };
        BuildParameters::new(
            Self::context(),
            ModelDescriptor::new(architecture.to_string(), architecture),
        )
        .with_action(Action::TextGeneration { tools })
        .with_tool_response(ToolResponse::new("call_1", "weather", r#"{"forecast":"sunny"}"#))
    }

    fn fixture(architecture: Architecture) -> Result<String> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(format!("{}.txt", architecture));
        Ok(fs::read_to_string(path)?)
    }

    fn check(&self, architecture: Architecture) -> Result<()> {
        let prompt = self.engine.build(&Self::params(architecture))?;
        let expected = Self::fixture(architecture)?;
        assert_eq!(
            prompt, expected,
            "{} prompt differs from its fixture",
            architecture
        );
        Ok(())
    }
}

#[test]
fn test_chatml_fixture() -> Result<()> {
    FixtureHarness::new()?.check(Architecture::ChatMl)
}

#[test]
fn test_llama3_fixture() -> Result<()> {
    FixtureHarness::new()?.check(Architecture::Llama3)
}

#[test]
fn test_gemma_fixture() -> Result<()> {
    FixtureHarness::new()?.check(Architecture::Gemma)
}

#[test]
fn test_phi3_fixture() -> Result<()> {
    FixtureHarness::new()?.check(Architecture::Phi3)
}

#[test]
fn test_build_is_deterministic() -> Result<()> {
    let harness = FixtureHarness::new()?;
    let params = FixtureHarness::params(Architecture::ChatMl);
    assert_eq!(harness.engine.build(&params)?, harness.engine.build(&params)?);
    Ok(())
}

#[test]
fn test_rendered_tool_call_parses_back() -> Result<()> {
    let harness = FixtureHarness::new()?;
    for architecture in [Architecture::ChatMl, Architecture::Llama3] {
        let prompt = harness.engine.build(&FixtureHarness::params(architecture))?;
        let model = ModelDescriptor::new("test", architecture);
        let syntax = architecture.labels().tool.as_ref().expect("tool syntax");

        // the system block mentions the tags too; the call in the history comes last
        let start = prompt.rfind(syntax.tag.open).expect("tool tag in prompt");
        let end = prompt[start..].find(syntax.tag.close).expect("tool close tag") + start;
        let call = &prompt[start..end + syntax.tag.close.len()];

        let output = harness.engine.finish(call, &model, "msg_parse_back");
        let requests = output.tool_requests();
        assert_eq!(requests.len(), 1, "{}", architecture);
        assert_eq!(requests[0].name, "weather");
        assert_eq!(requests[0].arguments_value(), json!({"city": "Paris"}));
    }
    Ok(())
}

#[test]
fn test_history_order_follows_channel_order() -> Result<()> {
    let harness = FixtureHarness::new()?;
    let prompt = harness.engine.build(&FixtureHarness::params(Architecture::ChatMl))?;
    let think = prompt.find("<think>").expect("analysis");
    let commentary = prompt.find("<commentary>").expect("commentary");
    let tool = prompt.rfind("<tool_call>\n{\"name\": \"weather\"").expect("tool call");
    let answer = prompt.find("It is sunny").expect("final");
    assert!(think < commentary && commentary < tool && tool < answer);
    Ok(())
}

#[test]
fn test_parsed_calls_from_two_turns_keep_their_own_results() -> Result<()> {
    let harness = FixtureHarness::new()?;
    let model = ModelDescriptor::new("qwen2.5-7b", Architecture::ChatMl);
    let reply = |question: &str, city: &str| {
        let mut turn = MessageData::new(question);
        let call = format!(
            "<tool_call>\n{{\"name\": \"weather\", \"arguments\": {{\"city\": \"{}\"}}}}\n</tool_call>",
            city
        );
        turn.channels = harness.engine.finish(&call, &model, &turn.id).channels;
        turn
    };
    let paris = reply("Weather in Paris?", "Paris");
    let oslo = reply("And in Oslo?", "Oslo");
    let paris_id = paris.channels[0].tool_id().expect("paris call").to_string();
    let oslo_id = oslo.channels[0].tool_id().expect("oslo call").to_string();
    assert_ne!(paris_id, oslo_id);

    let context = ContextConfiguration::new("You are a helpful assistant.")
        .with_turn(paris)
        .with_turn(oslo)
        .with_turn(MessageData::new("Which is warmer?"));
    let params = BuildParameters::new(context, model)
        .with_action(Action::TextGeneration {
            tools: vec!["weather".to_string()],
        })
        .with_tool_response(ToolResponse::new(paris_id, "weather", "PARIS_RESULT"))
        .with_tool_response(ToolResponse::new(oslo_id, "weather", "OSLO_RESULT"));
    let prompt = harness.engine.build(&params)?;

    let paris_call = prompt.find("\"Paris\"").expect("paris call");
    let paris_result = prompt.find("PARIS_RESULT").expect("paris result");
    let oslo_call = prompt.find("\"Oslo\"").expect("oslo call");
    let oslo_result = prompt.find("OSLO_RESULT").expect("oslo result");
    assert!(paris_call < paris_result && paris_result < oslo_call && oslo_call < oslo_result);
    assert!(!prompt.contains("<|im_start|>assistant\n<|im_end|>"));
    assert!(prompt.ends_with("Which is warmer?<|im_end|>\n<|im_start|>assistant\n"));
    Ok(())
}
