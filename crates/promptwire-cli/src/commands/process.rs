use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use promptwire::architecture::{Architecture, ModelDescriptor};
use promptwire::engine::Engine;
use promptwire::models::channel::ProcessedOutput;
use promptwire::objectid::create_object_id;
use promptwire::session::process_stream;
use std::fs;
use std::io;
use std::path::Path;

use crate::configuration::EngineSettings;

pub struct ProcessOptions<'a> {
    pub model: Option<&'a str>,
    pub architecture: Option<Architecture>,
    pub input: Option<&'a Path>,
    /// Name of the generation; ids are derived from it
    pub generation: Option<&'a str>,
    /// Treat the input as a finished generation
    pub finished: bool,
    /// Replay the input in chunks of this many characters, printing one snapshot per chunk
    pub chunk_size: Option<usize>,
}

pub async fn execute(settings: &EngineSettings, options: ProcessOptions<'_>) -> Result<()> {
    let model = resolve_model(settings, options.model, options.architecture)?;
    let text = match options.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => io::read_to_string(io::stdin()).context("Failed to read stdin")?,
    };

    let engine = Engine::default();
    match options.chunk_size {
        Some(size) => {
            for snapshot in replay(&engine, &model, &text, size).await {
                println!("{}", serde_json::to_string(&snapshot)?);
            }
        }
        None => {
            let generation = match options.generation {
                Some(generation) => generation.to_string(),
                None => create_object_id("gen"),
            };
            let output = if options.finished {
                engine.finish(&text, &model, &generation)
            } else {
                engine.process(&text, &model, &generation)
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn resolve_model(
    settings: &EngineSettings,
    model: Option<&str>,
    architecture: Option<Architecture>,
) -> Result<ModelDescriptor> {
    let name = match model {
        Some(name) => name,
        None => settings.require_model()?,
    };
    let model = match architecture {
        Some(architecture) => ModelDescriptor::new(name, architecture),
        None => ModelDescriptor::from_model_name(name)?,
    };
    tracing::debug!(model = %model.name, architecture = %model.architecture, "resolved model");
    Ok(model)
}

async fn replay(
    engine: &Engine,
    model: &ModelDescriptor,
    text: &str,
    chunk_size: usize,
) -> Vec<ProcessedOutput> {
    let chars: Vec<char> = text.chars().collect();
    let chunks: Vec<String> = chars
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect();
    process_stream(engine.streaming_parser(model), stream::iter(chunks))
        .collect()
        .await
}
