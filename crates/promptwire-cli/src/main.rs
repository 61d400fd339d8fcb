use anyhow::Result;
use clap::{Parser, Subcommand};
use promptwire::architecture::Architecture;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod configuration;
mod error;

use commands::process::ProcessOptions;
use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML settings file, applied before PROMPTWIRE_* environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a prompt from build parameters (JSON or YAML)
    Build {
        /// Build parameters file
        params: PathBuf,

        /// Tool definitions to register (JSON or YAML list)
        #[arg(short, long)]
        tools: Option<PathBuf>,
    },

    /// Parse raw model output into channels, printed as JSON
    Process {
        /// Output file; stdin when omitted
        input: Option<PathBuf>,

        /// Model name, used to infer the architecture
        #[arg(short, long)]
        model: Option<String>,

        /// Architecture override (chatml, llama3, gemma, phi3)
        #[arg(short, long)]
        architecture: Option<Architecture>,

        /// Generation name that ids are derived from; random when omitted
        #[arg(short, long)]
        generation: Option<String>,

        /// The output is a finished generation
        #[arg(long = "final")]
        finished: bool,

        /// Replay the output in chunks of N characters and print every snapshot
        #[arg(long, value_name = "N")]
        chunk_size: Option<usize>,
    },

    /// List supported architectures
    Architectures,

    /// Display the current version
    Version,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    init_logging(&settings.log.level);

    match cli.command {
        Command::Build { params, tools } => {
            commands::build::execute(&settings.engine, &params, tools.as_deref())?;
        }
        Command::Process {
            input,
            model,
            architecture,
            generation,
            finished,
            chunk_size,
        } => {
            let options = ProcessOptions {
                model: model.as_deref(),
                architecture,
                input: input.as_deref(),
                generation: generation.as_deref(),
                finished,
                chunk_size,
            };
            commands::process::execute(&settings.engine, options).await?;
        }
        Command::Architectures => commands::architectures::execute(),
        Command::Version => commands::version::execute(),
    }
    Ok(())
}
