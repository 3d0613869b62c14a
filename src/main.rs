// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use quill_rs::adk::agent::LlmAgent;
use quill_rs::adk::error::RunError;
use quill_rs::quill::config::PipelineConfig;
use quill_rs::quill::setup;
use quill_rs::quill::workflow::{write_events, CancellationToken, RunOptions};
use quill_rs::quill::{AgentPipeline, AgentState, ContentPipeline, ContentState};
use serde::Serialize;
use std::fmt::Debug;
use std::io::Stderr;
use std::path::PathBuf;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print workflow events to stderr as they happen
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a simple prompt directly
    Run {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// The model to use
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model: String,
    },
    /// Generate content through the full pipeline
    Generate {
        /// What to write about
        #[arg(short, long)]
        prompt: String,

        /// Target keywords, comma separated
        #[arg(short, long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Requested format (blog, article, social, newsletter)
        #[arg(short = 't', long)]
        content_type: Option<String>,

        /// Pipeline config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Answer a request with the coordinator/planner/executor/reviewer agents
    Agent {
        /// The request to handle
        #[arg(short, long)]
        request: String,

        /// Pipeline config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Cancel on Ctrl-C and optionally stream events to stderr.
///
/// The returned handle finishes once the run drops its event sender.
fn run_options(trace: bool) -> (RunOptions, Option<JoinHandle<Stderr>>) {
    let token = CancellationToken::new();
    let signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping at the next step boundary");
            signal.cancel();
        }
    });

    let options = RunOptions::default().with_cancel(token);
    if !trace {
        return (options, None);
    }

    let (tx, printer) = write_events(std::io::stderr(), 64);
    (options.with_events(tx), Some(printer))
}

async fn finish_trace(printer: Option<JoinHandle<Stderr>>) {
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            log::warn!("Event printer stopped early: {}", e);
        }
    }
}

fn print_state<S: Serialize>(state: &S) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

fn report_failure<S>(err: RunError<S>) -> anyhow::Error
where
    S: Serialize + Debug + Send + Sync + 'static,
{
    match serde_json::to_string_pretty(&err.state) {
        Ok(partial) => eprintln!("Partial state:\n{}", partial),
        Err(e) => log::warn!("Could not encode partial state: {}", e),
    }
    anyhow::Error::new(err)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            prompt,
            model: model_name,
        } => {
            let mut config = PipelineConfig::default();
            config.model.name = model_name;
            let model = setup::build_model(&config)?;

            let agent = LlmAgent::new("simple-agent", "You are a helpful assistant.", model);

            println!("Sending prompt: {}", prompt);
            let response = agent.run(&prompt).await?;
            println!("Response: {}", response);
        }
        Commands::Generate {
            prompt,
            keywords,
            content_type,
            config,
        } => {
            let config = load_config(config)?;
            let collaborators = setup::content_collaborators(&config).await?;
            let pipeline = ContentPipeline::build(collaborators, &config)?;

            let mut request = ContentState::new(prompt).with_keywords(
                keywords
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect(),
            );
            if let Some(content_type) = content_type {
                request = request.with_content_type(content_type);
            }

            let (options, printer) = run_options(args.trace);
            let result = pipeline.generate(request, options).await;
            finish_trace(printer).await;
            let execution = result.map_err(report_failure)?;
            log::info!(
                "Run {} finished after {} steps",
                execution.run_id,
                execution.trail.len()
            );
            print_state(&execution.state)?;
        }
        Commands::Agent { request, config } => {
            let config = load_config(config)?;
            let model = setup::build_model(&config)?;
            let pipeline = AgentPipeline::build(model, &config)?;

            let (options, printer) = run_options(args.trace);
            let result = pipeline.respond(AgentState::new(request), options).await;
            finish_trace(printer).await;
            let execution = result.map_err(report_failure)?;
            log::info!(
                "Run {} finished after {} steps",
                execution.run_id,
                execution.trail.len()
            );
            print_state(&execution.state)?;
        }
    }

    Ok(())
}
