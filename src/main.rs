use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::future::BoxFuture;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use agentflow_core::config::AppConfig;
use agentflow_core::error::Result as FlowResult;
use agentflow_core::event::EventBus;
use agentflow_core::traits::{Agent, Function, PromptExecutor, PromptRequest};
use agentflow_core::value::{Object, Value};
use agentflow_engine::FlowEngine;

#[derive(Parser)]
#[command(name = "agentflow", version, about = "Run agent workflows written in a small DSL")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "agentflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a workflow file and print it as JSON
    Parse {
        /// Workflow file
        file: PathBuf,
    },
    /// Execute a workflow with echo collaborators
    Run {
        /// Workflow file, or the name of a workflow in the workflows directory
        target: String,
        /// Input object as JSON
        #[arg(short, long, default_value = "{}")]
        input: String,
        /// Print the full execution report instead of just the output
        #[arg(long)]
        trace: bool,
    },
    /// Print the function-registry entries for a workflow file
    Export {
        /// Workflow file
        file: PathBuf,
    },
    /// List workflows found in the workflows directory
    List,
    /// Show current configuration
    Config,
}

/// Agent that returns its input unchanged.
struct EchoAgent;

impl Agent for EchoAgent {
    fn run(&self, input: Value) -> BoxFuture<'_, FlowResult<Value>> {
        Box::pin(async move { Ok(input) })
    }
}

/// Function that returns its parameters as an object.
struct EchoFunction;

impl Function for EchoFunction {
    fn call(&self, params: Object) -> BoxFuture<'_, FlowResult<Value>> {
        Box::pin(async move { Ok(Value::Object(params)) })
    }
}

/// Prompt executor that answers with the user prompt.
struct EchoPrompt;

impl PromptExecutor for EchoPrompt {
    fn complete(&self, request: PromptRequest) -> BoxFuture<'_, FlowResult<String>> {
        Box::pin(async move { Ok(request.user) })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .init();

    debug!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Parse { file } => {
            let workflow = agentflow_dsl::parse_workflow(&read_file(&file)?)?;
            println!("{}", serde_json::to_string_pretty(&workflow)?);
        }
        Commands::Export { file } => {
            let registry = agentflow_dsl::generate_registry(&read_file(&file)?)?;
            println!("{}", serde_json::to_string_pretty(&registry)?);
        }
        Commands::Run {
            target,
            input,
            trace,
        } => {
            let input = parse_input(&input)?;
            let engine = echo_engine(&config).await;
            let name = resolve_target(&engine, &config, &cli.config, &target).await?;

            let report = engine.run_workflow(&name, input).await?;
            if trace {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&report.output)?);
            }
        }
        Commands::List => {
            let engine = FlowEngine::new(config.engine.clone());
            let dir = config.workflows_dir(config_base(&cli.config));
            if dir.is_dir() {
                engine.load_dir(&dir, &config.workflows.extension).await?;
            }
            for name in engine.workflow_names().await {
                println!("{name}");
            }
        }
        Commands::Config => {
            println!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

async fn echo_engine(config: &AppConfig) -> FlowEngine {
    let engine = FlowEngine::new(config.engine.clone())
        .with_event_bus(EventBus::default())
        .with_prompt_executor(EchoPrompt);
    engine.register_agent("echo", EchoAgent).await;
    engine.register_function("echo", EchoFunction).await;
    engine
}

/// Register the workflow named by `target` and return its name.
async fn resolve_target(
    engine: &FlowEngine,
    config: &AppConfig,
    config_path: &Path,
    target: &str,
) -> anyhow::Result<String> {
    let path = Path::new(target);
    if path.is_file() {
        let workflow = engine.parse_workflow(&read_file(path)?).await?;
        return Ok(workflow.name.clone());
    }

    let dir = config.workflows_dir(config_base(config_path));
    if !dir.is_dir() {
        anyhow::bail!("{target} is not a file and {} is not a directory", dir.display());
    }
    let loaded = engine.load_dir(&dir, &config.workflows.extension).await?;
    info!(dir = %dir.display(), count = loaded.len(), "Loaded workflows");
    Ok(target.to_string())
}

fn config_base(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn parse_input(text: &str) -> anyhow::Result<Object> {
    match Value::from_json_str(text).context("--input must be JSON")? {
        Value::Object(object) => Ok(object),
        other => anyhow::bail!("--input must be a JSON object, got {}", other.type_name()),
    }
}
