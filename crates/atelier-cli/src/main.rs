use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use atelier_core::agents::{backend, cloud, BackendCoderAgent, CloudArchitectAgent};
use atelier_core::{Agent, CapabilityDescriptor, Task, TaskContext};
use gen_client::{GenPolicy, HttpGenerator};

#[derive(Parser)]
#[command(
    name = "atelier",
    about = "Run specialized software-generation agents: validate configs, inspect capabilities, execute tasks",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an agent configuration artifact
    Validate {
        /// Path to the agent configuration YAML
        #[arg(long)]
        config: PathBuf,
    },

    /// Print an agent's capability descriptor as JSON
    Capabilities {
        #[arg(long)]
        config: PathBuf,
    },

    /// Execute one task against the configured agent
    Run {
        #[arg(long)]
        config: PathBuf,

        /// Task type (e.g. design_architecture, generate_service)
        #[arg(long)]
        task: String,

        /// Task payload as inline JSON
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Read-only context as inline JSON
        #[arg(long, default_value = "{}")]
        context: String,

        /// Generation collaborator endpoint
        #[arg(long, env = "ATELIER_GEN_ENDPOINT", default_value = "http://localhost:8700/generate")]
        endpoint: String,

        /// Per-attempt generation timeout in milliseconds
        #[arg(long, default_value_t = 60_000)]
        timeout_ms: u64,

        /// Retries after the first generation attempt
        #[arg(long, default_value_t = 2)]
        max_retries: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Capabilities { config } => capabilities(&config),
        Commands::Run {
            config,
            task,
            payload,
            context,
            endpoint,
            timeout_ms,
            max_retries,
        } => {
            run(
                &config,
                &task,
                &payload,
                &context,
                &endpoint,
                GenPolicy {
                    timeout_ms,
                    max_retries,
                },
            )
            .await
        }
    }
}

fn load_descriptor(config: &PathBuf) -> anyhow::Result<CapabilityDescriptor> {
    CapabilityDescriptor::load(config)
        .with_context(|| format!("failed to load agent config {}", config.display()))
}

fn validate(config: &PathBuf) -> anyhow::Result<()> {
    let descriptor = load_descriptor(config)?;
    let warnings = descriptor.validate_warnings();
    if warnings.is_empty() {
        println!("ok: {} ({})", descriptor.agent_id, descriptor.specialization);
    } else {
        for w in &warnings {
            println!("{:?}: {}", w.level, w.message);
        }
    }
    Ok(())
}

fn capabilities(config: &PathBuf) -> anyhow::Result<()> {
    let descriptor = load_descriptor(config)?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

fn build_agent(
    descriptor: CapabilityDescriptor,
    endpoint: &str,
    policy: GenPolicy,
) -> anyhow::Result<Agent> {
    let generator = Arc::new(HttpGenerator::new(
        endpoint,
        descriptor.model.clone(),
        descriptor.temperature,
    ));
    let specialization = descriptor.specialization.clone();
    let agent = match specialization.as_str() {
        cloud::SPECIALIZATION => CloudArchitectAgent::build(descriptor, generator, policy),
        backend::SPECIALIZATION => BackendCoderAgent::build(descriptor, generator, policy),
        other => bail!("no built-in agent for specialization '{other}'"),
    };
    agent.initialize()?;
    Ok(agent)
}

async fn run(
    config: &PathBuf,
    task_type: &str,
    payload: &str,
    context: &str,
    endpoint: &str,
    policy: GenPolicy,
) -> anyhow::Result<()> {
    let descriptor = load_descriptor(config)?;
    let agent = build_agent(descriptor, endpoint, policy)?;

    let payload: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(payload).context("--payload must be a JSON object")?;
    let context: TaskContext =
        serde_json::from_str(context).context("--context must be a JSON object")?;

    let task = Task::new(task_type, payload);
    tracing::info!(task_type, agent = %agent.descriptor().agent_id, "dispatching task");
    let result = agent.execute(&task, &context).await;

    // Error results are routine negative responses; only load/build
    // failures exit non-zero.
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
