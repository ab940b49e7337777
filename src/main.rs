/// Kubequery - natural-language questions about a Kubernetes cluster
///
/// Interprets a free-text query with an LLM, answers it with read-only
/// Kubernetes API calls, and serves the result over HTTP.
mod agent;
mod config;
mod error;
mod k8s;
mod llm;
mod server;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::QueryAgent;
use crate::config::{AgentConfig, LogRotation, LoggingConfig};
use crate::k8s::{KubeInspector, KubernetesClient};
use crate::llm::OpenAiClient;
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "kubequery")]
#[command(about = "Answer natural-language questions about a Kubernetes cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "kubequery.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the query endpoint (default)
    Serve,

    /// Answer a single query and exit
    Ask {
        /// The question to answer
        query: String,
    },

    /// Generate example configuration file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = AgentConfig::load_or_default(&cli.config);
    let log_guard = init_tracing(cli.verbose, config.as_ref().ok().map(|c| &c.logging));

    let result = match cli.command {
        Some(Commands::Init) => init_config(&cli).await,
        ref command => match config.context("Failed to load configuration") {
            Ok(config) => match command {
                Some(Commands::Ask { query }) => ask(&config, query).await,
                _ => serve(&config).await,
            },
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        drop(log_guard);
        std::process::exit(1);
    }
}

/// Initialize tracing: stdout always, plus a rotating log file when configured
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(verbose: bool, logging: Option<&LoggingConfig>) -> Option<WorkerGuard> {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("kubequery={},tower_http={}", log_level, log_level).into()
    });

    let appender = logging.and_then(|l| l.file.as_deref().map(|f| (l, f))).and_then(
        |(logging, path)| match file_appender(path, logging.rotation) {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!("Log file disabled: {:#}", e);
                None
            }
        },
    );

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn file_appender(path: &Path, rotation: LogRotation) -> Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("kubequery.log"))
        .to_string_lossy()
        .into_owned();
    let rotation = match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .build(directory)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Load configuration and wire the LLM and cluster clients into an agent
async fn build_agent(config: &AgentConfig) -> Result<QueryAgent> {
    let api_key = config.get_api_key()?;
    let llm = OpenAiClient::new(&config.llm, &api_key)?;
    info!("Using LLM model {}", llm.model());

    let client = KubernetesClient::connect(&config.kube)
        .await
        .context("Failed to load Kubernetes configuration")?;

    if config.fallback.enabled {
        if let Err(e) = KubernetesClient::check_kubectl_installed(&config.fallback.kubectl).await {
            warn!("Fallback commands will fail: {:#}", e);
        }
    }

    let agent = QueryAgent::new(config, Arc::new(llm), Arc::new(KubeInspector::new(client)))?;
    Ok(agent)
}

/// Serve the HTTP endpoint
async fn serve(config: &AgentConfig) -> Result<()> {
    let addr = config.bind_addr()?;

    let agent = build_agent(config).await?;
    server::run(AppState { agent }, addr, &config.server.cors_origin).await
}

/// Answer one query on stdout
async fn ask(config: &AgentConfig, query: &str) -> Result<()> {
    let agent = build_agent(config).await?;
    let answer = agent.answer(query).await?;
    println!("{}", answer);

    Ok(())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = AgentConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your cluster");
    info!("  2. Set your OpenAI API key:");
    info!("     export OPENAI_API_KEY=your-key-here");
    info!("  3. Start the agent:");
    info!("     kubequery serve");

    Ok(())
}
