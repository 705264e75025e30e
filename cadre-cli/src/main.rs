//! Cadre CLI - run a supervised agent fleet from a configuration file

use anyhow::{Context, Result};
use cadre_agents::heartbeat::{Heartbeat, HeartbeatConfig};
use cadre_agents::ingestion::Ingestion;
use cadre_agents::source::FetchingSource;
use cadre_agents::store::MemoryStore;
use cadre_core::agent::{Agent, LifecycleAgent};
use cadre_core::config::{AgentKind, AgentSpec, CadreConfig};
use cadre_supervisor::{RestartPolicy, Supervisor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cadre")]
#[command(about = "Cadre agent control plane CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured agents under supervision until interrupted
    Run {
        /// Path to a TOML or YAML configuration file
        #[arg(short, long, env = "CADRE_CONFIG_FILE")]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file and print the resolved settings
    CheckConfig {
        /// Path to a TOML or YAML configuration file
        #[arg(short, long, env = "CADRE_CONFIG_FILE")]
        config: Option<PathBuf>,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("cadre {}", env!("CARGO_PKG_VERSION"));
            println!("cadre-core {}", cadre_core::VERSION);
            println!("cadre-supervisor {}", cadre_supervisor::VERSION);
            println!("cadre-agents {}", cadre_agents::VERSION);
        }
        Commands::CheckConfig { config } => {
            let config = CadreConfig::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run { config } => {
            let config = CadreConfig::load(config.as_deref())?;
            run(config).await?;
        }
    }

    Ok(())
}

/// Build a concrete agent from its config entry
fn build_agent(spec: &AgentSpec) -> Result<Arc<dyn Agent>> {
    let agent: Arc<dyn Agent> = match &spec.kind {
        AgentKind::Heartbeat { work_delay } => Arc::new(LifecycleAgent::new(
            spec.name.clone(),
            Heartbeat::new(HeartbeatConfig {
                work_delay: *work_delay,
            }),
        )),
        AgentKind::Ingestion { sources } => {
            let fetcher = FetchingSource::new()
                .with_context(|| format!("building fetcher for agent {}", spec.name))?;
            Arc::new(LifecycleAgent::new(
                spec.name.clone(),
                Ingestion::new(sources.clone(), Arc::new(fetcher), Arc::new(MemoryStore::new())),
            ))
        }
    };
    Ok(agent)
}

async fn run(config: CadreConfig) -> Result<()> {
    if config.agents.is_empty() {
        anyhow::bail!("no agents configured; nothing to supervise");
    }

    let supervisor = Arc::new(Supervisor::new());
    for spec in &config.agents {
        let policy: RestartPolicy = spec
            .restart
            .clone()
            .unwrap_or_else(|| config.restart.clone())
            .into();
        supervisor.register(spec.name.clone(), build_agent(spec)?, spec.cadence, policy)?;
    }
    info!(agents = config.agents.len(), "starting supervisor");

    let loop_task = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.run().await }
    });

    shutdown_signal().await?;
    info!("shutdown signal received");

    let report = supervisor.shutdown(config.shutdown_timeout).await;
    loop_task.await??;

    // Final state of the fleet, for the operator's logs
    let snapshot = supervisor.health_snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if !report.is_clean() {
        for error in report.into_errors(config.shutdown_timeout) {
            warn!(error = %error, "shutdown degraded");
        }
    }
    Ok(())
}

/// Wait for SIGINT, or SIGTERM where available
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
            }
            _ = term.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")
    }
}
