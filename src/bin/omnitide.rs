use clap::{Parser, Subcommand};
use omnitide::{
    builtin,
    config::OrchestratorConfig,
    http,
    supervisor::{Monitor, NoAnomaly, StartupSequencer},
    Error, OmnitideResult, Orchestrator,
};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "omnitide.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Discover units and run the orchestrator (default)
    Serve,
    /// Run the startup sequence, then watch for anomalies
    Supervise,
    /// Run the startup sequence once
    Sequence,
}

async fn wait_for_ctrl_c() -> OmnitideResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::internal(format!("Failed to wait for Ctrl+C: {}", e)))
}

async fn serve(config: OrchestratorConfig) -> OmnitideResult<()> {
    let orchestrator = Arc::new(Orchestrator::new(config, builtin::catalog()));
    let report = orchestrator.start().await?;
    info!(units = report.registered(), "Discovery complete");

    println!("Omnitide started. Press Ctrl+C to shutdown.");
    let served = if orchestrator.config().http.enabled {
        http::serve_until(orchestrator.clone(), wait_for_ctrl_c()).await
    } else {
        wait_for_ctrl_c().await
    };
    match &served {
        Ok(()) => println!("Shutdown signal received, performing clean shutdown..."),
        Err(e) => warn!("Stopping early: {}", e),
    }

    orchestrator.shutdown().await?;
    served?;

    println!("Omnitide shutdown completed.");
    Ok(())
}

async fn supervise(config: OrchestratorConfig) -> OmnitideResult<()> {
    let sequencer = Arc::new(StartupSequencer::from_config(&config.supervisor));
    sequencer.run().await?;

    let monitor = Arc::new(Monitor::new(
        Arc::new(NoAnomaly),
        sequencer,
        config.supervisor.monitor_interval,
    ));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = monitor.clone();
    let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    wait_for_ctrl_c().await?;
    let _ = shutdown_tx.send(());
    handle
        .await
        .map_err(|e| Error::internal(format!("Monitor task failed: {}", e)))
}

async fn run(cli: &Cli) -> OmnitideResult<()> {
    let config = OrchestratorConfig::load_or_default(Some(&cli.config))?;
    info!("config loaded.");
    debug!("config: {:?}", config);

    match cli.command.as_ref().unwrap_or(&Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Supervise => supervise(config).await,
        Command::Sequence => {
            let report = StartupSequencer::from_config(&config.supervisor).run().await?;
            println!("{:?}", report);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
