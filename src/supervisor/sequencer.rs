use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::{info, warn};

use super::{ShellCommand, SupervisorResult};
use crate::config::SupervisorConfig;

/// Flushes durable state before anything else starts.
#[automock]
#[async_trait]
pub trait StateSync: Send + Sync {
    async fn sync(&self) -> SupervisorResult<()>;
}

/// Reports whether the outside world is reachable.
#[automock]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> SupervisorResult<bool>;
}

#[automock]
#[async_trait]
pub trait Remediation: Send + Sync {
    async fn remediate(&self) -> SupervisorResult<()>;
}

/// Starts the orchestrator process without waiting for it to exit.
#[automock]
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> SupervisorResult<()>;
}

/// A sequencer step backed by an external command.
#[derive(Debug, Clone)]
pub struct ShellStep {
    command: ShellCommand,
}

impl ShellStep {
    pub fn new(command: ShellCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl StateSync for ShellStep {
    async fn sync(&self) -> SupervisorResult<()> {
        self.command.run().await
    }
}

#[async_trait]
impl ReachabilityProbe for ShellStep {
    async fn probe(&self) -> SupervisorResult<bool> {
        self.command.succeeds().await
    }
}

#[async_trait]
impl Remediation for ShellStep {
    async fn remediate(&self) -> SupervisorResult<()> {
        self.command.run().await
    }
}

#[async_trait]
impl Launcher for ShellStep {
    async fn launch(&self) -> SupervisorResult<()> {
        let pid = self.command.spawn()?;
        info!(command = %self.command, ?pid, "Orchestrator launched");
        Ok(())
    }
}

/// What one sequence run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceReport {
    pub synced: bool,
    /// `None` when the probe itself could not run.
    pub reachable: Option<bool>,
    pub remediated: bool,
}

/// Host preparation followed by the orchestrator launch.
///
/// Order: sync, probe, remediation when the probe says unreachable, launch.
/// Failures of the first three steps are logged and the sequence continues;
/// only a failed launch fails the sequence.
pub struct StartupSequencer {
    state_sync: Arc<dyn StateSync>,
    probe: Arc<dyn ReachabilityProbe>,
    remediation: Arc<dyn Remediation>,
    launcher: Arc<dyn Launcher>,
}

impl StartupSequencer {
    pub fn new(
        state_sync: Arc<dyn StateSync>,
        probe: Arc<dyn ReachabilityProbe>,
        remediation: Arc<dyn Remediation>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            state_sync,
            probe,
            remediation,
            launcher,
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(
            Arc::new(ShellStep::new(config.sync_command.clone())),
            Arc::new(ShellStep::new(config.probe_command.clone())),
            Arc::new(ShellStep::new(config.remediation_command.clone())),
            Arc::new(ShellStep::new(config.launch_command.clone())),
        )
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn run(&self) -> SupervisorResult<SequenceReport> {
        info!("Running startup sequence");

        let synced = match self.state_sync.sync().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "State sync failed");
                false
            }
        };

        let reachable = match self.probe.probe().await {
            Ok(reachable) => Some(reachable),
            Err(e) => {
                warn!(error = %e, "Reachability probe failed");
                None
            }
        };

        let mut remediated = false;
        if reachable == Some(false) {
            warn!("Network unreachable, running remediation");
            match self.remediation.remediate().await {
                Ok(()) => remediated = true,
                Err(e) => warn!(error = %e, "Remediation failed"),
            }
        }

        self.launcher.launch().await?;

        let report = SequenceReport {
            synced,
            reachable,
            remediated,
        };
        info!(?report, "Startup sequence complete");
        Ok(report)
    }
}
