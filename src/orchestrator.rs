use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::catalog::UnitCatalog;
use crate::config::OrchestratorConfig;
use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::event_bus::{EventBus, StatusEvent, TriggerEvent};
use crate::gateway::EventGateway;
use crate::health_loop::{HealthLoop, LoopStatus};
use crate::loader::{DiscoveryError, DiscoveryReport, UnitLoader};
use crate::unit_registry::Registries;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Orchestrator is already running")]
    AlreadyRunning,

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Discovery failed for {} artifact(s)", .failures.len())]
    DiscoveryFailed { failures: Vec<DiscoveryError> },

    #[error("Shutdown did not finish within {timeout_ms}ms")]
    ShutdownTimeout { timeout_ms: u64 },
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Units found by one startup.
#[derive(Debug)]
pub struct StartupReport {
    pub agents: DiscoveryReport,
    pub modules: DiscoveryReport,
}

impl StartupReport {
    pub fn registered(&self) -> usize {
        self.agents.registered.len() + self.modules.registered.len()
    }
}

/// Owns the registries and the background activities around them.
///
/// `start` runs discovery to completion before the health loop and the event
/// gateway are spawned; `shutdown` signals both and waits for them. The pair
/// may be repeated: discovery skips names that are already registered, so a
/// restart reaches the same registries.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registries: Registries,
    loader: UnitLoader,
    event_bus: Arc<EventBus>,
    dispatcher: Dispatcher,
    gateway: Arc<EventGateway>,
    health: Arc<HealthLoop>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, catalog: UnitCatalog) -> Self {
        let registries = Registries::new();
        let loader = UnitLoader::new(Arc::new(catalog), &config.discovery.artifact_extension);
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let dispatcher = Dispatcher::new(config.invocation_timeout);
        let gateway = Arc::new(EventGateway::new(
            event_bus.clone(),
            registries.agents.clone(),
            dispatcher,
        ));
        let health = Arc::new(HealthLoop::new(
            registries.clone(),
            event_bus.clone(),
            config.health.pass_interval,
            config.invocation_timeout,
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            registries,
            loader,
            event_bus,
            dispatcher,
            gateway,
            health,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn health_status(&self) -> LoopStatus {
        self.health.status().await
    }

    /// Scans both unit directories into the registries.
    pub fn discover(&self) -> OrchestratorResult<StartupReport> {
        let discovery = &self.config.discovery;
        let agents = self
            .loader
            .discover(&discovery.agents_dir, &self.registries.agents)?;
        let modules = self
            .loader
            .discover(&discovery.modules_dir, &self.registries.modules)?;
        Ok(StartupReport { agents, modules })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn start(&self) -> OrchestratorResult<StartupReport> {
        // held for the whole start so a concurrent shutdown waits for it
        let mut tasks = self.tasks.lock().await;
        if self.running.load(Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let report = self.checked_discovery()?;

        // receivers exist before the tasks do, so an early shutdown is not missed
        if self.config.health.enabled {
            let health = self.health.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move { health.run(shutdown_rx).await }));
        }
        let gateway = self.gateway.clone();
        tasks.push(tokio::spawn(gateway.run(self.shutdown_tx.subscribe())));
        self.running.store(true, Ordering::SeqCst);

        info!(
            agents = self.registries.agents.len(),
            modules = self.registries.modules.len(),
            "Orchestrator started"
        );
        Ok(report)
    }

    fn checked_discovery(&self) -> OrchestratorResult<StartupReport> {
        let mut report = self.discover()?;
        let failed = report.agents.failures.len() + report.modules.failures.len();
        if failed == 0 {
            return Ok(report);
        }

        if self.config.discovery.strict {
            for failure in report.agents.failures.iter().chain(&report.modules.failures) {
                error!(error = %failure, "Artifact could not be loaded");
            }
            let mut failures = std::mem::take(&mut report.agents.failures);
            failures.append(&mut report.modules.failures);
            return Err(OrchestratorError::DiscoveryFailed { failures });
        }

        warn!(failed, "Continuing with partially loaded units");
        Ok(report)
    }

    /// Runs `task` on agent `unit_name` directly, without the event channels.
    pub async fn dispatch(&self, unit_name: &str, task: &str) -> DispatchResult {
        self.dispatcher
            .dispatch(&self.registries.agents, unit_name, task)
            .await
    }

    /// Handles one trigger in place; its status is published and returned.
    pub async fn trigger(&self, trigger: TriggerEvent) -> StatusEvent {
        self.gateway.handle(trigger).await
    }

    /// Signals the background tasks and waits up to `shutdown_timeout` for
    /// them. Tasks still running after that are aborted; triggers they were
    /// still working on are answered with a failed status.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn shutdown(&self) -> OrchestratorResult<()> {
        let mut handles = self.tasks.lock().await;
        if !self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(());
        let tasks: Vec<JoinHandle<()>> = handles.drain(..).collect();
        let aborts: Vec<_> = tasks.iter().map(|task| task.abort_handle()).collect();

        let timeout = self.config.shutdown_timeout;
        let result = match tokio::time::timeout(timeout, futures::future::join_all(tasks)).await {
            Ok(joined) => {
                for e in joined.into_iter().filter_map(Result::err) {
                    warn!(error = %e, "Background task ended abnormally");
                }
                Ok(())
            }
            Err(_) => {
                aborts.iter().for_each(|abort| abort.abort());
                Err(OrchestratorError::ShutdownTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        self.running.store(false, Ordering::SeqCst);
        info!("Orchestrator stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, Capability};
    use crate::unit::{Unit, UnitResult};
    use async_trait::async_trait;
    use crate::dispatcher::Outcome;
    use crate::gateway::ABANDONED_TEXT;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    struct Senku;

    #[async_trait]
    impl Unit for Senku {
        fn display_name(&self) -> String {
            "Senku".to_string()
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::from([Capability::ExecuteTask, Capability::SelfImprove])
        }

        async fn execute_task(&self, task: &str) -> UnitResult<String> {
            Ok(format!("Ten billion percent: {task}"))
        }

        async fn self_improve(&self) -> UnitResult<String> {
            Ok(String::new())
        }
    }

    fn config(root: &TempDir) -> OrchestratorConfig {
        let agents = root.path().join("agents");
        let modules = root.path().join("modules");
        fs::create_dir_all(&agents).unwrap();
        fs::create_dir_all(&modules).unwrap();
        fs::write(agents.join("senku.unit"), "").unwrap();

        let mut config = OrchestratorConfig::default();
        config.discovery.agents_dir = agents;
        config.discovery.modules_dir = modules;
        config
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator =
            Orchestrator::new(config(&root), UnitCatalog::new().with_agent("Senku", || Senku));

        let report = orchestrator.start().await.unwrap();
        assert_eq!(report.registered(), 1);
        assert!(matches!(
            orchestrator.start().await,
            Err(OrchestratorError::AlreadyRunning)
        ));

        orchestrator.shutdown().await.unwrap();
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_strict_discovery_blocks_startup() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&root), UnitCatalog::new());

        match orchestrator.start().await {
            Err(OrchestratorError::DiscoveryFailed { failures }) => assert_eq!(failures.len(), 1),
            other => panic!("unexpected start result: {other:?}"),
        }
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_lenient_discovery_starts_anyway() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config(&root);
        config.discovery.strict = false;
        let orchestrator = Orchestrator::new(config, UnitCatalog::new());

        let report = orchestrator.start().await.unwrap();
        assert_eq!(report.agents.failures.len(), 1);
        assert!(orchestrator.registries().agents.is_empty());
        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_and_trigger() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator =
            Orchestrator::new(config(&root), UnitCatalog::new().with_agent("Senku", || Senku));
        orchestrator.start().await.unwrap();

        let result = orchestrator.dispatch("senku", "rocket").await;
        assert!(result.is_success());

        let mut statuses = orchestrator.event_bus().subscribe_status();
        let status = orchestrator.trigger(TriggerEvent::new("senku", "cola")).await;
        assert_eq!(status.result, "Ten billion percent: cola");
        assert_eq!(statuses.recv().await.unwrap(), status);

        orchestrator.shutdown().await.unwrap();
    }

    struct Stuck(Arc<Notify>);

    #[async_trait]
    impl Unit for Stuck {
        fn display_name(&self) -> String {
            "Stuck".to_string()
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::from(Capability::ExecuteTask)
        }

        async fn execute_task(&self, _task: &str) -> UnitResult<String> {
            self.0.notify_one();
            std::future::pending().await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_racing_start_leaves_nothing_running() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config(&root);
        config.health.pass_interval = Duration::from_millis(1);
        let orchestrator = Arc::new(Orchestrator::new(
            config,
            UnitCatalog::new().with_agent("Senku", || Senku),
        ));

        for _ in 0..20 {
            let starting = {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.start().await })
            };
            let stopping = {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.shutdown().await })
            };
            starting.await.unwrap().unwrap();
            stopping.await.unwrap().unwrap();

            orchestrator.shutdown().await.unwrap();
            assert!(!orchestrator.is_running());
            assert!(orchestrator.tasks.lock().await.is_empty());
            assert_eq!(orchestrator.health_status().await, LoopStatus::Inactive);
        }
    }

    #[tokio::test]
    async fn test_shutdown_timeout_answers_in_flight_trigger() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config(&root);
        fs::write(root.path().join("agents").join("stuck.unit"), "").unwrap();
        config.shutdown_timeout = Duration::from_millis(50);
        config.health.enabled = false;

        let entered = Arc::new(Notify::new());
        let notify = entered.clone();
        let catalog = UnitCatalog::new()
            .with_agent("Senku", || Senku)
            .with_agent("Stuck", move || Stuck(notify.clone()));
        let orchestrator = Orchestrator::new(config, catalog);
        orchestrator.start().await.unwrap();

        let bus = orchestrator.event_bus();
        let mut statuses = bus.subscribe_status();
        bus.publish_trigger(TriggerEvent::new("stuck", "wait")).await.unwrap();
        entered.notified().await;

        assert!(matches!(
            orchestrator.shutdown().await,
            Err(OrchestratorError::ShutdownTimeout { timeout_ms: 50 })
        ));
        let status = tokio::time::timeout(Duration::from_secs(1), statuses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.agent_name, "stuck");
        assert_eq!(status.outcome, Outcome::TaskFailed);
        assert!(status.result.contains(ABANDONED_TEXT));
    }
}
