use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::capability::Capability;
use crate::event_bus::{ErrorEvent, ErrorSeverity, EventBus};
use crate::unit::{UnitDescriptor, UnitError, UnitKind};
use crate::unit_registry::Registries;

pub const HOOK_FAILURE_EVENT: &str = "HookInvocationFailure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LoopStatus {
    Inactive,
    Active,
}

/// One hook that failed during a pass. The pass carried on regardless.
#[derive(Debug, Clone, PartialEq)]
pub struct HookFailure {
    pub unit_name: String,
    pub kind: UnitKind,
    pub hook: Capability,
    pub error: UnitError,
}

#[derive(Debug, Clone)]
pub struct PassReport {
    /// 1-based pass counter since the loop was created.
    pub pass: u64,
    /// Hooks invoked, successful or not.
    pub invoked: usize,
    pub failures: Vec<HookFailure>,
    pub finished_at: DateTime<Utc>,
}

/// Background maintenance over both registries.
///
/// Each pass walks the agents and then the modules, invoking the maintenance
/// hooks each unit declares in [`UnitKind::maintenance_hooks`] order. A failing
/// or panicking hook is logged, published as an error event and skipped; the
/// remaining hooks of that unit and all other units still run. A unit that is
/// busy with a dispatch is skipped for the pass rather than waited on.
pub struct HealthLoop {
    registries: Registries,
    event_bus: Arc<EventBus>,
    pass_interval: Duration,
    invocation_timeout: Option<Duration>,
    status: RwLock<LoopStatus>,
    passes: AtomicU64,
}

impl HealthLoop {
    pub fn new(
        registries: Registries,
        event_bus: Arc<EventBus>,
        pass_interval: Duration,
        invocation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registries,
            event_bus,
            pass_interval,
            invocation_timeout,
            status: RwLock::new(LoopStatus::Inactive),
            passes: AtomicU64::new(0),
        }
    }

    pub async fn status(&self) -> LoopStatus {
        *self.status.read().await
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// One pass over every registered unit.
    pub async fn run_pass(&self) -> PassReport {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let mut invoked = 0;
        let mut failures = Vec::new();

        for registry in [&self.registries.agents, &self.registries.modules] {
            for descriptor in registry.snapshot() {
                invoked += self.maintain(&descriptor, &mut failures).await;
            }
        }

        debug!(pass, invoked, failed = failures.len(), "Health pass finished");
        PassReport {
            pass,
            invoked,
            failures,
            finished_at: Utc::now(),
        }
    }

    async fn maintain(&self, descriptor: &UnitDescriptor, failures: &mut Vec<HookFailure>) -> usize {
        let mut invoked = 0;
        for hook in descriptor.kind().maintenance_hooks() {
            if !descriptor.supports(hook) {
                continue;
            }
            invoked += 1;
            match descriptor.run_hook(*hook, self.invocation_timeout).await {
                Ok(report) if report.is_empty() => {}
                Ok(report) => info!(unit = %descriptor.name(), %hook, "{}", report),
                Err(error) => {
                    warn!(unit = %descriptor.name(), %hook, error = %error, "Hook invocation failed");
                    let event = ErrorEvent::new(HOOK_FAILURE_EVENT, error.to_string(), ErrorSeverity::Warning)
                        .with_parameter("unit", descriptor.name())
                        .with_parameter("kind", descriptor.kind().to_string())
                        .with_parameter("hook", hook.to_string());
                    if let Err(e) = self.event_bus.publish_error(event) {
                        debug!(error = %e, "Failed to publish hook failure");
                    }
                    let busy = matches!(error, UnitError::Busy { .. });
                    failures.push(HookFailure {
                        unit_name: descriptor.name().to_string(),
                        kind: descriptor.kind(),
                        hook: *hook,
                        error,
                    });
                    if busy {
                        // held by an in-flight dispatch; try again next pass
                        break;
                    }
                }
            }
        }
        invoked
    }

    /// Runs passes back to back, `pass_interval` apart, until `shutdown_rx`
    /// fires. A pass in progress is abandoned at shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        *self.status.write().await = LoopStatus::Active;
        info!(interval_ms = self.pass_interval.as_millis() as u64, "Health loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = self.run_pass() => {}
            }

            if self.pass_interval.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.pass_interval) => {}
            }
        }

        *self.status.write().await = LoopStatus::Inactive;
        info!(passes = self.passes(), "Health loop stopped");
    }
}
