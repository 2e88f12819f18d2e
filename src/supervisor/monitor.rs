use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::sequencer::StartupSequencer;
use super::SupervisorResult;

/// Decides whether the running system needs healing.
#[automock]
#[async_trait]
pub trait AnomalyDetector: Send + Sync {
    async fn detect(&self) -> SupervisorResult<bool>;
}

/// Never reports an anomaly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnomaly;

#[async_trait]
impl AnomalyDetector for NoAnomaly {
    async fn detect(&self) -> SupervisorResult<bool> {
        Ok(false)
    }
}

/// Action taken when an anomaly is detected.
#[automock]
#[async_trait]
pub trait HealingProtocol: Send + Sync {
    async fn heal(&self) -> SupervisorResult<()>;
}

#[async_trait]
impl HealingProtocol for StartupSequencer {
    async fn heal(&self) -> SupervisorResult<()> {
        self.run().await.map(|_| ())
    }
}

/// Outer watchdog: polls the detector every `interval` and heals on a hit.
pub struct Monitor {
    detector: Arc<dyn AnomalyDetector>,
    healer: Arc<dyn HealingProtocol>,
    interval: Duration,
    checks: AtomicU64,
    heals: AtomicU64,
}

impl Monitor {
    pub fn new(
        detector: Arc<dyn AnomalyDetector>,
        healer: Arc<dyn HealingProtocol>,
        interval: Duration,
    ) -> Self {
        Self {
            detector,
            healer,
            interval,
            checks: AtomicU64::new(0),
            heals: AtomicU64::new(0),
        }
    }

    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn heals(&self) -> u64 {
        self.heals.load(Ordering::SeqCst)
    }

    /// One detector poll. Returns whether healing was triggered.
    pub async fn check_once(&self) -> SupervisorResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if !self.detector.detect().await? {
            debug!("No anomaly detected");
            return Ok(false);
        }

        warn!("Anomaly detected, triggering self-healing");
        self.heals.fetch_add(1, Ordering::SeqCst);
        self.healer.heal().await?;
        info!("Self-healing completed");
        Ok(true)
    }

    /// Polls until `shutdown_rx` fires. Errors are logged and polling goes on.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Monitor started");
        loop {
            if let Err(e) = self.check_once().await {
                warn!(error = %e, "Monitoring check failed");
            }
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!(checks = self.checks(), heals = self.heals(), "Monitor stopped");
    }
}
