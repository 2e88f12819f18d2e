use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::event_bus::{ErrorEvent, ErrorSeverity, EventBus, StatusEvent, TriggerEvent};
use crate::unit_registry::UnitRegistry;

/// Status text for a trigger whose task was cut off before the unit answered.
pub const ABANDONED_TEXT: &str = "Abandoned at shutdown";

/// Boundary between the event channels and the dispatcher.
///
/// Every trigger is handed to the dispatcher and answered with exactly one
/// status message.
pub struct EventGateway {
    event_bus: Arc<EventBus>,
    agents: UnitRegistry,
    dispatcher: Dispatcher,
}

impl EventGateway {
    pub fn new(event_bus: Arc<EventBus>, agents: UnitRegistry, dispatcher: Dispatcher) -> Self {
        Self {
            event_bus,
            agents,
            dispatcher,
        }
    }

    /// Dispatches one trigger and publishes its status, which is also returned.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn handle(&self, trigger: TriggerEvent) -> StatusEvent {
        let result = self
            .dispatcher
            .dispatch(&self.agents, &trigger.agent_name, &trigger.task)
            .await;
        let status = StatusEvent::from_dispatch(&result);

        if let Err(e) = self.event_bus.publish_status(status.clone()) {
            warn!(error = %e, agent = %status.agent_name, "Failed to publish status");
            let _ = self.event_bus.publish_error(
                ErrorEvent::new("StatusPublishFailure", e.to_string(), ErrorSeverity::Error)
                    .with_parameter("agent", status.agent_name.clone()),
            );
        }
        status
    }

    /// Consumes triggers until `shutdown_rx` fires, handling each in its own
    /// task. In-flight triggers are finished before returning, so none is
    /// left without a status. If this future is dropped instead, each trigger
    /// still in flight is answered with a failed status.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut triggers = self.event_bus.triggers().await;
        let mut in_flight = JoinSet::new();
        info!("Event gateway started");

        loop {
            tokio::select! {
                maybe_trigger = triggers.recv() => {
                    let Some(trigger) = maybe_trigger else {
                        debug!("Trigger channel closed");
                        break;
                    };
                    let gateway = self.clone();
                    let unanswered = Unanswered::new(self.event_bus.clone(), &trigger);
                    in_flight.spawn(async move {
                        gateway.handle(trigger).await;
                        unanswered.disarm();
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Trigger task aborted");
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Event gateway received shutdown signal");
                    break;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Trigger task aborted");
            }
        }
        info!("Event gateway stopped");
    }
}

/// Publishes a failed status for its trigger when dropped while still armed,
/// which happens when the trigger task is aborted mid-dispatch.
struct Unanswered {
    event_bus: Arc<EventBus>,
    trigger: Option<TriggerEvent>,
}

impl Unanswered {
    fn new(event_bus: Arc<EventBus>, trigger: &TriggerEvent) -> Self {
        Self {
            event_bus,
            trigger: Some(trigger.clone()),
        }
    }

    fn disarm(mut self) {
        self.trigger = None;
    }
}

impl Drop for Unanswered {
    fn drop(&mut self) {
        let Some(trigger) = self.trigger.take() else {
            return;
        };
        warn!(agent = %trigger.agent_name, task = %trigger.task, "Trigger abandoned before completion");
        let status = StatusEvent::from_dispatch(&DispatchResult::TaskFailed {
            unit_name: trigger.agent_name,
            message: ABANDONED_TEXT.to_string(),
        });
        if let Err(e) = self.event_bus.publish_status(status) {
            debug!(error = %e, "Failed to publish abandoned status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, Capability};
    use crate::dispatcher::Outcome;
    use crate::unit::{Unit, UnitDescriptor, UnitKind, UnitResult};
    use async_trait::async_trait;

    struct Yoda;

    #[async_trait]
    impl Unit for Yoda {
        fn display_name(&self) -> String {
            "Yoda".to_string()
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::from(Capability::ExecuteTask)
        }

        async fn execute_task(&self, task: &str) -> UnitResult<String> {
            Ok(format!("Do or do not: {task}"))
        }
    }

    fn gateway() -> (Arc<EventBus>, Arc<EventGateway>) {
        let bus = Arc::new(EventBus::new(16));
        let agents = UnitRegistry::new(UnitKind::Agent);
        agents
            .register(UnitDescriptor::new("yoda", UnitKind::Agent, "Yoda", Arc::new(Yoda)))
            .unwrap();
        let gateway = Arc::new(EventGateway::new(bus.clone(), agents, Dispatcher::default()));
        (bus, gateway)
    }

    #[tokio::test]
    async fn test_handle_publishes_one_status() {
        let (bus, gateway) = gateway();
        let mut statuses = bus.subscribe_status();

        let returned = gateway.handle(TriggerEvent::new("yoda", "train")).await;
        let published = statuses.recv().await.unwrap();

        assert_eq!(returned, published);
        assert_eq!(published.outcome, Outcome::Success);
        assert_eq!(published.result, "Do or do not: train");
    }

    struct Stuck(Arc<tokio::sync::Notify>);

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

    #[tokio::test]
    async fn test_aborted_gateway_still_answers_in_flight_trigger() {
        let (bus, gateway) = gateway();
        let entered = Arc::new(tokio::sync::Notify::new());
        gateway
            .agents
            .register(UnitDescriptor::new(
                "stuck",
                UnitKind::Agent,
                "Stuck",
                Arc::new(Stuck(entered.clone())),
            ))
            .unwrap();
        let mut statuses = bus.subscribe_status();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(gateway.run(shutdown_rx));

        bus.publish_trigger(TriggerEvent::new("stuck", "wait")).await.unwrap();
        entered.notified().await;
        handle.abort();

        let status = statuses.recv().await.unwrap();
        assert_eq!(status.agent_name, "stuck");
        assert_eq!(status.outcome, Outcome::TaskFailed);
        assert_eq!(status.result, format!("Task failed: {ABANDONED_TEXT}"));
    }

    #[tokio::test]
    async fn test_run_answers_queued_triggers_then_stops() {
        let (bus, gateway) = gateway();
        let mut statuses = bus.subscribe_status();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(gateway.run(shutdown_rx));

        bus.publish_trigger(TriggerEvent::new("yoda", "a")).await.unwrap();
        bus.publish_trigger(TriggerEvent::new("ghost", "b")).await.unwrap();

        let mut outcomes = vec![
            statuses.recv().await.unwrap().outcome,
            statuses.recv().await.unwrap().outcome,
        ];
        outcomes.sort_by_key(|o| o.to_string());
        assert_eq!(outcomes, vec![Outcome::Success, Outcome::UnitNotFound]);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
