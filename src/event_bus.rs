use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

use crate::dispatcher::{DispatchResult, Outcome};

/// Channel carrying inbound task requests.
pub const TRIGGER_CHANNEL: &str = "trigger";
/// Channel carrying one result notification per request.
pub const STATUS_CHANNEL: &str = "status_update";

/// Inbound request: wire form `{ "agent": string, "task": string }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "agent")]
    pub agent_name: String,
    pub task: String,
}

impl TriggerEvent {
    pub fn new(agent_name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            task: task.into(),
        }
    }

    pub fn from_wire(payload: &str) -> EventResult<Self> {
        serde_json::from_str(payload).map_err(|e| EventError::InvalidPayload {
            channel: TRIGGER_CHANNEL,
            message: e.to_string(),
        })
    }
}

/// Outbound notification: wire form `{ "agent": string, "result": string, "outcome": string }`.
///
/// `result` alone already tells success from the failure kinds; `outcome`
/// names the kind explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "agent")]
    pub agent_name: String,
    pub result: String,
    pub outcome: Outcome,
}

impl StatusEvent {
    pub fn from_dispatch(result: &DispatchResult) -> Self {
        Self {
            agent_name: result.unit_name().to_string(),
            result: result.result_text(),
            outcome: result.outcome(),
        }
    }

    pub fn to_wire(&self) -> EventResult<String> {
        serde_json::to_string(self).map_err(|e| EventError::InvalidPayload {
            channel: STATUS_CHANNEL,
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
pub enum ErrorSeverity {
    #[default]
    Warning,
    Error,
    Critical,
}

/// Failure that was isolated and swallowed somewhere in the runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error_type: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub parameters: HashMap<String, String>,
}

impl ErrorEvent {
    pub fn new(error_type: &str, message: impl Into<String>, severity: ErrorSeverity) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: message.into(),
            severity,
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// # EventBus
///
/// Three channels:
/// 1. `trigger`: bounded mpsc queue. Each request is consumed exactly once by
///    whoever holds the [`TriggerReceiver`].
/// 2. `status_update`: broadcast, every observer sees every status.
/// 3. errors: broadcast of [`ErrorEvent`]s.
///
/// The bus owns one receiver per broadcast channel so publishing never fails
/// for lack of subscribers.
pub struct EventBus {
    trigger_sender: mpsc::Sender<TriggerEvent>,
    trigger_receiver: Arc<Mutex<mpsc::Receiver<TriggerEvent>>>,
    status_sender: broadcast::Sender<StatusEvent>,
    error_sender: broadcast::Sender<ErrorEvent>,
    capacity: usize,
    _internal_status_receiver: broadcast::Receiver<StatusEvent>,
    _internal_error_receiver: broadcast::Receiver<ErrorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (trigger_sender, trigger_receiver) = mpsc::channel(capacity);
        let (status_sender, status_receiver) = broadcast::channel(capacity);
        let (error_sender, error_receiver) = broadcast::channel(capacity);
        Self {
            trigger_sender,
            trigger_receiver: Arc::new(Mutex::new(trigger_receiver)),
            status_sender,
            error_sender,
            capacity,
            _internal_status_receiver: status_receiver,
            _internal_error_receiver: error_receiver,
        }
    }

    /// Queues a request. Waits while the queue is full.
    pub async fn publish_trigger(&self, event: TriggerEvent) -> EventResult<()> {
        debug!(channel = TRIGGER_CHANNEL, agent = %event.agent_name, "Publishing");
        self.trigger_sender
            .send(event)
            .await
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })
    }

    /// Exclusive access to the trigger queue. A second caller waits until the
    /// first receiver is dropped, so requests are never split between consumers.
    pub async fn triggers(&self) -> TriggerReceiver {
        TriggerReceiver {
            receiver: self.trigger_receiver.clone().lock_owned().await,
        }
    }

    pub fn publish_status(&self, event: StatusEvent) -> EventResult<()> {
        trace!(channel = STATUS_CHANNEL, status = ?event, "Publishing");
        self.status_sender
            .send(event)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub fn subscribe_status(&self) -> StatusReceiver {
        StatusReceiver {
            receiver: self.status_sender.subscribe(),
        }
    }

    pub fn publish_error(&self, error: ErrorEvent) -> EventResult<()> {
        self.error_sender
            .send(error)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub fn subscribe_errors(&self) -> ErrorReceiver {
        ErrorReceiver {
            receiver: self.error_sender.subscribe(),
        }
    }

    pub fn pending_triggers(&self) -> usize {
        self.capacity - self.trigger_sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct TriggerReceiver {
    receiver: OwnedMutexGuard<mpsc::Receiver<TriggerEvent>>,
}

impl TriggerReceiver {
    /// Next request, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<TriggerEvent> {
        self.receiver.recv().await
    }
}

pub struct StatusReceiver {
    receiver: broadcast::Receiver<StatusEvent>,
}

impl StatusReceiver {
    /// On lag the receiver skips to the oldest retained message and reports
    /// how many were missed.
    pub async fn recv(&mut self) -> EventResult<StatusEvent> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(EventError::Lagged { count: n })
            }
            Err(broadcast::error::RecvError::Closed) => Err(EventError::Closed),
        }
    }
}

pub struct ErrorReceiver {
    receiver: broadcast::Receiver<ErrorEvent>,
}

impl ErrorReceiver {
    pub async fn recv(&mut self) -> EventResult<ErrorEvent> {
        self.receiver
            .recv()
            .await
            .map_err(|e| EventError::ReceiveFailed {
                message: e.to_string(),
            })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Event send failed: {message}")]
    SendFailed { message: String },

    #[error("Event receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Event lagged: {count}")]
    Lagged { count: u64 },

    #[error("Event channel closed")]
    Closed,

    #[error("Invalid payload on {channel}: {message}")]
    InvalidPayload {
        channel: &'static str,
        message: String,
    },
}

pub type EventResult<T> = Result<T, EventError>;
