use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::Capability;
use crate::unit::UnitError;
use crate::unit_registry::UnitRegistry;

pub const UNIT_NOT_FOUND_TEXT: &str = "Agent not found";
pub const UNSUPPORTED_TEXT: &str = "Task execution not supported";

/// How a dispatch ended, as carried on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Success,
    UnitNotFound,
    UnsupportedCapability,
    TaskFailed,
}

/// Result of routing one task to one unit. Failures are values, never `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    Success { unit_name: String, result: String },
    UnitNotFound { unit_name: String },
    UnsupportedCapability {
        unit_name: String,
        capability: Capability,
    },
    /// The unit ran `execute_task` and it errored, panicked or timed out.
    TaskFailed { unit_name: String, message: String },
}

impl DispatchResult {
    pub fn unit_name(&self) -> &str {
        match self {
            DispatchResult::Success { unit_name, .. }
            | DispatchResult::UnitNotFound { unit_name }
            | DispatchResult::UnsupportedCapability { unit_name, .. }
            | DispatchResult::TaskFailed { unit_name, .. } => unit_name,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            DispatchResult::Success { .. } => Outcome::Success,
            DispatchResult::UnitNotFound { .. } => Outcome::UnitNotFound,
            DispatchResult::UnsupportedCapability { .. } => Outcome::UnsupportedCapability,
            DispatchResult::TaskFailed { .. } => Outcome::TaskFailed,
        }
    }

    /// Text published in the `result` field of a status message.
    pub fn result_text(&self) -> String {
        match self {
            DispatchResult::Success { result, .. } => result.clone(),
            DispatchResult::UnitNotFound { .. } => UNIT_NOT_FOUND_TEXT.to_string(),
            DispatchResult::UnsupportedCapability { .. } => UNSUPPORTED_TEXT.to_string(),
            DispatchResult::TaskFailed { message, .. } => format!("Task failed: {message}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success { .. })
    }
}

/// Routes tasks to the `execute_task` capability of registered units.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    invocation_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(invocation_timeout: Option<Duration>) -> Self {
        Self { invocation_timeout }
    }

    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout
    }

    /// Looks `unit_name` up and runs the task on it, waiting for the result.
    ///
    /// With no timeout configured a unit that never returns holds this call
    /// forever.
    #[tracing::instrument(skip(self, registry, task), level = "debug")]
    pub async fn dispatch(
        &self,
        registry: &UnitRegistry,
        unit_name: &str,
        task: &str,
    ) -> DispatchResult {
        let Some(descriptor) = registry.get(unit_name) else {
            debug!("Unit not found");
            return DispatchResult::UnitNotFound {
                unit_name: unit_name.to_string(),
            };
        };

        if !descriptor.supports(&Capability::ExecuteTask) {
            debug!("Unit does not execute tasks");
            return DispatchResult::UnsupportedCapability {
                unit_name: unit_name.to_string(),
                capability: Capability::ExecuteTask,
            };
        }

        match descriptor.execute_task(task, self.invocation_timeout).await {
            Ok(result) => DispatchResult::Success {
                unit_name: unit_name.to_string(),
                result,
            },
            // declared but not overridden; same as not declared
            Err(UnitError::NotImplemented { capability }) => {
                warn!(%capability, "Unit declares a capability it does not implement");
                DispatchResult::UnsupportedCapability {
                    unit_name: unit_name.to_string(),
                    capability,
                }
            }
            Err(e) => {
                warn!(error = %e, "Task failed");
                DispatchResult::TaskFailed {
                    unit_name: unit_name.to_string(),
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Dispatch without an invocation timeout.
pub async fn dispatch(registry: &UnitRegistry, unit_name: &str, task: &str) -> DispatchResult {
    Dispatcher::default().dispatch(registry, unit_name, task).await
}
