use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::capability::{Capabilities, Capability};

/// The two unit families. Each lives in its own registry and has its own
/// artifact naming rule and maintenance hook sequence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnitKind {
    Agent,
    Module,
}

impl UnitKind {
    /// Hooks the health loop invokes on this kind of unit, in invocation order.
    pub fn maintenance_hooks(&self) -> &'static [Capability] {
        match self {
            UnitKind::Agent => &[
                Capability::SelfDiagnose,
                Capability::OptimizeResources,
                Capability::SelfImprove,
            ],
            UnitKind::Module => &[Capability::RunBackgroundTasks, Capability::SelfImprove],
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Capability not implemented: {capability}")]
    NotImplemented { capability: Capability },
    #[error("{capability} failed: {message}")]
    Failed {
        capability: Capability,
        message: String,
    },
    #[error("{capability} panicked: {message}")]
    Panicked {
        capability: Capability,
        message: String,
    },
    #[error("{capability} skipped: unit busy with another invocation")]
    Busy { capability: Capability },
    #[error("{capability} timed out after {timeout_ms}ms")]
    TimedOut {
        capability: Capability,
        timeout_ms: u64,
    },
    #[error("Unit construction failed: {message}")]
    Construction { message: String },
}

impl UnitError {
    pub fn failed<S: Into<String>>(capability: Capability, message: S) -> Self {
        UnitError::Failed {
            capability,
            message: message.into(),
        }
    }

    pub fn construction<S: Into<String>>(message: S) -> Self {
        UnitError::Construction {
            message: message.into(),
        }
    }
}

pub type UnitResult<T> = Result<T, UnitError>;

/// A pluggable agent or module.
///
/// Every operation besides [`Unit::display_name`] and [`Unit::capabilities`] is
/// optional. Implementors override the operations they support and list them
/// in `capabilities()`; callers never invoke an operation that is not listed.
/// An empty `Ok` string means "nothing to report".
#[async_trait]
pub trait Unit: Send + Sync {
    fn display_name(&self) -> String;

    fn capabilities(&self) -> Capabilities;

    async fn execute_task(&self, _task: &str) -> UnitResult<String> {
        Err(UnitError::NotImplemented {
            capability: Capability::ExecuteTask,
        })
    }

    async fn self_diagnose(&self) -> UnitResult<String> {
        Err(UnitError::NotImplemented {
            capability: Capability::SelfDiagnose,
        })
    }

    async fn optimize_resources(&self) -> UnitResult<String> {
        Err(UnitError::NotImplemented {
            capability: Capability::OptimizeResources,
        })
    }

    async fn self_improve(&self) -> UnitResult<String> {
        Err(UnitError::NotImplemented {
            capability: Capability::SelfImprove,
        })
    }

    async fn run_background_tasks(&self) -> UnitResult<String> {
        Err(UnitError::NotImplemented {
            capability: Capability::RunBackgroundTasks,
        })
    }
}

/// A registered unit: its registry key, the resolved type, the declared
/// capability set and the live instance.
///
/// Cloning is cheap and clones share the instance and its invocation gate.
#[derive(Clone)]
pub struct UnitDescriptor {
    name: String,
    kind: UnitKind,
    type_name: String,
    capabilities: Capabilities,
    registered_at: DateTime<Utc>,
    unit: Arc<dyn Unit>,
    // units are non-reentrant; one invocation per unit at a time
    gate: Arc<Mutex<()>>,
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// What an invocation does when another one already holds the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateWait {
    Queue,
    SkipIfBusy,
}

impl UnitDescriptor {
    pub fn new(name: &str, kind: UnitKind, type_name: &str, unit: Arc<dyn Unit>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            type_name: type_name.to_string(),
            capabilities: unit.capabilities(),
            registered_at: Utc::now(),
            unit,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn display_name(&self) -> String {
        self.unit.display_name()
    }

    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.supports(capability)
    }

    /// Runs `execute_task` on the unit.
    ///
    /// Queues behind any invocation already running on this unit. The `limit`
    /// covers the wait as well as the call; without one a unit that never
    /// returns blocks the caller forever.
    pub async fn execute_task(&self, task: &str, limit: Option<Duration>) -> UnitResult<String> {
        let capability = Capability::ExecuteTask;
        if !self.supports(&capability) {
            return Err(UnitError::NotImplemented { capability });
        }
        let unit = self.unit.clone();
        self.guarded(capability, limit, GateWait::Queue, async move {
            unit.execute_task(task).await
        })
        .await
    }

    /// Runs one of the maintenance hooks on the unit.
    ///
    /// Never waits for the unit: if another invocation holds it the hook is
    /// not run and [`UnitError::Busy`] is returned.
    pub async fn run_hook(&self, hook: Capability, limit: Option<Duration>) -> UnitResult<String> {
        if !self.supports(&hook) {
            return Err(UnitError::NotImplemented { capability: hook });
        }
        let unit = self.unit.clone();
        self.guarded(hook, limit, GateWait::SkipIfBusy, async move {
            match hook {
                Capability::SelfDiagnose => unit.self_diagnose().await,
                Capability::OptimizeResources => unit.optimize_resources().await,
                Capability::SelfImprove => unit.self_improve().await,
                Capability::RunBackgroundTasks => unit.run_background_tasks().await,
                Capability::ExecuteTask => Err(UnitError::failed(
                    hook,
                    "execute_task is not a maintenance hook",
                )),
            }
        })
        .await
    }

    async fn guarded<F>(
        &self,
        capability: Capability,
        limit: Option<Duration>,
        wait: GateWait,
        call: F,
    ) -> UnitResult<String>
    where
        F: Future<Output = UnitResult<String>> + Send,
    {
        let invocation = async {
            let _permit = match wait {
                GateWait::Queue => self.gate.lock().await,
                GateWait::SkipIfBusy => match self.gate.try_lock() {
                    Ok(permit) => permit,
                    Err(_) => return Err(UnitError::Busy { capability }),
                },
            };
            AssertUnwindSafe(call)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(UnitError::Panicked {
                        capability,
                        message: panic_message(panic.as_ref()),
                    })
                })
        };
        match limit {
            Some(limit) => timeout(limit, invocation)
                .await
                .map_err(|_| UnitError::TimedOut {
                    capability,
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => invocation.await,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
