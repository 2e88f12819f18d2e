//! # Omnitide: unit orchestration runtime
//!
//! Omnitide discovers pluggable *units* (agents and modules), dispatches tasks
//! to agents over an event channel and keeps a background maintenance loop
//! running over every loaded unit.
//!
//! ## Architecture Overview
//!
//! ```text
//!  artifacts dir ──▶ UnitLoader ──▶ Registries ◀── HealthLoop (forever)
//!                                       ▲
//!  "trigger" ──▶ EventBus ──▶ EventGateway ──▶ Dispatcher
//!                   ▲                │
//!                   └── "status_update" ◀──┘
//! ```
//!
//! - Unit model: [`capability`], [`unit`], [`catalog`]
//! - Discovery and storage: [`loader`], [`unit_registry`]
//! - Dispatch and events: [`dispatcher`], [`event_bus`], [`gateway`]
//! - Background maintenance: [`health_loop`]
//! - Lifecycle: [`orchestrator`], surfaced over HTTP by [`http`]
//! - Outer process supervision: [`supervisor`]
//!
//! Units are resolved through an explicit [`catalog::UnitCatalog`] instead of
//! reflection, and each unit declares the optional capabilities it implements.

pub mod builtin;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event_bus;
pub mod gateway;
pub mod health_loop;
pub mod http;
pub mod loader;
pub mod orchestrator;
pub mod supervisor;
pub mod unit;
pub mod unit_registry;

// Re-exports
pub use capability::{Capabilities, Capability};
pub use dispatcher::{dispatch, DispatchResult, Dispatcher, Outcome};
pub use error::*;
pub use event_bus::{EventBus, StatusEvent, TriggerEvent};
pub use orchestrator::Orchestrator;
pub use unit::{Unit, UnitDescriptor, UnitError, UnitKind, UnitResult};
pub use unit_registry::{Registries, UnitRegistry};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
