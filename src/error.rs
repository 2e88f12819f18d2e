use thiserror::Error;

use crate::event_bus::EventError;
use crate::loader::DiscoveryError;
use crate::orchestrator::OrchestratorError;
use crate::supervisor::SupervisorError;
use crate::unit::UnitError;
use crate::unit_registry::RegistryError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OmnitideResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }
}
