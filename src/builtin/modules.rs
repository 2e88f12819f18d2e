use async_trait::async_trait;

use crate::capability::{Capabilities, Capability};
use crate::unit::{Unit, UnitResult};

fn module_capabilities() -> Capabilities {
    Capabilities::from([Capability::RunBackgroundTasks, Capability::SelfImprove])
}

#[derive(Debug, Clone, Default)]
pub struct QuantumComputing;

impl QuantumComputing {
    pub const NAME: &'static str = "QuantumEngine";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Unit for QuantumComputing {
    fn display_name(&self) -> String {
        Self::NAME.to_string()
    }

    fn capabilities(&self) -> Capabilities {
        module_capabilities()
    }

    async fn run_background_tasks(&self) -> UnitResult<String> {
        Ok(format!(
            "{}: Quantum algorithm optimized for precision and speed.",
            Self::NAME
        ))
    }

    async fn self_improve(&self) -> UnitResult<String> {
        Ok(format!(
            "{}: Learning from past computations to refine accuracy.",
            Self::NAME
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FractalAnalysis;

impl FractalAnalysis {
    pub const NAME: &'static str = "FractalProcessor";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Unit for FractalAnalysis {
    fn display_name(&self) -> String {
        Self::NAME.to_string()
    }

    fn capabilities(&self) -> Capabilities {
        module_capabilities()
    }

    async fn run_background_tasks(&self) -> UnitResult<String> {
        Ok(format!(
            "{}: Improved fractal pattern recognition algorithms.",
            Self::NAME
        ))
    }

    async fn self_improve(&self) -> UnitResult<String> {
        Ok(format!(
            "{}: Evolving to detect higher-order patterns more effectively.",
            Self::NAME
        ))
    }
}
