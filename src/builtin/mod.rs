//! Units bundled with the runtime.
//!
//! Agents resolve from artifacts named after their type, ignoring case
//! (`SherlockHolmes.unit`, `sherlockholmes.unit`); modules from the
//! snake_case form of theirs (`quantum_computing.unit`).

pub mod agents;
pub mod modules;

use crate::catalog::UnitCatalog;

pub use agents::Persona;
pub use modules::{FractalAnalysis, QuantumComputing};

/// Catalog holding every bundled unit.
pub fn catalog() -> UnitCatalog {
    UnitCatalog::new()
        .with_agent("MrMeeseeks", Persona::mr_meeseeks)
        .with_agent("SherlockHolmes", Persona::sherlock_holmes)
        .with_agent("TonyStark", Persona::tony_stark)
        .with_agent("RickSanchez", Persona::rick_sanchez)
        .with_module("QuantumComputing", QuantumComputing::new)
        .with_module("FractalAnalysis", FractalAnalysis::new)
}
