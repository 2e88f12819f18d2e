use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::info;

use crate::unit::{UnitDescriptor, UnitKind};

/// Live collection of units of one kind, keyed by unit name.
///
/// Insert-only: the loader fills it at startup and nothing removes entries
/// afterwards. Clones share the same storage.
#[derive(Clone)]
pub struct UnitRegistry {
    kind: UnitKind,
    units: Arc<DashMap<String, UnitDescriptor>>,
}

impl UnitRegistry {
    pub fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            units: Arc::new(DashMap::new()),
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Adds a unit. A name that is already taken is rejected and the existing
    /// entry stays untouched.
    #[tracing::instrument(skip(self, descriptor), fields(unit = %descriptor.name()), level = "debug")]
    pub fn register(&self, descriptor: UnitDescriptor) -> RegistryResult<()> {
        if descriptor.kind() != self.kind {
            return Err(RegistryError::KindMismatch {
                unit_name: descriptor.name().to_string(),
                expected: self.kind,
                actual: descriptor.kind(),
            });
        }
        if descriptor.capabilities().is_empty() {
            return Err(RegistryError::NoCapabilities {
                unit_name: descriptor.name().to_string(),
            });
        }

        match self.units.entry(descriptor.name().to_string()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered {
                unit_name: descriptor.name().to_string(),
            }),
            Entry::Vacant(slot) => {
                info!(
                    kind = %self.kind,
                    unit = %descriptor.name(),
                    type_name = %descriptor.type_name(),
                    capabilities = ?descriptor.capabilities().list(),
                    "Unit registered"
                );
                slot.insert(descriptor);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<UnitDescriptor> {
        self.units.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Point-in-time copy of every descriptor, ordered by name.
    ///
    /// Callers iterate the copy, so no map shard stays locked while a unit runs.
    pub fn snapshot(&self) -> Vec<UnitDescriptor> {
        let mut units: Vec<UnitDescriptor> =
            self.units.iter().map(|entry| entry.value().clone()).collect();
        units.sort_by(|a, b| a.name().cmp(b.name()));
        units
    }
}

/// The agent registry and the module registry, side by side.
#[derive(Clone)]
pub struct Registries {
    pub agents: UnitRegistry,
    pub modules: UnitRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        Self {
            agents: UnitRegistry::new(UnitKind::Agent),
            modules: UnitRegistry::new(UnitKind::Module),
        }
    }

    pub fn for_kind(&self, kind: UnitKind) -> &UnitRegistry {
        match kind {
            UnitKind::Agent => &self.agents,
            UnitKind::Module => &self.modules,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unit already registered: {unit_name}")]
    AlreadyRegistered { unit_name: String },
    #[error("Unit {unit_name} declares no capabilities")]
    NoCapabilities { unit_name: String },
    #[error("Unit {unit_name} is a {actual}, registry holds {expected} units")]
    KindMismatch {
        unit_name: String,
        expected: UnitKind,
        actual: UnitKind,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
