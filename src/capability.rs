use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Optional operations a unit may implement.
///
/// A unit declares the subset it supports through [`Capabilities`]; callers
/// branch on that declaration instead of probing the unit at runtime.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// `execute_task(task) -> result`, reachable through dispatch
    ExecuteTask,
    SelfDiagnose,
    OptimizeResources,
    SelfImprove,
    RunBackgroundTasks,
}

/// Set of capabilities a unit implements.
///
/// Backed by an ordered set, so listings are stable and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities {
    capabilities: BTreeSet<Capability>,
}

impl From<Capability> for Capabilities {
    fn from(capability: Capability) -> Self {
        let mut capabilities = BTreeSet::new();
        capabilities.insert(capability);
        Self { capabilities }
    }
}

impl From<Vec<Capability>> for Capabilities {
    fn from(capabilities: Vec<Capability>) -> Self {
        capabilities.into_iter().collect()
    }
}

impl<const N: usize> From<[Capability; N]> for Capabilities {
    fn from(capabilities: [Capability; N]) -> Self {
        capabilities.into_iter().collect()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability a unit can declare.
    pub fn all() -> Self {
        <Capability as strum::IntoEnumIterator>::iter().collect()
    }

    pub fn push(&mut self, capability: Capability) {
        self.capabilities.insert(capability);
    }

    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn supports_all(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|c| self.capabilities.contains(c))
    }

    pub fn supports_any(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().any(|c| self.capabilities.contains(c))
    }

    pub fn list(&self) -> Vec<Capability> {
        self.capabilities.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn or(&self, other: &Capabilities) -> Capabilities {
        self.capabilities
            .union(&other.capabilities)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_capabilities() {
        let mut capabilities = Capabilities::new();
        assert!(capabilities.is_empty());

        capabilities.push(Capability::SelfDiagnose);
        capabilities.push(Capability::SelfDiagnose);
        capabilities.push(Capability::ExecuteTask);

        assert_eq!(capabilities.len(), 2);
        assert!(capabilities.supports(&Capability::ExecuteTask));
        assert!(!capabilities.supports(&Capability::SelfImprove));
        assert!(capabilities.supports_all(&[Capability::ExecuteTask, Capability::SelfDiagnose]));
        assert!(!capabilities.supports_all(&[Capability::ExecuteTask, Capability::SelfImprove]));
        assert!(capabilities.supports_any(&[Capability::SelfImprove, Capability::SelfDiagnose]));
        assert_eq!(
            capabilities.list(),
            vec![Capability::ExecuteTask, Capability::SelfDiagnose]
        );
    }

    #[test]
    fn test_or_merges_sets() {
        let left = Capabilities::from(Capability::SelfImprove);
        let right = Capabilities::from(vec![Capability::RunBackgroundTasks, Capability::SelfImprove]);

        let merged = left.or(&right);
        assert_eq!(merged.len(), 2);
        assert!(merged.supports(&Capability::RunBackgroundTasks));
    }

    #[test]
    fn test_all_covers_every_variant() {
        assert_eq!(Capabilities::all().len(), 5);
    }

    #[test]
    fn test_names_round_trip_through_strum_and_serde() {
        assert_eq!(Capability::OptimizeResources.to_string(), "optimize_resources");
        assert_eq!(
            Capability::from_str("run_background_tasks").unwrap(),
            Capability::RunBackgroundTasks
        );

        let json = serde_json::to_string(&Capabilities::from([
            Capability::SelfImprove,
            Capability::ExecuteTask,
        ]))
        .unwrap();
        assert_eq!(json, r#"["execute_task","self_improve"]"#);
    }
}
