#![allow(dead_code)]

use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use omnitide::{Capabilities, Capability, Unit, UnitDescriptor, UnitError, UnitKind, UnitResult};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Agent that solves any task and keeps quiet otherwise.
pub struct Detective {
    pub name: &'static str,
}

#[async_trait]
impl Unit for Detective {
    fn display_name(&self) -> String {
        self.name.to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from(Capability::ExecuteTask)
    }

    async fn execute_task(&self, task: &str) -> UnitResult<String> {
        Ok(format!("{}: Solved '{}'", self.name, task))
    }
}

/// Unit without `execute_task`.
pub struct Sleeper;

#[async_trait]
impl Unit for Sleeper {
    fn display_name(&self) -> String {
        "Sleeper".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from([Capability::SelfImprove, Capability::RunBackgroundTasks])
    }

    async fn self_improve(&self) -> UnitResult<String> {
        Ok(String::new())
    }

    async fn run_background_tasks(&self) -> UnitResult<String> {
        Ok(String::new())
    }
}

/// How a [`Recorder`] hook behaves.
#[derive(Clone, Copy, PartialEq)]
pub enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

/// Unit declaring every capability and recording each call.
pub struct Recorder {
    pub calls: Arc<Mutex<Vec<Capability>>>,
    pub failing: Option<(Capability, Behaviour)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: None,
        }
    }

    pub fn failing(capability: Capability, behaviour: Behaviour) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Some((capability, behaviour)),
        }
    }

    pub fn calls(&self) -> Vec<Capability> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, capability: Capability) -> UnitResult<String> {
        self.calls.lock().unwrap().push(capability);
        match self.failing {
            Some((failing, Behaviour::Fail)) if failing == capability => {
                Err(UnitError::failed(capability, "simulated failure"))
            }
            Some((failing, Behaviour::Panic)) if failing == capability => {
                panic!("simulated panic in {capability}")
            }
            _ => Ok(format!("{capability} ok")),
        }
    }
}

#[async_trait]
impl Unit for Recorder {
    fn display_name(&self) -> String {
        "Recorder".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn execute_task(&self, _task: &str) -> UnitResult<String> {
        self.record(Capability::ExecuteTask)
    }

    async fn self_diagnose(&self) -> UnitResult<String> {
        self.record(Capability::SelfDiagnose)
    }

    async fn optimize_resources(&self) -> UnitResult<String> {
        self.record(Capability::OptimizeResources)
    }

    async fn self_improve(&self) -> UnitResult<String> {
        self.record(Capability::SelfImprove)
    }

    async fn run_background_tasks(&self) -> UnitResult<String> {
        self.record(Capability::RunBackgroundTasks)
    }
}

pub fn descriptor(name: &str, kind: UnitKind, unit: Arc<dyn Unit>) -> UnitDescriptor {
    let type_name = unit.display_name();
    UnitDescriptor::new(name, kind, &type_name, unit)
}

/// Temporary directory holding one empty artifact per file name.
pub fn artifact_dir(file_names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in file_names {
        fs::write(dir.path().join(name), "").unwrap();
    }
    dir
}

/// `agents/` and `modules/` side by side under one temporary root.
pub fn unit_tree(agents: &[&str], modules: &[&str]) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    for (sub, names) in [("agents", agents), ("modules", modules)] {
        let dir = root.path().join(sub);
        fs::create_dir_all(&dir).unwrap();
        for name in names {
            fs::write(dir.join(name), "").unwrap();
        }
    }
    root
}
