use async_trait::async_trait;

use crate::capability::{Capabilities, Capability};
use crate::unit::{Unit, UnitResult};

/// A scripted agent answering every call with a fixed line.
///
/// `task_line` holds a `{task}` placeholder.
#[derive(Debug, Clone)]
pub struct Persona {
    name: &'static str,
    task_line: &'static str,
    diagnosis: &'static str,
    optimization: &'static str,
    improvement: &'static str,
}

impl Persona {
    pub fn mr_meeseeks() -> Self {
        Self {
            name: "Mr. Meeseeks",
            task_line: "Task '{task}' completed cheerfully!",
            diagnosis: "All systems operational. Existence is still pain.",
            optimization: "Resources optimized swiftly.",
            improvement: "Adapted to handle tasks more efficiently.",
        }
    }

    pub fn sherlock_holmes() -> Self {
        Self {
            name: "Sherlock Holmes",
            task_line: "Solved '{task}' with deductive reasoning.",
            diagnosis: "System diagnostics complete. Logical consistency verified.",
            optimization: "Resources reallocated using precise analysis.",
            improvement: "Improving deduction algorithms for enhanced performance.",
        }
    }

    pub fn tony_stark() -> Self {
        Self {
            name: "Tony Stark",
            task_line: "Engineered a solution for '{task}' using cutting-edge tech.",
            diagnosis: "Diagnosed and resolved inefficiencies.",
            optimization: "Resources optimized for peak performance.",
            improvement: "Implementing advanced upgrades dynamically.",
        }
    }

    pub fn rick_sanchez() -> Self {
        Self {
            name: "Rick Sanchez",
            task_line: "Solved '{task}' with chaotic genius.",
            diagnosis: "Diagnostics complete. System running (somehow).",
            optimization: "Resources optimized with reckless ingenuity.",
            improvement: "Evolved system to handle multiversal challenges.",
        }
    }

    fn say(&self, line: &str) -> String {
        format!("{}: {}", self.name, line)
    }
}

#[async_trait]
impl Unit for Persona {
    fn display_name(&self) -> String {
        self.name.to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from([
            Capability::ExecuteTask,
            Capability::SelfDiagnose,
            Capability::OptimizeResources,
            Capability::SelfImprove,
        ])
    }

    async fn execute_task(&self, task: &str) -> UnitResult<String> {
        Ok(self.say(&self.task_line.replace("{task}", task)))
    }

    async fn self_diagnose(&self) -> UnitResult<String> {
        Ok(self.say(self.diagnosis))
    }

    async fn optimize_resources(&self) -> UnitResult<String> {
        Ok(self.say(self.optimization))
    }

    async fn self_improve(&self) -> UnitResult<String> {
        Ok(self.say(self.improvement))
    }
}
