//! Process supervision around the orchestrator.
//!
//! Nothing here is part of the orchestration core: the [`StartupSequencer`]
//! prepares the host and launches `omnitide serve`, and the [`Monitor`] re-runs
//! that sequence whenever its anomaly detector fires.

pub mod monitor;
pub mod sequencer;

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

pub use monitor::{AnomalyDetector, HealingProtocol, Monitor, NoAnomaly};
pub use sequencer::{
    Launcher, ReachabilityProbe, Remediation, SequenceReport, ShellStep, StartupSequencer,
    StateSync,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupervisorError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Failed to run `{command}`: {message}")]
    CommandFailed { command: String, message: String },

    #[error("`{command}` exited with status {code:?}")]
    CommandExited { command: String, code: Option<i32> },

    #[error("Anomaly detection failed: {message}")]
    Detection { message: String },
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// An external program with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl TryFrom<Vec<String>> for ShellCommand {
    type Error = SupervisorError;

    fn try_from(argv: Vec<String>) -> Result<Self, Self::Error> {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(SupervisorError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
        })
    }
}

impl From<ShellCommand> for Vec<String> {
    fn from(command: ShellCommand) -> Self {
        std::iter::once(command.program).chain(command.args).collect()
    }
}

impl std::fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl ShellCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    /// Runs to completion and reports whether it exited successfully.
    pub async fn succeeds(&self) -> SupervisorResult<bool> {
        debug!(command = %self, "Running");
        let status = self
            .command()
            .status()
            .await
            .map_err(|e| SupervisorError::CommandFailed {
                command: self.to_string(),
                message: e.to_string(),
            })?;
        Ok(status.success())
    }

    /// Runs to completion; a non-zero exit is an error.
    pub async fn run(&self) -> SupervisorResult<()> {
        debug!(command = %self, "Running");
        let status = self
            .command()
            .status()
            .await
            .map_err(|e| SupervisorError::CommandFailed {
                command: self.to_string(),
                message: e.to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(SupervisorError::CommandExited {
                command: self.to_string(),
                code: status.code(),
            })
        }
    }

    /// Starts the program and leaves it running. Returns its pid when known.
    pub fn spawn(&self) -> SupervisorResult<Option<u32>> {
        debug!(command = %self, "Spawning");
        let child = self
            .command()
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| SupervisorError::CommandFailed {
                command: self.to_string(),
                message: e.to_string(),
            })?;
        Ok(child.id())
    }
}
