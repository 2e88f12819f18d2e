use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};

use crate::supervisor::ShellCommand;
use crate::{Error, OmnitideResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    #[serde(default)]
    pub health: HealthConfig,

    /// Upper bound for a single unit invocation. Absent means wait forever.
    #[serde(default, with = "optional_duration_ms")]
    pub invocation_timeout: Option<Duration>,

    #[serde(default = "default_shutdown_timeout", with = "duration_ms")]
    pub shutdown_timeout: Duration,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,

    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Fail startup when any artifact could not be loaded.
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            agents_dir: default_agents_dir(),
            modules_dir: default_modules_dir(),
            artifact_extension: default_artifact_extension(),
            strict: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pause between two passes; zero runs them back to back.
    #[serde(default = "default_pass_interval", with = "duration_ms")]
    pub pass_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            pass_interval: default_pass_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_monitor_interval", with = "duration_ms")]
    pub monitor_interval: Duration,

    #[serde(default = "default_sync_command")]
    pub sync_command: ShellCommand,

    #[serde(default = "default_probe_command")]
    pub probe_command: ShellCommand,

    #[serde(default = "default_remediation_command")]
    pub remediation_command: ShellCommand,

    #[serde(default = "default_launch_command")]
    pub launch_command: ShellCommand,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            monitor_interval: default_monitor_interval(),
            sync_command: default_sync_command(),
            probe_command: default_probe_command(),
            remediation_command: default_remediation_command(),
            launch_command: default_launch_command(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_event_buffer_size() -> usize {
    100
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("units/agents")
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("units/modules")
}

fn default_artifact_extension() -> String {
    "unit".to_string()
}

fn default_pass_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_sync_command() -> ShellCommand {
    ShellCommand::new("sync", &[])
}

fn default_probe_command() -> ShellCommand {
    ShellCommand::new("ping", &["-c", "1", "google.com"])
}

fn default_remediation_command() -> ShellCommand {
    ShellCommand::new("service", &["networking", "restart"])
}

fn default_launch_command() -> ShellCommand {
    ShellCommand::new("omnitide", &["serve"])
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            event_buffer_size: default_event_buffer_size(),
            health: HealthConfig::default(),
            invocation_timeout: None,
            shutdown_timeout: default_shutdown_timeout(),
            http: HttpConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> OmnitideResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::config(format!("Failed to open {}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Reads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> OmnitideResult<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }
}
