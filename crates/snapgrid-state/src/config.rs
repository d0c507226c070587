//! snapgrid.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! stock timings. Periods are whole seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub coordinator: CoordinatorConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Seconds between liveness sweeps.
    pub sweep_period: u64,
    /// Base overdue threshold; the n-th overdue mark needs `n * overdue_period`.
    pub overdue_period: u64,
    /// Overdue marks after which a node is judged offline and removed.
    pub max_overdue_times: u32,
    /// Seconds between dispatch cycles.
    pub dispatch_period: u64,
    /// Workload port before the failover offset is added.
    pub base_port: u16,
    /// Declarative workload file, re-read every dispatch cycle.
    pub workload_file: PathBuf,
    /// Seconds to wait for a worker's `/task` reply. The reply follows any
    /// catch-up download, so this bounds the download rather than the round trip.
    pub task_timeout: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sweep_period: 10,
            overdue_period: 10,
            max_overdue_times: 3,
            dispatch_period: 10,
            base_port: 40000,
            workload_file: PathBuf::from("compose.yaml"),
            task_timeout: 300,
        }
    }
}

impl CoordinatorConfig {
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period)
    }

    pub fn dispatch_period(&self) -> Duration {
        Duration::from_secs(self.dispatch_period)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between heartbeats.
    pub heartbeat_interval: u64,
    /// Delay before the first upload after a task starts.
    pub upload_grace: u64,
    /// Seconds between uploads.
    pub upload_interval: u64,
    /// Per-request timeout towards the coordinator, in seconds.
    pub request_timeout: u64,
    /// IPFS command-line client used for snapshot put/get.
    pub ipfs_bin: String,
    /// API multiaddr of the IPFS daemon the client talks to.
    pub ipfs_api: String,
    /// Container CLI used to launch the workload.
    pub docker_bin: String,
    /// Root for working directories (`<data_dir>/<port>`).
    pub data_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 10,
            upload_grace: 20,
            upload_interval: 10,
            request_timeout: 5,
            ipfs_bin: "ipfs".to_string(),
            ipfs_api: "/ip4/127.0.0.1/tcp/5001".to_string(),
            docker_bin: "docker".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn upload_grace(&self) -> Duration {
        Duration::from_secs(self.upload_grace)
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(self.upload_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
