//! Domain and wire types shared by the coordinator and workers.
//!
//! Field names on the wire keep the names used by existing fleets
//! (`last_ipfs_cid`, `compose`, `ipfs`) so mixed deployments interoperate.

use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Registry key for a worker: `host:port`.
pub type NodeAddr = String;

/// Build the registry key for a worker.
pub fn node_addr(host: &str, port: u16) -> NodeAddr {
    format!("{host}:{port}")
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Identity & status ──────────────────────────────────────────────

/// Liveness of a registered worker as seen by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Online,
    Offline,
}

/// Role a snapgrid process plays in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Coordinator,
    Worker,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Coordinator => f.write_str("coordinator"),
            Identity::Worker => f.write_str("worker"),
        }
    }
}

// ── Register / heartbeat ───────────────────────────────────────────

/// Body of `POST /register` and `POST /heartbeat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAnnouncement {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default)]
    pub is_busy: bool,
    /// Latest content address the worker uploaded.
    #[serde(default, rename = "last_ipfs_cid", skip_serializing_if = "String::is_empty")]
    pub last_snapshot: String,
}

impl NodeAnnouncement {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Registry key of the announcing worker.
    pub fn addr(&self) -> NodeAddr {
        node_addr(&self.host, self.port)
    }

    /// Reject announcements that cannot be keyed.
    pub fn validate(&self) -> StateResult<()> {
        if self.host.trim().is_empty() {
            return Err(StateError::InvalidNode("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(StateError::InvalidNode("port is 0".to_string()));
        }
        Ok(())
    }
}

/// One known worker, owned by the coordinator's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub host: String,
    pub port: u16,
    pub status: NodeStatus,
    /// Unix timestamp (seconds) of the last accepted heartbeat or registration.
    pub last_heartbeat: u64,
    /// Sweeps that found the heartbeat older than the escalating threshold.
    pub overdue_count: u32,
    pub is_busy: bool,
    pub last_snapshot: String,
}

impl NodeRecord {
    /// Fresh Online record for a newly registered worker.
    pub fn from_announcement(announcement: &NodeAnnouncement, now: u64) -> Self {
        Self {
            host: announcement.host.clone(),
            port: announcement.port,
            status: NodeStatus::Online,
            last_heartbeat: now,
            overdue_count: 0,
            is_busy: announcement.is_busy,
            last_snapshot: announcement.last_snapshot.clone(),
        }
    }

    pub fn addr(&self) -> NodeAddr {
        node_addr(&self.host, self.port)
    }

    /// Apply an accepted heartbeat.
    pub fn refresh(&mut self, announcement: &NodeAnnouncement, now: u64) {
        self.last_heartbeat = now;
        self.overdue_count = 0;
        self.status = NodeStatus::Online;
        self.is_busy = announcement.is_busy;
        self.last_snapshot = announcement.last_snapshot.clone();
    }

    /// Whether the dispatcher may send this worker a task.
    pub fn is_idle(&self) -> bool {
        self.status == NodeStatus::Online && !self.is_busy
    }
}

// ── Task descriptor ────────────────────────────────────────────────

/// Declarative workload file plus the port the workload should bind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub port: u16,
}

/// Content-store coordinates used for catch-up downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    #[serde(default)]
    pub cid: String,
    /// Directory name under the data dir to materialize into (empty = working dir).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
}

/// Per-cycle message from coordinator to worker (`POST /task`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    #[serde(default)]
    pub need_download: bool,
    #[serde(default)]
    pub need_execute: bool,
    #[serde(default)]
    pub need_upload: bool,
    /// Primary known to the coordinator when this descriptor was built.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary: String,
    #[serde(rename = "compose")]
    pub workload: WorkloadSpec,
    #[serde(default, rename = "ipfs")]
    pub snapshot: SnapshotRef,
}

impl TaskDescriptor {
    pub fn target_port(&self) -> u16 {
        self.workload.port
    }

    /// Whether this descriptor asks the worker to do anything at all.
    pub fn is_actionable(&self) -> bool {
        self.need_download || self.need_execute || self.need_upload
    }

    /// Structural checks a worker runs before touching any state.
    pub fn validate(&self) -> StateResult<()> {
        if (self.need_execute || self.need_upload) && self.workload.port == 0 {
            return Err(StateError::InvalidTask("target port is 0".to_string()));
        }
        if self.need_execute {
            check_file_name("workload filename", &self.workload.filename)?;
        }
        if self.need_download {
            if self.snapshot.cid.trim().is_empty() {
                return Err(StateError::InvalidTask(
                    "download requested without a snapshot address".to_string(),
                ));
            }
            if !self.snapshot.filename.is_empty() {
                check_file_name("snapshot target name", &self.snapshot.filename)?;
            }
        }
        Ok(())
    }
}

/// Names joined onto local directories must be a single plain component.
fn check_file_name(what: &str, name: &str) -> StateResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) => Ok(()),
        _ => Err(StateError::InvalidTask(format!("{what} {name:?} is not a plain file name"))),
    }
}

/// `{"message": "..."}` body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executable_task() -> TaskDescriptor {
        TaskDescriptor {
            need_execute: true,
            need_upload: true,
            workload: WorkloadSpec {
                content: "services: {}".to_string(),
                filename: "compose.yaml".to_string(),
                port: 40000,
            },
            ..Default::default()
        }
    }

    #[test]
    fn announcement_defaults_optional_fields() {
        let a: NodeAnnouncement = serde_json::from_str(r#"{"host":"10.0.0.1","port":10000}"#).unwrap();
        assert_eq!(a.addr(), "10.0.0.1:10000");
        assert!(!a.is_busy);
        assert!(a.last_snapshot.is_empty());
        assert!(a.status.is_none());
    }

    #[test]
    fn announcement_reads_cid_wire_field() {
        let a: NodeAnnouncement = serde_json::from_str(
            r#"{"host":"h","port":1,"is_busy":true,"last_ipfs_cid":"QmX","status":"online"}"#,
        )
        .unwrap();
        assert!(a.is_busy);
        assert_eq!(a.last_snapshot, "QmX");
        assert_eq!(a.status, Some(NodeStatus::Online));
    }

    #[test]
    fn announcement_validation() {
        assert!(NodeAnnouncement::new("h", 10000).validate().is_ok());
        assert!(matches!(
            NodeAnnouncement::new("", 10000).validate(),
            Err(StateError::InvalidNode(_))
        ));
        assert!(matches!(
            NodeAnnouncement::new("h", 0).validate(),
            Err(StateError::InvalidNode(_))
        ));
    }

    #[test]
    fn record_refresh_resets_overdue() {
        let mut record = NodeRecord::from_announcement(&NodeAnnouncement::new("h", 1), 100);
        record.overdue_count = 2;
        record.status = NodeStatus::Offline;

        let mut beat = NodeAnnouncement::new("h", 1);
        beat.is_busy = true;
        beat.last_snapshot = "QmA".to_string();
        record.refresh(&beat, 150);

        assert_eq!(record.last_heartbeat, 150);
        assert_eq!(record.overdue_count, 0);
        assert_eq!(record.status, NodeStatus::Online);
        assert!(record.is_busy);
        assert_eq!(record.last_snapshot, "QmA");
        assert!(!record.is_idle());
    }

    #[test]
    fn task_wire_names() {
        let json = serde_json::to_value(executable_task()).unwrap();
        assert_eq!(json["compose"]["port"], 40000);
        assert_eq!(json["compose"]["filename"], "compose.yaml");
        assert!(json["ipfs"].is_object());
        assert_eq!(json["need_execute"], true);
    }

    #[test]
    fn task_validation_accepts_executable() {
        assert!(executable_task().validate().is_ok());
        assert!(executable_task().is_actionable());
    }

    #[test]
    fn task_validation_rejects_path_traversal() {
        let mut task = executable_task();
        task.workload.filename = "../etc/passwd".to_string();
        assert!(matches!(task.validate(), Err(StateError::InvalidTask(_))));

        let mut task = executable_task();
        task.workload.filename = String::new();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validation_requires_cid_for_download() {
        let mut task = executable_task();
        task.need_download = true;
        assert!(task.validate().is_err());

        task.snapshot.cid = "QmSnap".to_string();
        assert!(task.validate().is_ok());
    }

    #[test]
    fn standby_task_needs_no_workload() {
        let task = TaskDescriptor {
            snapshot: SnapshotRef {
                cid: "QmSnap".to_string(),
                filename: String::new(),
            },
            ..Default::default()
        };
        assert!(task.validate().is_ok());
        assert!(!task.is_actionable());
    }

    #[test]
    fn identity_display() {
        assert_eq!(Identity::Coordinator.to_string(), "coordinator");
        assert_eq!(Identity::Worker.to_string(), "worker");
    }
}
