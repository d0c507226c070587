//! Workload launcher.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use snapgrid_state::{WorkerConfig, WorkloadSpec};

use crate::error::WorkerResult;
use crate::process;

/// Starts a declarative workload that is already written into `dir`.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, workload: &WorkloadSpec, dir: &Path, port: u16) -> WorkerResult<()>;
}

/// `docker compose -f <file> up -d`, run inside the working directory.
///
/// The workload sees `PORT` and, on Unix, `CURRENT_UID=<uid>:<gid>` so
/// containers can write into the snapshotted directory as the worker user.
#[derive(Debug, Clone)]
pub struct ComposeLauncher {
    bin: String,
}

impl Default for ComposeLauncher {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ComposeLauncher {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.docker_bin)
    }

    fn command(&self, workload: &WorkloadSpec, dir: &Path, port: u16) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("compose");
        if !workload.filename.is_empty() {
            cmd.arg("-f").arg(&workload.filename);
        }
        cmd.args(["up", "-d"])
            .current_dir(dir)
            .env("PORT", port.to_string());
        if let Some(uid) = current_uid() {
            cmd.env("CURRENT_UID", uid);
        }
        cmd
    }
}

#[async_trait]
impl Launcher for ComposeLauncher {
    async fn launch(&self, workload: &WorkloadSpec, dir: &Path, port: u16) -> WorkerResult<()> {
        let mut cmd = self.command(workload, dir, port);
        process::run(&self.bin, &mut cmd).await?;
        info!(port, dir = %dir.display(), file = %workload.filename, "workload started");
        Ok(())
    }
}

#[cfg(unix)]
fn current_uid() -> Option<String> {
    // SAFETY: getuid/getgid always succeed and touch no memory.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    Some(format!("{uid}:{gid}"))
}

#[cfg(not(unix))]
fn current_uid() -> Option<String> {
    None
}
