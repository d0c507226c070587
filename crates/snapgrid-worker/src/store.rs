//! Content-addressable snapshot store.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use snapgrid_state::WorkerConfig;

use crate::error::{WorkerError, WorkerResult};
use crate::process;

/// Publishes directories and materializes them back by address.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Add `dir` recursively and return its root address.
    async fn put(&self, dir: &Path) -> WorkerResult<String>;

    /// Materialize `address` so that `dir` holds its contents.
    async fn get(&self, address: &str, dir: &Path) -> WorkerResult<()>;
}

/// IPFS via the `ipfs` command-line client.
#[derive(Debug, Clone)]
pub struct IpfsStore {
    bin: String,
    api: String,
}

impl IpfsStore {
    pub fn new(bin: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            api: api.into(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.ipfs_bin, &config.ipfs_api)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--api").arg(&self.api);
        cmd
    }
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn put(&self, dir: &Path) -> WorkerResult<String> {
        let mut cmd = self.command();
        cmd.args(["add", "-r", "-Q"]).arg(dir);
        let output = process::run(&self.bin, &mut cmd).await?;

        let address = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if address.is_empty() {
            return Err(WorkerError::EmptyAddress(dir.display().to_string()));
        }
        Ok(address)
    }

    async fn get(&self, address: &str, dir: &Path) -> WorkerResult<()> {
        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut cmd = self.command();
        cmd.arg("get").arg("-o").arg(dir).arg(address);
        process::run(&self.bin, &mut cmd).await?;
        info!(address, dir = %dir.display(), "snapshot materialized");
        Ok(())
    }
}
