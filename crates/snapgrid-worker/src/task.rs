//! Worker task state machine.
//!
//! `Idle → Downloading → Running → Idle`. The busy flag in [`LocalStatus`]
//! is the admission gate: it is taken before any state changes and only
//! released when the task settles without a running upload loop.
//!
//! Everything after the busy gate runs in a spawned task, so dropping the
//! `/task` request (client timeout, closed connection) never strands the
//! worker in `Downloading`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use snapgrid_cluster::LocalStatus;
use snapgrid_state::{TaskDescriptor, WorkerConfig, WorkloadSpec};

use crate::error::{WorkerError, WorkerResult};
use crate::launcher::Launcher;
use crate::store::ContentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskPhase {
    #[default]
    Idle,
    Downloading,
    Running,
}

/// How a descriptor was taken up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// Nothing to do; a primary already exists.
    Standby,
    /// Download (if any) finished; execute/upload now run in the background.
    Started { dir: PathBuf },
}

#[derive(Clone)]
pub struct TaskRunner {
    status: LocalStatus,
    store: Arc<dyn ContentStore>,
    launcher: Arc<dyn Launcher>,
    data_dir: PathBuf,
    upload_grace: Duration,
    upload_interval: Duration,
    phase: Arc<Mutex<TaskPhase>>,
    /// Address and target most recently materialized, to skip repeat downloads.
    last_fetched: Arc<Mutex<Option<(String, PathBuf)>>>,
    shutdown: watch::Receiver<bool>,
}

impl TaskRunner {
    pub fn new(
        status: LocalStatus,
        store: Arc<dyn ContentStore>,
        launcher: Arc<dyn Launcher>,
        data_dir: impl Into<PathBuf>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            status,
            store,
            launcher,
            data_dir: data_dir.into(),
            upload_grace: Duration::from_secs(20),
            upload_interval: Duration::from_secs(10),
            phase: Arc::default(),
            last_fetched: Arc::default(),
            shutdown,
        }
    }

    /// Take upload timings and the data dir from `config`.
    pub fn with_config(mut self, config: &WorkerConfig) -> Self {
        self.data_dir = config.data_dir.clone();
        self.upload_grace = config.upload_grace();
        self.upload_interval = config.upload_interval();
        self
    }

    pub fn with_upload_timing(mut self, grace: Duration, interval: Duration) -> Self {
        self.upload_grace = grace;
        self.upload_interval = interval;
        self
    }

    pub fn phase(&self) -> TaskPhase {
        *self.phase.lock()
    }

    pub fn status(&self) -> &LocalStatus {
        &self.status
    }

    /// Working directory for a workload bound to `port`.
    pub fn working_dir(&self, port: u16) -> PathBuf {
        self.data_dir.join(port.to_string())
    }

    /// Take up a descriptor.
    ///
    /// Returns once any mandatory download has finished. Execution and
    /// uploading continue in spawned tasks. If the caller stops waiting, the
    /// download still completes and the task proceeds or settles on its own.
    pub async fn accept(&self, task: TaskDescriptor) -> WorkerResult<Accepted> {
        task.validate()?;

        if !task.is_actionable() {
            debug!(primary = %task.primary, snapshot = %task.snapshot.cid, "standby task, nothing to do");
            return Ok(Accepted::Standby);
        }

        if !self.status.try_mark_busy() {
            warn!(port = task.target_port(), "task refused, already busy");
            return Err(WorkerError::Busy);
        }

        let runner = self.clone();
        tokio::spawn(async move { runner.start(task).await })
            .await
            .map_err(|e| {
                error!(error = %e, "task start aborted");
                WorkerError::Interrupted(e)
            })?
    }

    /// Download, then hand execute/upload to background tasks. Holds the
    /// busy flag taken by `accept`; every early return releases it.
    async fn start(&self, task: TaskDescriptor) -> WorkerResult<Accepted> {
        let mut guard = SettleGuard::new(self);

        let dir = self.working_dir(task.target_port());
        if let Err(e) = self.prepare(&task, &dir).await {
            error!(cid = %task.snapshot.cid, error = %e, "task preparation failed, abandoned");
            return Err(e);
        }

        if !task.need_execute && !task.need_upload {
            return Ok(Accepted::Started { dir });
        }

        self.set_phase(TaskPhase::Running);
        info!(
            port = task.target_port(),
            execute = task.need_execute,
            upload = task.need_upload,
            dir = %dir.display(),
            "task running"
        );

        if task.need_execute {
            let runner = self.clone();
            let workload = task.workload.clone();
            let dir = dir.clone();
            let release_after = !task.need_upload;
            tokio::spawn(async move {
                runner.execute(&workload, &dir).await;
                if release_after {
                    runner.settle();
                }
            });
        }

        if task.need_upload {
            let runner = self.clone();
            let dir = dir.clone();
            tokio::spawn(async move { runner.upload_loop(&dir).await });
        }

        guard.disarm();
        Ok(Accepted::Started { dir })
    }

    /// Create the working directory and run the catch-up download, if any.
    async fn prepare(&self, task: &TaskDescriptor, dir: &Path) -> WorkerResult<()> {
        tokio::fs::create_dir_all(dir).await?;
        if !task.need_download {
            return Ok(());
        }

        let cid = task.snapshot.cid.as_str();
        let target = if task.snapshot.filename.is_empty() {
            dir.to_path_buf()
        } else {
            self.data_dir.join(&task.snapshot.filename)
        };

        let fetched = matches!(
            &*self.last_fetched.lock(),
            Some((last_cid, last_target)) if last_cid == cid && *last_target == target
        );
        if fetched {
            debug!(cid, target = %target.display(), "snapshot already materialized, skipping download");
            return Ok(());
        }

        self.set_phase(TaskPhase::Downloading);
        info!(cid, target = %target.display(), "downloading snapshot");
        self.store.get(cid, &target).await?;
        *self.last_fetched.lock() = Some((cid.to_string(), target));
        Ok(())
    }

    /// Persist the workload file and start it. Failures are logged, not retried.
    async fn execute(&self, workload: &WorkloadSpec, dir: &Path) {
        let file = dir.join(&workload.filename);
        if let Err(e) = tokio::fs::write(&file, &workload.content).await {
            error!(file = %file.display(), error = %e, "failed to write workload file");
            return;
        }
        if let Err(e) = self.launcher.launch(workload, dir, workload.port).await {
            error!(port = workload.port, error = %e, "workload launch failed");
        }
    }

    /// Publish `dir` every interval after the grace delay, until shutdown.
    async fn upload_loop(&self, dir: &Path) {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.upload_grace) => {}
            _ = shutdown.changed() => return,
        }

        info!(dir = %dir.display(), interval = ?self.upload_interval, "upload loop started");
        loop {
            self.upload_once(dir).await;
            tokio::select! {
                _ = tokio::time::sleep(self.upload_interval) => {}
                _ = shutdown.changed() => {
                    debug!("upload loop shutting down");
                    return;
                }
            }
        }
    }

    async fn upload_once(&self, dir: &Path) {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "cannot create working directory");
            return;
        }
        match self.store.put(dir).await {
            Ok(address) => {
                info!(dir = %dir.display(), %address, "snapshot uploaded");
                self.status.set_last_snapshot(address);
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "snapshot upload failed"),
        }
    }

    fn set_phase(&self, phase: TaskPhase) {
        *self.phase.lock() = phase;
    }

    /// Back to Idle and not busy.
    fn settle(&self) {
        self.set_phase(TaskPhase::Idle);
        self.status.set_busy(false);
    }
}

/// Settles the runner when dropped while armed, including on unwind.
struct SettleGuard<'a> {
    runner: &'a TaskRunner,
    armed: bool,
}

impl<'a> SettleGuard<'a> {
    fn new(runner: &'a TaskRunner) -> Self {
        Self {
            runner,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.runner.settle();
        }
    }
}
