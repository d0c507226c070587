//! Fleet integration tests.
//!
//! Runs a coordinator API and several workers in-process on loopback
//! listeners. Workers use a fake launcher and content store; everything
//! else (HTTP, registry, dispatcher, monitor, task runner) is real.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use snapgrid_cluster::{AgentConfig, LocalStatus, NodeAgent, post_json};
use snapgrid_health::{HeartbeatMonitor, OverduePolicy};
use snapgrid_scheduler::TaskDispatcher;
use snapgrid_state::*;
use snapgrid_worker::{ContentStore, Launcher, TaskRunner, WorkerResult};

// ── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStore {
    puts: Mutex<u32>,
    gets: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, _dir: &Path) -> WorkerResult<String> {
        let mut puts = self.puts.lock().unwrap();
        *puts += 1;
        Ok(format!("QmSnap{}", *puts))
    }

    async fn get(&self, address: &str, dir: &Path) -> WorkerResult<()> {
        self.gets
            .lock()
            .unwrap()
            .push((address.to_string(), dir.to_path_buf()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLauncher {
    ports: Mutex<Vec<u16>>,
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn launch(&self, _workload: &WorkloadSpec, _dir: &Path, port: u16) -> WorkerResult<()> {
        self.ports.lock().unwrap().push(port);
        Ok(())
    }
}

// ── Harness ────────────────────────────────────────────────────────

struct TestWorker {
    agent: NodeAgent,
    status: LocalStatus,
    store: Arc<MemoryStore>,
    launcher: Arc<RecordingLauncher>,
    addr: String,
    _data: tempfile::TempDir,
}

async fn start_coordinator(registry: &Registry) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let router = snapgrid_api::build_router(registry.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn start_worker(coordinator: &str, shutdown: watch::Receiver<bool>) -> TestWorker {
    let data = tempfile::tempdir().unwrap();
    let status = LocalStatus::new();
    let store = Arc::new(MemoryStore::default());
    let launcher = Arc::new(RecordingLauncher::default());
    let runner = TaskRunner::new(
        status.clone(),
        store.clone(),
        launcher.clone(),
        data.path(),
        shutdown,
    )
    .with_upload_timing(Duration::from_millis(20), Duration::from_millis(50));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, snapgrid_worker::build_router(runner))
            .await
            .unwrap();
    });

    let config = AgentConfig::new(coordinator, "127.0.0.1", port)
        .with_request_timeout(Duration::from_secs(2));
    let agent = NodeAgent::new(config, status.clone());
    TestWorker {
        agent,
        status,
        store,
        launcher,
        addr: node_addr("127.0.0.1", port),
        _data: data,
    }
}

fn coordinator_config(dir: &Path) -> CoordinatorConfig {
    let workload_file = dir.join("compose.yaml");
    std::fs::write(&workload_file, "services:\n  db:\n    image: postgres\n").unwrap();
    CoordinatorConfig {
        workload_file,
        task_timeout: 2,
        ..Default::default()
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn two_idle_workers_one_primary() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    let coordinator = start_coordinator(&registry).await;
    let (_tx, rx) = watch::channel(false);

    let a = start_worker(&coordinator, rx.clone()).await;
    let b = start_worker(&coordinator, rx).await;
    assert!(a.agent.register().await.unwrap().is_success());
    assert!(b.agent.register().await.unwrap().is_success());

    let dispatcher = TaskDispatcher::new(registry.clone(), &coordinator_config(tmp.path()));
    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(report.delivered.len(), 2);

    // Both were told to execute on the base port.
    for w in [&a, &b] {
        wait_for(|| !w.launcher.ports.lock().unwrap().is_empty()).await;
        assert_eq!(*w.launcher.ports.lock().unwrap(), vec![40000]);
        assert!(w.status.is_busy());
    }

    let primary = registry.coordinator().primary.unwrap();
    assert!(primary == a.addr || primary == b.addr);

    // Busy heartbeats make both ineligible for the next cycle.
    a.agent.heartbeat().await.unwrap();
    b.agent.heartbeat().await.unwrap();
    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(report.eligible, 0);
    assert_eq!(registry.coordinator().primary.unwrap(), primary);
}

#[tokio::test]
async fn replacement_catches_up_from_lost_primary() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    let coordinator = start_coordinator(&registry).await;
    let (_tx, rx) = watch::channel(false);
    let dispatcher = TaskDispatcher::new(registry.clone(), &coordinator_config(tmp.path()));

    let a = start_worker(&coordinator, rx.clone()).await;
    a.agent.register().await.unwrap();
    dispatcher.dispatch_once().await.unwrap();
    assert_eq!(registry.coordinator().primary.as_deref(), Some(a.addr.as_str()));

    // A uploads and reports its snapshot, then goes silent.
    wait_for(|| !a.status.last_snapshot().is_empty()).await;
    a.agent.heartbeat().await.unwrap();
    let snapshot = registry.coordinator().last_known_snapshot;
    assert!(snapshot.starts_with("QmSnap"));

    let t0 = registry.get(&a.addr).unwrap().last_heartbeat;
    let monitor = HeartbeatMonitor::new(registry.clone(), OverduePolicy::new(10, 3));
    for elapsed in [11, 21, 31] {
        monitor.sweep_at(t0 + elapsed);
    }
    assert!(registry.get(&a.addr).is_none());
    let state = registry.coordinator();
    assert!(state.primary.is_none());
    assert_eq!(state.port_offset, 1);

    // A fresh worker downloads A's snapshot and runs on the bumped port.
    let c = start_worker(&coordinator, rx).await;
    c.agent.register().await.unwrap();
    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(report.claimed.as_deref(), Some(c.addr.as_str()));

    let gets = c.store.gets.lock().unwrap().clone();
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].0, snapshot);
    assert!(gets[0].1.ends_with("40001"));

    wait_for(|| !c.launcher.ports.lock().unwrap().is_empty()).await;
    assert_eq!(*c.launcher.ports.lock().unwrap(), vec![40001]);
}

#[tokio::test]
async fn unregistered_heartbeat_is_rejected() {
    let registry = Registry::new();
    let coordinator = start_coordinator(&registry).await;

    let reply = post_json(
        &coordinator,
        "/heartbeat",
        &NodeAnnouncement::new("127.0.0.1", 10002),
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    assert_eq!(reply.status.as_u16(), 400);
    assert!(reply.message.starts_with("node not found"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn worker_reregisters_after_removal() {
    let registry = Registry::new();
    let coordinator = start_coordinator(&registry).await;
    let (tx, rx) = watch::channel(false);

    let status = LocalStatus::new();
    let config = AgentConfig::new(coordinator.as_str(), "127.0.0.1", 10005)
        .with_heartbeat_interval(Duration::from_millis(20))
        .with_request_timeout(Duration::from_secs(2));
    let agent = NodeAgent::new(config, status);
    let handle = tokio::spawn(async move { agent.run(rx).await });

    wait_for(|| registry.get("127.0.0.1:10005").is_some()).await;
    registry.evict_where(|_| true);
    assert!(registry.is_empty());

    // The next rejected heartbeat brings the node back.
    wait_for(|| registry.get("127.0.0.1:10005").is_some()).await;

    tx.send(true).unwrap();
    handle.await.unwrap();
}
