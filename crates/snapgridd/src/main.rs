//! snapgridd: the snapgrid daemon.
//!
//! One binary, two roles:
//! - `coordinator`: registry, heartbeat monitor, task dispatcher, and the
//!   `/register` + `/heartbeat` API
//! - `worker`: `/task` endpoint, task runner, and the registration /
//!   heartbeat agent
//!
//! # Usage
//!
//! ```text
//! snapgridd coordinator --port 8888
//! snapgridd worker --coordinator localhost:8888 --host 10.0.0.5 --port 10000
//! ```
//!
//! Both roles accept `--config snapgrid.toml` to override timings.

mod coordinator_mode;
mod worker_mode;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use snapgrid_state::FleetConfig;

#[derive(Parser)]
#[command(name = "snapgridd", about = "snapgrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track workers, elect a primary, and dispatch the workload.
    Coordinator {
        /// Port to listen on.
        #[arg(long, default_value = "8888")]
        port: u16,

        /// TOML file overriding the default timings.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run workloads handed out by a coordinator.
    Worker {
        /// Coordinator address (`host:port`).
        #[arg(long, default_value = "localhost:8888")]
        coordinator: String,

        /// Host this worker advertises to the coordinator.
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Port to listen on and advertise.
        #[arg(long, default_value = "10000")]
        port: u16,

        /// Root for working directories; overrides the config file.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// TOML file overriding the default timings.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,snapgridd=debug,snapgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Coordinator { port, config } => {
            let fleet = FleetConfig::load(config.as_deref())?;
            coordinator_mode::run_coordinator(port, fleet.coordinator).await
        }
        Command::Worker {
            coordinator,
            host,
            port,
            data_dir,
            config,
        } => {
            let mut fleet = FleetConfig::load(config.as_deref())?;
            if let Some(dir) = data_dir {
                fleet.worker.data_dir = dir;
            }
            worker_mode::run_worker(coordinator, host, port, fleet.worker).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_defaults() {
        let cli = Cli::parse_from(["snapgridd", "worker"]);
        match cli.command {
            Command::Worker {
                coordinator,
                host,
                port,
                data_dir,
                config,
            } => {
                assert_eq!(coordinator, "localhost:8888");
                assert_eq!(host, "localhost");
                assert_eq!(port, 10000);
                assert!(data_dir.is_none());
                assert!(config.is_none());
            }
            Command::Coordinator { .. } => panic!("expected worker"),
        }
    }

    #[test]
    fn coordinator_flags() {
        let cli = Cli::parse_from(["snapgridd", "coordinator", "--port", "9000", "--config", "fleet.toml"]);
        match cli.command {
            Command::Coordinator { port, config } => {
                assert_eq!(port, 9000);
                assert_eq!(config, Some(PathBuf::from("fleet.toml")));
            }
            Command::Worker { .. } => panic!("expected coordinator"),
        }
    }
}
