//! Child-process helper shared by the CLI-backed collaborators.

use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Run `cmd` to completion, turning a non-zero exit into `CommandFailed`.
pub(crate) async fn run(program: &str, cmd: &mut Command) -> WorkerResult<Output> {
    debug!(?cmd, "running");
    let output = cmd.kill_on_drop(true).output().await?;
    if !output.status.success() {
        return Err(WorkerError::CommandFailed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_zero_exit_is_command_failed() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        let err = run("sh", &mut cmd).await.unwrap_err();
        match err {
            WorkerError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let mut cmd = Command::new("snapgrid-definitely-not-installed");
        assert!(matches!(
            run("missing", &mut cmd).await,
            Err(WorkerError::Io(_))
        ));
    }
}
