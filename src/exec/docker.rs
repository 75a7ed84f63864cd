use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{ContainerExec, ExecOutput};
use crate::error::{Result, RewindError};

/// `ContainerExec` backed by the container runtime's CLI (`docker exec`).
///
/// The runtime binary is resolved once by the caller (config file or
/// environment) and passed in; `podman` works as a drop-in.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerExec for DockerCli {
    async fn exec(
        &self,
        container: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput> {
        if cancel.is_cancelled() {
            return Err(RewindError::Cancelled);
        }

        let child = Command::new(&self.binary)
            .arg("exec")
            .arg(container)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on cancellation drops the child, which kills it.
        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                Ok(ExecOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            _ = cancel.cancelled() => Err(RewindError::Cancelled),
        }
    }
}
