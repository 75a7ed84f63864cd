//! Running commands inside database containers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RewindError};

pub mod docker;

pub use docker::DockerCli;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `ExecFailed`.
    pub fn check(self, argv: &[String]) -> Result<ExecOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(self.into_error(argv))
        }
    }

    pub fn into_error(self, argv: &[String]) -> RewindError {
        // Some clients (sqlcmd, mysql) report errors on stdout.
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        RewindError::ExecFailed {
            command: display_command(argv),
            exit_code: self.exit_code,
            stderr: detail,
        }
    }
}

/// Runs argv inside a running container.
///
/// Implementations must observe `cancel` and return `RewindError::Cancelled`
/// once it fires. Non-zero exits are returned as data, not errors; callers
/// decide which exit codes are expected.
#[async_trait]
pub trait ContainerExec: Send + Sync {
    async fn exec(
        &self,
        container: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput>;
}

/// Exit codes a probe command may legitimately return.
///
/// Probes answer yes/no questions ("is it mounted?", "is there a marker?").
/// A `yes` or `no` code is an ordinary answer; anything else means the probe
/// itself broke and is reported as `ExecFailed`.
#[derive(Debug, Clone, Copy)]
pub struct ProbeCodes {
    pub yes: &'static [i32],
    pub no: &'static [i32],
}

impl ProbeCodes {
    pub fn classify(&self, output: ExecOutput, argv: &[String]) -> Result<bool> {
        if self.yes.contains(&output.exit_code) {
            Ok(true)
        } else if self.no.contains(&output.exit_code) {
            Ok(false)
        } else {
            Err(output.into_error(argv))
        }
    }
}

/// Run argv and fail on any non-zero exit.
pub async fn run_checked(
    exec: &dyn ContainerExec,
    container: &str,
    argv: &[String],
    cancel: &CancellationToken,
) -> Result<ExecOutput> {
    tracing::debug!(container, command = %display_command(argv), "exec");
    exec.exec(container, argv, cancel).await?.check(argv)
}

/// Build an owned argv from string slices.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

const SECRET_FLAGS: &[&str] = &["-P", "--password", "--pass"];

/// Render argv for logs and errors with password arguments masked.
pub fn display_command(argv: &[String]) -> String {
    // Only the mysql client takes its password glued to `-p`; elsewhere
    // `-p` is an ordinary flag (`mkdir -p`).
    let mysql_client = argv
        .first()
        .and_then(|p| p.rsplit('/').next())
        .is_some_and(|p| p.starts_with("mysql"));
    let mut out = Vec::with_capacity(argv.len());
    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            out.push("****".to_string());
            mask_next = false;
            continue;
        }
        if SECRET_FLAGS.contains(&arg.as_str()) {
            mask_next = true;
            out.push(arg.clone());
        } else if let Some((flag, _)) = arg
            .split_once('=')
            .filter(|(f, _)| SECRET_FLAGS.contains(f))
        {
            out.push(format!("{}=****", flag));
        } else if mysql_client && arg.starts_with("-p") && arg.len() > 2 {
            out.push("-p****".to_string());
        } else {
            out.push(arg.clone());
        }
    }
    out.join(" ")
}

/// Single-quote a value for `sh -c`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "exec_test.rs"]
mod tests;
