use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::Seeder;
use crate::error::{ConfigError, Result, RewindError};
use crate::exec::display_command;
use crate::target::DatabaseTarget;

/// Something that applies schema migrations to a target: an ORM's
/// migration runner, `sqlx migrate run`, a project script.
#[async_trait]
pub trait SchemaMigrator: Send + Sync {
    async fn migrate(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()>;
}

/// Runs a host command with the target's connection string in its
/// environment (`DATABASE_URL` unless overridden).
#[derive(Debug, Clone)]
pub struct CommandMigrator {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env_var: String,
}

impl CommandMigrator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env_var: "DATABASE_URL".to_string(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl SchemaMigrator for CommandMigrator {
    async fn migrate(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(RewindError::Cancelled);
        }
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(&self.env_var, target.connection.raw())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        tracing::debug!(
            database = %target.database,
            command = %display_command(&self.argv()),
            "running migrator"
        );

        let child = cmd.spawn()?;
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => return Err(RewindError::Cancelled),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(RewindError::ExecFailed {
                command: display_command(&self.argv()),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        Ok(())
    }
}

/// Seeds by handing the target to its own migrator.
pub struct MigratorSeeder {
    migrator: Arc<dyn SchemaMigrator>,
}

impl MigratorSeeder {
    /// Fails unless the target carries a migrator.
    pub fn bind(target: &DatabaseTarget) -> Result<Self> {
        let migrator = target.migrator().cloned().ok_or_else(|| ConfigError::MissingCapability {
            database: target.database.clone(),
            capability: "schema migrator",
        })?;
        Ok(Self { migrator })
    }
}

#[async_trait]
impl Seeder for MigratorSeeder {
    fn name(&self) -> &'static str {
        "migrator"
    }

    async fn seed(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.migrator
            .migrate(target, cancel)
            .await
            .map_err(|e| RewindError::seed_failed(&target.database, e))?;
        tracing::info!(database = %target.database, "seeded through migrator");
        Ok(())
    }
}
