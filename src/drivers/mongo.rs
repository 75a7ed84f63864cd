//! MongoDB: archive dump and restore.
//!
//! `mongodump` writes a gzipped archive inside the container, next to a
//! marker file holding the dump time in unix milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{SnapshotEngine, source_modified};
use crate::error::{Result, RewindError};
use crate::exec::{ContainerExec, argv, display_command, run_checked, shell_quote};
use crate::freshness::Freshness;
use crate::target::DatabaseTarget;

pub const DEFAULT_ARCHIVE_DIR: &str = "/data/rewind";

/// `cat` exit code when the marker file does not exist.
const MARKER_ABSENT: i32 = 1;

/// `--username`/`--password`/`--authenticationDatabase` for the MongoDB tools.
pub(crate) fn credentials(target: &DatabaseTarget) -> Vec<String> {
    let conn = &target.connection;
    let mut args = Vec::new();
    if let Some(user) = conn.user() {
        args.push(format!("--username={}", user));
    }
    if let Some(password) = conn.password() {
        args.push(format!("--password={}", password));
    }
    if conn.user().is_some() {
        args.push(format!(
            "--authenticationDatabase={}",
            conn.auth_database().unwrap_or("admin")
        ));
    }
    args
}

pub struct ArchiveEngine {
    exec: Arc<dyn ContainerExec>,
    archive_dir: String,
}

impl ArchiveEngine {
    pub fn new(exec: Arc<dyn ContainerExec>) -> Self {
        Self {
            exec,
            archive_dir: DEFAULT_ARCHIVE_DIR.to_string(),
        }
    }

    pub fn with_archive_dir(mut self, dir: impl Into<String>) -> Self {
        self.archive_dir = dir.into().trim_end_matches('/').to_string();
        self
    }

    pub fn archive_path(&self, database: &str) -> String {
        format!("{}/{}.archive", self.archive_dir, database)
    }

    pub fn marker_path(&self, database: &str) -> String {
        format!("{}/{}.timestamp", self.archive_dir, database)
    }

    async fn dump(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        let db = &target.database;
        let exec = self.exec.as_ref();

        let mkdir = argv(["mkdir", "-p", self.archive_dir.as_str()]);
        run_checked(exec, &target.container, &mkdir, cancel).await?;

        let mut dump = argv(["mongodump"]);
        dump.extend(credentials(target));
        dump.push(format!("--db={}", db));
        dump.push(format!("--archive={}", self.archive_path(db)));
        dump.push("--gzip".to_string());
        run_checked(exec, &target.container, &dump, cancel).await?;

        let millis = Utc::now().timestamp_millis();
        let write_marker = format!(
            "printf '%s' {} > {}",
            millis,
            shell_quote(&self.marker_path(db))
        );
        run_checked(
            exec,
            &target.container,
            &argv(["sh".to_string(), "-c".to_string(), write_marker]),
            cancel,
        )
        .await?;
        tracing::info!(database = %db, archive = %self.archive_path(db), "dumped database archive");
        Ok(())
    }

    async fn load(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        let db = &target.database;
        let mut restore = argv(["mongorestore"]);
        restore.extend(credentials(target));
        restore.extend([
            "--drop".to_string(),
            format!("--archive={}", self.archive_path(db)),
            "--gzip".to_string(),
            format!("--nsInclude={}.*", db),
        ]);
        tracing::debug!(database = %db, "restoring from archive");
        run_checked(self.exec.as_ref(), &target.container, &restore, cancel).await?;
        Ok(())
    }

    /// When the archive was taken. `None` when there is no marker yet.
    async fn dumped_at(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        let cmd = argv(["cat".to_string(), self.marker_path(&target.database)]);
        let out = self.exec.exec(&target.container, &cmd, cancel).await?;
        if out.exit_code == MARKER_ABSENT {
            return Ok(None);
        }
        if !out.success() || !out.stderr.trim().is_empty() {
            return Err(out.into_error(&cmd));
        }
        let parsed = out
            .stdout
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        match parsed {
            Some(at) => Ok(Some(at)),
            None => {
                tracing::warn!(
                    database = %target.database,
                    command = %display_command(&cmd),
                    content = %out.stdout.trim(),
                    "unreadable snapshot marker, treating as stale"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SnapshotEngine for ArchiveEngine {
    fn name(&self) -> &'static str {
        "archive-dump-restore"
    }

    async fn snapshot(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.dump(target, cancel)
            .await
            .map_err(|e| RewindError::snapshot_failed(&target.database, e))
    }

    async fn restore(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.load(target, cancel)
            .await
            .map_err(|e| RewindError::restore_failed(&target.database, e))
    }

    async fn is_snapshot_up_to_date(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let source = source_modified(target)?;
        let dumped_at = self.dumped_at(target, cancel).await?;
        if dumped_at.is_none() {
            tracing::warn!(database = %target.database, "no archive marker found");
        }
        let freshness = Freshness::compare(dumped_at, source);
        tracing::info!(
            database = %target.database,
            ?dumped_at,
            source_modified = %source,
            ?freshness,
            "archive freshness"
        );
        Ok(freshness.is_fresh())
    }
}

#[cfg(test)]
#[path = "mongo_test.rs"]
mod tests;
