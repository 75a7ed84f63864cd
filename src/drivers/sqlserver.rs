//! SQL Server: copy-on-write database snapshots.
//!
//! Snapshot files live in a directory inside the container that is expected
//! to be a mounted volume, so snapshots survive container restarts between
//! test sessions. The snapshot files' mtimes are the freshness record.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{SnapshotEngine, source_modified};
use crate::error::{Result, RewindError};
use crate::exec::{ContainerExec, ProbeCodes, argv, run_checked, shell_quote};
use crate::sql::{ConnectionFactory, SqlConnection, query_column, quote_ident, quote_literal};
use crate::target::{DatabaseTarget, EngineKind};

pub const DEFAULT_SNAPSHOT_DIR: &str = "/var/opt/mssql/snapshots";

/// Both probes (mount check, find-newer) answer 0 for yes and 1 or 2 for no.
const PROBE: ProbeCodes = ProbeCodes {
    yes: &[0],
    no: &[1, 2],
};

/// `find -newermt` is strictly newer-than; back off one nanosecond so a
/// snapshot stamped at the same instant as the sources counts as fresh.
fn newermt_reference(since: DateTime<Utc>) -> String {
    let at = since - Duration::nanoseconds(1);
    format!("@{}.{:09}", at.timestamp(), at.timestamp_subsec_nanos())
}

pub struct FilesystemSnapshotEngine {
    exec: Arc<dyn ContainerExec>,
    connector: Arc<dyn ConnectionFactory>,
    snapshot_dir: String,
}

impl FilesystemSnapshotEngine {
    pub fn new(exec: Arc<dyn ContainerExec>, connector: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            exec,
            connector,
            snapshot_dir: DEFAULT_SNAPSHOT_DIR.to_string(),
        }
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<String>) -> Self {
        self.snapshot_dir = dir.into().trim_end_matches('/').to_string();
        self
    }

    pub fn snapshot_dir(&self) -> &str {
        &self.snapshot_dir
    }

    /// `{db}_snapshot_{unixSeconds}`
    pub fn snapshot_name(database: &str, unix_seconds: i64) -> String {
        format!("{}_snapshot_{}", database, unix_seconds)
    }

    fn file_glob(&self, database: &str) -> String {
        format!("{}_snapshot_*.ss", database)
    }

    async fn is_mounted(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let cmd = argv([
            "grep".to_string(),
            "-qs".to_string(),
            format!(" {} ", self.snapshot_dir),
            "/proc/mounts".to_string(),
        ]);
        let out = self.exec.exec(&target.container, &cmd, cancel).await?;
        PROBE.classify(out, &cmd)
    }

    async fn has_newer_snapshot(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let since = source_modified(target)?;
        let script = format!(
            "find {} -maxdepth 1 -name {} -newermt {} -print | grep -q .",
            shell_quote(&self.snapshot_dir),
            shell_quote(&self.file_glob(&target.database)),
            shell_quote(&newermt_reference(since)),
        );
        let cmd = argv(["sh".to_string(), "-c".to_string(), script]);
        let out = self.exec.exec(&target.container, &cmd, cancel).await?;
        PROBE.classify(out, &cmd)
    }

    /// Snapshots of `database`, newest first.
    async fn list_snapshots(
        &self,
        conn: &dyn SqlConnection,
        database: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM sys.databases WHERE source_database_id = DB_ID({}) ORDER BY create_date DESC, name DESC",
            quote_literal(database)
        );
        query_column(conn, &sql, cancel).await
    }

    async fn take_snapshot(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let db = quote_ident(EngineKind::SqlServer, &target.database);
        let master = self.connector.open(target, None).await?;

        // Test databases: trade durability for speed.
        master
            .execute(&format!("ALTER DATABASE {} SET RECOVERY SIMPLE", db), cancel)
            .await?;
        let live = self.connector.open(target, Some(&target.database)).await?;
        live.execute("CHECKPOINT;\nDBCC SHRINKFILE (2, 1) WITH NO_INFOMSGS;", cancel)
            .await?;

        let data_files = query_column(
            master.as_ref(),
            &format!(
                "SELECT name FROM sys.master_files WHERE database_id = DB_ID({}) AND type = 0 ORDER BY file_id",
                quote_literal(&target.database)
            ),
            cancel,
        )
        .await?;
        if data_files.is_empty() {
            return Err(RewindError::Sql(format!(
                "no data files found for database '{}'",
                target.database
            )));
        }

        let name = Self::snapshot_name(&target.database, Utc::now().timestamp());
        let files: Vec<String> = data_files
            .iter()
            .map(|logical| {
                format!(
                    "(NAME = {}, FILENAME = {})",
                    quote_ident(EngineKind::SqlServer, logical),
                    quote_literal(&format!("{}/{}_{}.ss", self.snapshot_dir, name, logical))
                )
            })
            .collect();
        let create = format!(
            "CREATE DATABASE {} ON {} AS SNAPSHOT OF {}",
            quote_ident(EngineKind::SqlServer, &name),
            files.join(", "),
            db
        );
        master.execute(&create, cancel).await?;
        tracing::info!(database = %target.database, snapshot = %name, "created database snapshot");

        // The server preallocates the sparse files before the snapshot is
        // consistent; stamp them once it is.
        let touch = format!(
            "touch {}/{}_*.ss",
            shell_quote(&self.snapshot_dir),
            shell_quote(&name)
        );
        run_checked(
            self.exec.as_ref(),
            &target.container,
            &argv(["sh".to_string(), "-c".to_string(), touch]),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn restore_latest(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let master = self.connector.open(target, None).await?;
        let snapshots = self.list_snapshots(master.as_ref(), &target.database, cancel).await?;
        let (latest, stale) = snapshots
            .split_first()
            .ok_or_else(|| RewindError::NoSnapshot(target.database.clone()))?;

        let db = quote_ident(EngineKind::SqlServer, &target.database);
        let mut batch = format!("ALTER DATABASE {} SET SINGLE_USER WITH ROLLBACK IMMEDIATE;\n", db);
        batch.push_str("BEGIN TRY\n");
        for old in stale {
            batch.push_str(&format!(
                "    DROP DATABASE {};\n",
                quote_ident(EngineKind::SqlServer, old)
            ));
        }
        batch.push_str(&format!(
            "    RESTORE DATABASE {} FROM DATABASE_SNAPSHOT = {};\n",
            db,
            quote_literal(latest)
        ));
        batch.push_str("END TRY\nBEGIN CATCH\n");
        batch.push_str(&format!(
            "    ALTER DATABASE {} SET MULTI_USER;\n    THROW;\nEND CATCH\n",
            db
        ));
        batch.push_str(&format!("ALTER DATABASE {} SET MULTI_USER;", db));

        tracing::debug!(
            database = %target.database,
            snapshot = %latest,
            dropped = stale.len(),
            "restoring from database snapshot"
        );
        master.execute(&batch, cancel).await
    }
}

#[async_trait]
impl SnapshotEngine for FilesystemSnapshotEngine {
    fn name(&self) -> &'static str {
        "filesystem-snapshot"
    }

    async fn snapshot(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.take_snapshot(target, cancel)
            .await
            .map_err(|e| RewindError::snapshot_failed(&target.database, e))
    }

    async fn restore(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.restore_latest(target, cancel)
            .await
            .map_err(|e| RewindError::restore_failed(&target.database, e))
    }

    async fn is_snapshot_up_to_date(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !self.is_mounted(target, cancel).await? {
            tracing::warn!(
                database = %target.database,
                dir = %self.snapshot_dir,
                "snapshot directory is not mounted"
            );
            return Ok(false);
        }
        let fresh = self.has_newer_snapshot(target, cancel).await?;
        if !fresh {
            tracing::info!(database = %target.database, "no snapshot newer than migration source");
        }
        Ok(fresh)
    }
}

#[cfg(test)]
#[path = "sqlserver_test.rs"]
mod tests;
