//! MySQL: golden-copy snapshots.
//!
//! MySQL has no snapshot primitive, so the snapshot is a parallel schema
//! (`{db}_golden_state`) holding a copy of every base table. Restoring
//! truncates the live tables and copies the rows back; the live schema
//! itself is never dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{SnapshotEngine, source_modified};
use crate::error::{Result, RewindError};
use crate::freshness::Freshness;
use crate::sql::{
    ConnectionFactory, SqlConnection, query_column, query_scalar, quote_ident, quote_literal,
};
use crate::target::{DatabaseTarget, EngineKind};

pub const DEFAULT_GOLDEN_SUFFIX: &str = "_golden_state";

/// Table inside the golden schema recording when the copy was taken.
pub const MARKER_TABLE: &str = "__rewind_snapshot";

pub struct GoldenCopyEngine {
    connector: Arc<dyn ConnectionFactory>,
    suffix: String,
}

fn ident(name: &str) -> String {
    quote_ident(EngineKind::MySql, name)
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", ident(schema), ident(table))
}

impl GoldenCopyEngine {
    pub fn new(connector: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            connector,
            suffix: DEFAULT_GOLDEN_SUFFIX.to_string(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn golden_schema(&self, database: &str) -> String {
        format!("{}{}", database, self.suffix)
    }

    async fn base_tables(
        &self,
        conn: &dyn SqlConnection,
        schema: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = {} AND table_type = 'BASE TABLE' ORDER BY table_name",
            quote_literal(schema)
        );
        let mut tables = query_column(conn, &sql, cancel).await?;
        tables.retain(|t| t != MARKER_TABLE);
        Ok(tables)
    }

    /// When the golden copy was taken, or `None` if there is none.
    async fn taken_at(
        &self,
        conn: &dyn SqlConnection,
        golden: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        let exists = query_scalar(
            conn,
            &format!(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
                quote_literal(golden),
                quote_literal(MARKER_TABLE)
            ),
            cancel,
        )
        .await?;
        if exists.as_deref().unwrap_or("0") == "0" {
            return Ok(None);
        }
        let millis = query_scalar(
            conn,
            &format!("SELECT MAX(taken_at_ms) FROM {}", qualified(golden, MARKER_TABLE)),
            cancel,
        )
        .await?;
        Ok(millis
            .and_then(|m| m.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis))
    }

    async fn copy_to_golden(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let db = &target.database;
        let golden = self.golden_schema(db);
        let conn = self.connector.open(target, None).await?;
        let taken_at = Utc::now();

        // Needs MySQL 8.0.21+ and INNODB_REDO_LOG_ENABLE; only a speedup.
        if let Err(e) = conn.execute("ALTER INSTANCE DISABLE INNODB REDO_LOG", cancel).await {
            if e.is_cancelled() {
                return Err(e);
            }
            tracing::warn!(database = %db, error = %e, "could not disable redo log");
        }

        let tables = self.base_tables(conn.as_ref(), db, cancel).await?;
        let mut batch = vec![
            "SET FOREIGN_KEY_CHECKS = 0".to_string(),
            "SET UNIQUE_CHECKS = 0".to_string(),
            format!("DROP DATABASE IF EXISTS {}", ident(&golden)),
            format!("CREATE DATABASE {}", ident(&golden)),
        ];
        for table in &tables {
            batch.push(format!(
                "CREATE TABLE {} LIKE {}",
                qualified(&golden, table),
                qualified(db, table)
            ));
            batch.push(format!(
                "INSERT INTO {} SELECT * FROM {}",
                qualified(&golden, table),
                qualified(db, table)
            ));
        }
        batch.push(format!(
            "CREATE TABLE {} (taken_at_ms BIGINT NOT NULL)",
            qualified(&golden, MARKER_TABLE)
        ));
        batch.push(format!(
            "INSERT INTO {} (taken_at_ms) VALUES ({})",
            qualified(&golden, MARKER_TABLE),
            taken_at.timestamp_millis()
        ));
        batch.push("SET UNIQUE_CHECKS = 1".to_string());
        batch.push("SET FOREIGN_KEY_CHECKS = 1".to_string());

        conn.execute(&(batch.join(";\n") + ";"), cancel).await?;
        tracing::info!(
            database = %db,
            golden = %golden,
            tables = tables.len(),
            "copied tables to golden schema"
        );
        Ok(())
    }

    async fn copy_from_golden(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let db = &target.database;
        let golden = self.golden_schema(db);
        let conn = self.connector.open(target, None).await?;

        if self.taken_at(conn.as_ref(), &golden, cancel).await?.is_none() {
            return Err(RewindError::NoSnapshot(db.clone()));
        }
        let tables = self.base_tables(conn.as_ref(), &golden, cancel).await?;

        let mut batch = vec!["SET FOREIGN_KEY_CHECKS = 0".to_string()];
        for table in &tables {
            batch.push(format!("TRUNCATE TABLE {}", qualified(db, table)));
            batch.push(format!(
                "INSERT INTO {} SELECT * FROM {}",
                qualified(db, table),
                qualified(&golden, table)
            ));
        }
        batch.push("SET FOREIGN_KEY_CHECKS = 1".to_string());

        tracing::debug!(database = %db, tables = tables.len(), "restoring from golden schema");
        conn.execute(&(batch.join(";\n") + ";"), cancel).await
    }
}

#[async_trait]
impl SnapshotEngine for GoldenCopyEngine {
    fn name(&self) -> &'static str {
        "golden-copy"
    }

    async fn snapshot(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.copy_to_golden(target, cancel)
            .await
            .map_err(|e| RewindError::snapshot_failed(&target.database, e))
    }

    async fn restore(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.copy_from_golden(target, cancel)
            .await
            .map_err(|e| RewindError::restore_failed(&target.database, e))
    }

    async fn is_snapshot_up_to_date(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let source = source_modified(target)?;
        let conn = self.connector.open(target, None).await?;
        let taken_at = self
            .taken_at(conn.as_ref(), &self.golden_schema(&target.database), cancel)
            .await?;
        let freshness = Freshness::compare(taken_at, source);
        tracing::info!(
            database = %target.database,
            ?taken_at,
            source_modified = %source,
            ?freshness,
            "golden copy freshness"
        );
        Ok(freshness.is_fresh())
    }
}

#[cfg(test)]
#[path = "mysql_test.rs"]
mod tests;
