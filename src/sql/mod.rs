//! SQL connections to the database under test.
//!
//! The snapshot engines only need to send statement batches and read back
//! small result sets, so a connection is two calls: `execute` and `query`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::exec::ContainerExec;
use crate::target::{DatabaseTarget, EngineKind};

pub mod mysql;
pub mod sqlcmd;

pub use mysql::MysqlClientConnector;
pub use sqlcmd::SqlcmdConnector;

/// One row of text columns; `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Run a batch of statements in one session.
    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<()>;

    /// Run a query and return its rows as text.
    async fn query(&self, sql: &str, cancel: &CancellationToken) -> Result<Vec<Row>>;
}

/// Opens connections to the server hosting a target.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// `database` selects the session's default database; `None` means the
    /// server default (`master` / no database).
    async fn open(
        &self,
        target: &DatabaseTarget,
        database: Option<&str>,
    ) -> Result<Box<dyn SqlConnection>>;
}

/// The engine's own command-line client, reached through `exec`.
/// MongoDB has no SQL surface.
pub fn default_connector(
    engine: EngineKind,
    exec: Arc<dyn ContainerExec>,
) -> Option<Arc<dyn ConnectionFactory>> {
    match engine {
        EngineKind::SqlServer => Some(Arc::new(SqlcmdConnector::new(exec))),
        EngineKind::MySql => Some(Arc::new(MysqlClientConnector::new(exec))),
        EngineKind::MongoDb => None,
    }
}

/// First column of the first row, if any.
pub async fn query_scalar(
    conn: &dyn SqlConnection,
    sql: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let rows = conn.query(sql, cancel).await?;
    Ok(rows.into_iter().next().and_then(|r| r.into_iter().next().flatten()))
}

/// First column of every row, skipping NULLs.
pub async fn query_column(
    conn: &dyn SqlConnection,
    sql: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let rows = conn.query(sql, cancel).await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| r.into_iter().next().flatten())
        .collect())
}

/// Quote an identifier for the engine's SQL dialect.
pub fn quote_ident(engine: EngineKind, name: &str) -> String {
    match engine {
        EngineKind::SqlServer => format!("[{}]", name.replace(']', "]]")),
        _ => format!("`{}`", name.replace('`', "``")),
    }
}

/// Quote a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Split a T-SQL script into batches on `GO` separator lines.
pub fn split_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for line in script.lines() {
        if line.trim().eq_ignore_ascii_case("go") {
            push_batch(&mut batches, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_batch(&mut batches, &mut current);
    batches
}

fn push_batch(batches: &mut Vec<String>, current: &mut String) {
    let batch = std::mem::take(current);
    if !batch.trim().is_empty() {
        batches.push(batch.trim_end().to_string());
    }
}

/// Parse tab-separated client output into rows. The literal `NULL` is SQL NULL.
pub(crate) fn parse_rows(stdout: &str) -> Vec<Row> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            line.split('\t')
                .map(|cell| {
                    let cell = cell.trim();
                    if cell == "NULL" {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
#[path = "sql_test.rs"]
mod tests;
