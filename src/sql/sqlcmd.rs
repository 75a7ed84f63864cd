use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ConnectionFactory, Row, SqlConnection, parse_rows, split_batches};
use crate::error::{ConfigError, Result};
use crate::exec::{ContainerExec, display_command, run_checked};
use crate::target::DatabaseTarget;

pub const DEFAULT_SQLCMD: &str = "/opt/mssql-tools18/bin/sqlcmd";

/// SQL Server connections through `sqlcmd` inside the server container.
#[derive(Clone)]
pub struct SqlcmdConnector {
    exec: Arc<dyn ContainerExec>,
    binary: String,
}

impl SqlcmdConnector {
    pub fn new(exec: Arc<dyn ContainerExec>) -> Self {
        Self {
            exec,
            binary: DEFAULT_SQLCMD.to_string(),
        }
    }

    /// Older images ship `/opt/mssql-tools/bin/sqlcmd`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl ConnectionFactory for SqlcmdConnector {
    async fn open(
        &self,
        target: &DatabaseTarget,
        database: Option<&str>,
    ) -> Result<Box<dyn SqlConnection>> {
        let user = target.connection.user().unwrap_or("sa").to_string();
        let password = target.connection.password().ok_or_else(|| {
            ConfigError::InvalidConnectionString(format!(
                "no password for '{}' in connection string",
                target.database
            ))
        })?;
        Ok(Box::new(SqlcmdConnection {
            exec: self.exec.clone(),
            container: target.container.clone(),
            binary: self.binary.clone(),
            user,
            password: password.to_string(),
            database: database.unwrap_or("master").to_string(),
        }))
    }
}

struct SqlcmdConnection {
    exec: Arc<dyn ContainerExec>,
    container: String,
    binary: String,
    user: String,
    password: String,
    database: String,
}

impl SqlcmdConnection {
    fn argv(&self, sql: &str) -> Vec<String> {
        vec![
            self.binary.clone(),
            "-S".into(),
            "localhost".into(),
            "-U".into(),
            self.user.clone(),
            "-P".into(),
            self.password.clone(),
            "-d".into(),
            self.database.clone(),
            // trust the self-signed cert, abort on error, quoted identifiers on
            "-C".into(),
            "-b".into(),
            "-I".into(),
            // no headers, trimmed cells, tab separated
            "-h".into(),
            "-1".into(),
            "-W".into(),
            "-s".into(),
            "\t".into(),
            "-Q".into(),
            format!("SET NOCOUNT ON;\n{}", sql),
        ]
    }
}

#[async_trait]
impl SqlConnection for SqlcmdConnection {
    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<()> {
        for batch in split_batches(sql) {
            let argv = self.argv(&batch);
            run_checked(self.exec.as_ref(), &self.container, &argv, cancel).await?;
        }
        Ok(())
    }

    async fn query(&self, sql: &str, cancel: &CancellationToken) -> Result<Vec<Row>> {
        let argv = self.argv(sql);
        let out = run_checked(self.exec.as_ref(), &self.container, &argv, cancel).await?;
        tracing::trace!(
            command = %display_command(&argv),
            rows = out.stdout.lines().count(),
            "query"
        );
        Ok(parse_rows(&out.stdout))
    }
}
