use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ConnectionFactory, Row, SqlConnection, parse_rows};
use crate::error::Result;
use crate::exec::{ContainerExec, run_checked};
use crate::target::DatabaseTarget;

/// MySQL connections through the `mysql` client inside the server container.
/// Each call is one client session, so `SET` statements only last for the
/// batch they appear in.
#[derive(Clone)]
pub struct MysqlClientConnector {
    exec: Arc<dyn ContainerExec>,
    binary: String,
}

impl MysqlClientConnector {
    pub fn new(exec: Arc<dyn ContainerExec>) -> Self {
        Self {
            exec,
            binary: "mysql".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl ConnectionFactory for MysqlClientConnector {
    async fn open(
        &self,
        target: &DatabaseTarget,
        database: Option<&str>,
    ) -> Result<Box<dyn SqlConnection>> {
        Ok(Box::new(MysqlClientConnection {
            exec: self.exec.clone(),
            container: target.container.clone(),
            binary: self.binary.clone(),
            user: target.connection.user().unwrap_or("root").to_string(),
            password: target.connection.password().map(str::to_string),
            database: database.map(str::to_string),
        }))
    }
}

struct MysqlClientConnection {
    exec: Arc<dyn ContainerExec>,
    container: String,
    binary: String,
    user: String,
    password: Option<String>,
    database: Option<String>,
}

impl MysqlClientConnection {
    fn argv(&self, sql: &str) -> Vec<String> {
        let mut argv = vec![
            self.binary.clone(),
            "-h".into(),
            "127.0.0.1".into(),
            "-u".into(),
            self.user.clone(),
        ];
        if let Some(password) = &self.password {
            argv.push(format!("--password={}", password));
        }
        argv.extend([
            "--batch".into(),
            "--skip-column-names".into(),
            "--default-character-set=utf8mb4".into(),
        ]);
        if let Some(db) = &self.database {
            argv.push(format!("--database={}", db));
        }
        argv.push("-e".into());
        argv.push(sql.to_string());
        argv
    }
}

#[async_trait]
impl SqlConnection for MysqlClientConnection {
    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<()> {
        run_checked(self.exec.as_ref(), &self.container, &self.argv(sql), cancel).await?;
        Ok(())
    }

    async fn query(&self, sql: &str, cancel: &CancellationToken) -> Result<Vec<Row>> {
        let out = run_checked(self.exec.as_ref(), &self.container, &self.argv(sql), cancel).await?;
        Ok(parse_rows(&out.stdout))
    }
}
