use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::Seeder;
use crate::drivers::mongo::credentials;
use crate::error::{ConfigError, Result, RewindError};
use crate::exec::{ContainerExec, argv, run_checked};
use crate::sql::{ConnectionFactory, default_connector, quote_ident, quote_literal};
use crate::target::{DatabaseTarget, EngineKind};

/// Drops and recreates the target database, then runs every file of its
/// migration source in order.
///
/// SQL files go through the connection factory; MongoDB scripts are
/// evaluated by `mongosh` inside the container.
pub struct SqlScriptSeeder {
    exec: Arc<dyn ContainerExec>,
    connector: Option<Arc<dyn ConnectionFactory>>,
}

impl SqlScriptSeeder {
    /// Validate the target's migration files and bind to it.
    pub fn bind(
        target: &DatabaseTarget,
        exec: Arc<dyn ContainerExec>,
        connector: Option<Arc<dyn ConnectionFactory>>,
    ) -> Result<Self> {
        let files = target.migrations.resolve()?;
        let connector = connector.or_else(|| default_connector(target.engine, exec.clone()));
        if target.engine != EngineKind::MongoDb && connector.is_none() {
            return Err(ConfigError::MissingCapability {
                database: target.database.clone(),
                capability: "SQL connection",
            }
            .into());
        }
        tracing::debug!(database = %target.database, files = files.len(), "bound script seeder");
        Ok(Self { exec, connector })
    }

    fn connector(&self, target: &DatabaseTarget) -> Result<&Arc<dyn ConnectionFactory>> {
        self.connector.as_ref().ok_or_else(|| {
            ConfigError::MissingCapability {
                database: target.database.clone(),
                capability: "SQL connection",
            }
            .into()
        })
    }

    async fn recreate(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        let db = &target.database;
        match target.engine {
            EngineKind::SqlServer => {
                let ident = quote_ident(EngineKind::SqlServer, db);
                let literal = quote_literal(db);
                // Snapshots pin their source database; drop them first.
                let sql = format!(
                    "DECLARE @drop NVARCHAR(MAX) = N'';\n\
                     SELECT @drop = @drop + N'DROP DATABASE ' + QUOTENAME(name) + N'; ' FROM sys.databases WHERE source_database_id = DB_ID({literal});\n\
                     EXEC sp_executesql @drop;\n\
                     IF DB_ID({literal}) IS NOT NULL\n\
                     BEGIN\n\
                     ALTER DATABASE {ident} SET SINGLE_USER WITH ROLLBACK IMMEDIATE;\n\
                     DROP DATABASE {ident};\n\
                     END;\n\
                     CREATE DATABASE {ident};"
                );
                let master = self.connector(target)?.open(target, None).await?;
                master.execute(&sql, cancel).await
            }
            EngineKind::MySql => {
                let ident = quote_ident(EngineKind::MySql, db);
                let conn = self.connector(target)?.open(target, None).await?;
                conn.execute(
                    &format!("DROP DATABASE IF EXISTS {ident};\nCREATE DATABASE {ident};"),
                    cancel,
                )
                .await
            }
            EngineKind::MongoDb => {
                self.mongosh(target, "db.dropDatabase()", cancel).await
            }
        }
    }

    async fn mongosh(
        &self,
        target: &DatabaseTarget,
        script: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut cmd = argv(["mongosh", "--quiet"]);
        cmd.extend(credentials(target));
        cmd.push(target.database.clone());
        cmd.push("--eval".to_string());
        cmd.push(script.to_string());
        run_checked(self.exec.as_ref(), &target.container, &cmd, cancel).await?;
        Ok(())
    }

    async fn run_file(
        &self,
        target: &DatabaseTarget,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let script = tokio::fs::read_to_string(path).await?;
        tracing::debug!(database = %target.database, file = %path.display(), "running seed script");
        match target.engine {
            EngineKind::MongoDb => self.mongosh(target, &script, cancel).await,
            _ => {
                let conn = self
                    .connector(target)?
                    .open(target, Some(&target.database))
                    .await?;
                conn.execute(&script, cancel).await
            }
        }
    }

    async fn run(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        // Resolve again: files may have changed since bind.
        let files = target.migrations.resolve()?;
        self.recreate(target, cancel).await?;
        for file in &files {
            self.run_file(target, file, cancel).await?;
        }
        tracing::info!(database = %target.database, files = files.len(), "seeded from scripts");
        Ok(())
    }
}

#[async_trait]
impl Seeder for SqlScriptSeeder {
    fn name(&self) -> &'static str {
        "sql-scripts"
    }

    async fn seed(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()> {
        self.run(target, cancel)
            .await
            .map_err(|e| RewindError::seed_failed(&target.database, e))
    }
}

#[cfg(test)]
#[path = "scripts_test.rs"]
mod tests;
