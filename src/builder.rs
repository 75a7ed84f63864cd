//! Validating assembly of a [`SnapshotSetup`].
//!
//! A builder has two slots, one seeder and one restorer (snapshot engine).
//! Each slot is bound against the target as soon as it is set, so every
//! configuration problem surfaces before any container I/O.

use std::fmt;
use std::sync::Arc;

use crate::drivers::{EngineStrategy, SnapshotEngine, select_engine};
use crate::error::{ConfigError, Result};
use crate::exec::ContainerExec;
use crate::seed::{MigratorSeeder, Seeder, SqlScriptSeeder};
use crate::setup::SnapshotSetup;
use crate::sql::ConnectionFactory;
use crate::target::DatabaseTarget;

/// How a target gets seeded.
#[derive(Clone)]
pub enum SeedStrategy {
    /// Recreate the database and run the migration files in order.
    SqlScripts,
    /// Hand the target to the migrator it carries.
    Migrator,
    Custom(Arc<dyn Seeder>),
}

impl fmt::Debug for SeedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedStrategy::SqlScripts => f.write_str("SqlScripts"),
            SeedStrategy::Migrator => f.write_str("Migrator"),
            SeedStrategy::Custom(s) => f.debug_tuple("Custom").field(&s.name()).finish(),
        }
    }
}

pub struct StrategyBuilder {
    target: Arc<DatabaseTarget>,
    exec: Arc<dyn ContainerExec>,
    connector: Option<Arc<dyn ConnectionFactory>>,
    seeder: Option<Arc<dyn Seeder>>,
    restorer: Option<Box<dyn SnapshotEngine>>,
}

impl StrategyBuilder {
    pub fn new(target: impl Into<Arc<DatabaseTarget>>, exec: Arc<dyn ContainerExec>) -> Self {
        Self {
            target: target.into(),
            exec,
            connector: None,
            seeder: None,
            restorer: None,
        }
    }

    /// SQL client for the seeder and restorer; defaults to the engine's
    /// own CLI client in the container. Slots bind on set, so this must
    /// come before either of them.
    pub fn with_connector(mut self, connector: Arc<dyn ConnectionFactory>) -> Result<Self> {
        if self.seeder.is_some() {
            return Err(ConfigError::ConnectorAfterSlot("seeder").into());
        }
        if self.restorer.is_some() {
            return Err(ConfigError::ConnectorAfterSlot("restorer").into());
        }
        self.connector = Some(connector);
        Ok(self)
    }

    pub fn with_seeder(mut self, strategy: SeedStrategy) -> Result<Self> {
        if self.seeder.is_some() {
            return Err(ConfigError::SlotAlreadyConfigured("seeder").into());
        }
        let seeder: Arc<dyn Seeder> = match strategy {
            SeedStrategy::SqlScripts => Arc::new(SqlScriptSeeder::bind(
                &self.target,
                self.exec.clone(),
                self.connector.clone(),
            )?),
            SeedStrategy::Migrator => Arc::new(MigratorSeeder::bind(&self.target)?),
            SeedStrategy::Custom(seeder) => seeder,
        };
        self.seeder = Some(seeder);
        Ok(self)
    }

    pub fn with_restorer(mut self, strategy: EngineStrategy) -> Result<Self> {
        if self.restorer.is_some() {
            return Err(ConfigError::SlotAlreadyConfigured("restorer").into());
        }
        let engine = select_engine(
            &strategy,
            &self.target,
            self.exec.clone(),
            self.connector.clone(),
        )?;
        self.restorer = Some(engine);
        Ok(self)
    }

    pub fn build(self) -> Result<SnapshotSetup> {
        let seeder = self.seeder.ok_or(ConfigError::SlotMissing("seeder"))?;
        let restorer = self.restorer.ok_or(ConfigError::SlotMissing("restorer"))?;
        tracing::debug!(
            database = %self.target.database,
            seeder = seeder.name(),
            restorer = restorer.name(),
            "assembled snapshot setup"
        );
        Ok(SnapshotSetup::new(self.target, restorer, seeder))
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
