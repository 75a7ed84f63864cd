//! Seed a containerized test database once, snapshot it, and restore the
//! snapshot before every test instead of re-running migrations.
//!
//! ```no_run
//! use rewind::{DatabaseTarget, EngineKind, EngineStrategy, SeedStrategy, StrategyBuilder};
//! use rewind::exec::DockerCli;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> rewind::Result<()> {
//! let target = DatabaseTarget::new(
//!     EngineKind::MySql,
//!     "Catalog",
//!     "catalog-db",
//!     "Server=localhost;Uid=root;Pwd=secret",
//!     "db/migrations",
//! )?;
//! let mut setup = StrategyBuilder::new(target, Arc::new(DockerCli::default()))
//!     .with_seeder(SeedStrategy::SqlScripts)?
//!     .with_restorer(EngineStrategy::for_engine(EngineKind::MySql))?
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! setup.initialize_once(&cancel).await?;
//! // before each test:
//! setup.reset_before_test(&cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod drivers;
pub mod error;
pub mod exec;
pub mod freshness;
pub mod logging;
pub mod seed;
pub mod setup;
pub mod sql;
pub mod storage;
pub mod target;

#[cfg(test)]
mod test_utils;

pub use builder::{SeedStrategy, StrategyBuilder};
pub use drivers::{EngineStrategy, SnapshotEngine};
pub use error::{ConfigError, Result, RewindError};
pub use freshness::{Freshness, MigrationSource};
pub use seed::Seeder;
pub use setup::{InitOutcome, SetupState, SnapshotSetup, initialize_all};
pub use target::{ConnectionString, DatabaseTarget, EngineKind};
