//! Seeding: bringing a freshly recreated database to its migrated state.
//!
//! Seeders run before the first snapshot and whenever the snapshot is
//! stale. They are not required to be idempotent against a live database.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::target::DatabaseTarget;

pub mod migrator;
pub mod scripts;

pub use migrator::{CommandMigrator, MigratorSeeder, SchemaMigrator};
pub use scripts::SqlScriptSeeder;

#[async_trait]
pub trait Seeder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Populate the target. Failures surface as `SeedFailed`.
    async fn seed(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()>;
}
