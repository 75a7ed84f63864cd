use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::target::DatabaseTarget;

pub mod mongo;
pub mod mysql;
pub mod selector;
pub mod sqlserver;

pub use mongo::ArchiveEngine;
pub use mysql::GoldenCopyEngine;
pub use selector::{EngineStrategy, select_engine};
pub use sqlserver::FilesystemSnapshotEngine;

/// Engine-specific snapshot primitive.
///
/// Each database engine captures and restores state its own way; the
/// snapshot record each one leaves behind is opaque to everything else.
#[async_trait]
pub trait SnapshotEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capture the database's current content as the new snapshot.
    /// Failures surface as `SnapshotFailed`.
    async fn snapshot(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()>;

    /// Revert the live database to the most recent snapshot.
    /// Failures surface as `RestoreFailed`; restoring twice in a row leaves
    /// the same state as restoring once.
    async fn restore(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> Result<()>;

    /// True only if a snapshot exists and is at least as new as the
    /// target's migration source. "No snapshot yet" is `Ok(false)`, not an error.
    async fn is_snapshot_up_to_date(
        &self,
        target: &DatabaseTarget,
        cancel: &CancellationToken,
    ) -> Result<bool>;
}

/// Latest modification of the target's migration source.
pub(crate) fn source_modified(target: &DatabaseTarget) -> Result<DateTime<Utc>> {
    target.migrations.latest_modification()
}
