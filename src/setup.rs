//! Per-target orchestration: restore when the snapshot is fresh, otherwise
//! seed and snapshot; restore before every test.

use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::drivers::SnapshotEngine;
use crate::error::Result;
use crate::freshness::Freshness;
use crate::seed::Seeder;
use crate::target::DatabaseTarget;

/// What `initialize_once` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Restored,
    SeededAndSnapshotted,
}

impl fmt::Display for InitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitOutcome::Restored => f.write_str("restored from snapshot"),
            InitOutcome::SeededAndSnapshotted => f.write_str("seeded and snapshotted"),
        }
    }
}

/// `Uninitialized` until the first successful `initialize_once`; there is
/// no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    Uninitialized,
    Ready(InitOutcome),
}

/// One target with its snapshot engine and seeder.
///
/// Operations take `&mut self`: a target never has two operations in flight.
/// Independent targets can be driven concurrently with [`initialize_all`].
pub struct SnapshotSetup {
    target: Arc<DatabaseTarget>,
    engine: Box<dyn SnapshotEngine>,
    seeder: Arc<dyn Seeder>,
    state: SetupState,
}

impl SnapshotSetup {
    pub fn new(
        target: Arc<DatabaseTarget>,
        engine: Box<dyn SnapshotEngine>,
        seeder: Arc<dyn Seeder>,
    ) -> Self {
        Self {
            target,
            engine,
            seeder,
            state: SetupState::Uninitialized,
        }
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    pub fn state(&self) -> SetupState {
        self.state
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn seeder_name(&self) -> &'static str {
        self.seeder.name()
    }

    /// Bring the target to its seeded state, reusing the snapshot when it is
    /// at least as new as the migration source.
    ///
    /// After success, later calls return the recorded outcome without I/O.
    /// A failed or cancelled call leaves the state `Uninitialized`.
    pub async fn initialize_once(&mut self, cancel: &CancellationToken) -> Result<InitOutcome> {
        if let SetupState::Ready(outcome) = self.state {
            tracing::debug!(database = %self.target.database, %outcome, "already initialized");
            return Ok(outcome);
        }

        let target = self.target.as_ref();
        let fresh = target.restore && self.engine.is_snapshot_up_to_date(target, cancel).await?;

        let outcome = if fresh {
            self.engine.restore(target, cancel).await?;
            InitOutcome::Restored
        } else {
            if !target.restore {
                tracing::info!(database = %target.database, "restore disabled, reseeding");
            }
            self.seeder.seed(target, cancel).await?;
            self.engine.snapshot(target, cancel).await?;
            InitOutcome::SeededAndSnapshotted
        };

        tracing::info!(
            database = %target.database,
            engine = self.engine.name(),
            seeder = self.seeder.name(),
            %outcome,
            "initialized"
        );
        self.state = SetupState::Ready(outcome);
        Ok(outcome)
    }

    /// Restore the snapshot. Never reseeds: a missing snapshot here is a
    /// configuration bug and fails as `RestoreFailed`.
    pub async fn reset_before_test(&mut self, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(database = %self.target.database, "reset before test");
        self.engine.restore(&self.target, cancel).await
    }

    /// Freshness of the current snapshot. Probes the engine but never seeds
    /// or restores.
    pub async fn status(&self, cancel: &CancellationToken) -> Result<Freshness> {
        let fresh = self.engine.is_snapshot_up_to_date(&self.target, cancel).await?;
        Ok(if fresh { Freshness::Fresh } else { Freshness::Stale })
    }

    /// Seed and snapshot unconditionally.
    pub async fn refresh(&mut self, cancel: &CancellationToken) -> Result<()> {
        let target = self.target.as_ref();
        self.seeder.seed(target, cancel).await?;
        self.engine.snapshot(target, cancel).await?;
        self.state = SetupState::Ready(InitOutcome::SeededAndSnapshotted);
        Ok(())
    }
}

impl fmt::Debug for SnapshotSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotSetup")
            .field("target", &self.target)
            .field("engine", &self.engine.name())
            .field("seeder", &self.seeder.name())
            .field("state", &self.state)
            .finish()
    }
}

/// Initialize independent targets concurrently. Results are in input order;
/// one target failing does not stop the others.
pub async fn initialize_all(
    setups: &mut [SnapshotSetup],
    cancel: &CancellationToken,
) -> Vec<Result<InitOutcome>> {
    join_all(setups.iter_mut().map(|s| s.initialize_once(cancel))).await
}

#[cfg(test)]
#[path = "setup_test.rs"]
mod tests;
