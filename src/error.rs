//! Error types for rewind

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RewindError
pub type Result<T> = std::result::Result<T, RewindError>;

/// Configuration problems. Always fatal and never retried; raised at
/// construction or bind time, before any container I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("migration source directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("migration source directory is empty: {}", .0.display())]
    EmptySource(PathBuf),

    #[error("migration files not found under {}: {}", .dir.display(), .missing.join(", "))]
    MissingFiles { dir: PathBuf, missing: Vec<String> },

    #[error("migration file '{name}' matches more than one file under {}", .dir.display())]
    AmbiguousFile { dir: PathBuf, name: String },

    #[error("{0} already configured")]
    SlotAlreadyConfigured(&'static str),

    #[error("no {0} configured")]
    SlotMissing(&'static str),

    #[error("connector must be set before the {0}")]
    ConnectorAfterSlot(&'static str),

    #[error("target '{database}' does not expose a {capability}")]
    MissingCapability {
        database: String,
        capability: &'static str,
    },

    #[error("{strategy} cannot be used with {engine} targets")]
    IncompatibleEngine {
        strategy: &'static str,
        engine: &'static str,
    },

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid config file {}: {reason}", .path.display())]
    InvalidConfigFile { path: PathBuf, reason: String },
}

/// Errors raised by snapshot, restore, and seed operations
#[derive(Error, Debug)]
pub enum RewindError {
    /// Configuration error (R001)
    #[error("[R001] Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A command inside the container failed (R002)
    #[error("[R002] Command `{command}` failed with exit code {exit_code}: {stderr}")]
    ExecFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A SQL statement failed (R003)
    #[error("[R003] SQL execution failed: {0}")]
    Sql(String),

    /// Snapshot creation failed (R004)
    #[error("[R004] Snapshot of '{database}' failed: {source}")]
    SnapshotFailed {
        database: String,
        #[source]
        source: Box<RewindError>,
    },

    /// Restore failed (R005)
    #[error("[R005] Restore of '{database}' failed: {source}")]
    RestoreFailed {
        database: String,
        #[source]
        source: Box<RewindError>,
    },

    /// Seeding failed (R006)
    #[error("[R006] Seeding '{database}' failed: {source}")]
    SeedFailed {
        database: String,
        #[source]
        source: Box<RewindError>,
    },

    /// No snapshot exists to restore from (R007)
    #[error("[R007] No snapshot found for '{0}'")]
    NoSnapshot(String),

    /// The operation observed its cancellation token (R008)
    #[error("[R008] Operation cancelled")]
    Cancelled,

    /// Filesystem error (R009)
    #[error("[R009] I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RewindError {
    pub fn snapshot_failed(database: &str, source: RewindError) -> Self {
        RewindError::SnapshotFailed {
            database: database.to_string(),
            source: Box::new(source),
        }
    }

    pub fn restore_failed(database: &str, source: RewindError) -> Self {
        RewindError::RestoreFailed {
            database: database.to_string(),
            source: Box::new(source),
        }
    }

    pub fn seed_failed(database: &str, source: RewindError) -> Self {
        RewindError::SeedFailed {
            database: database.to_string(),
            source: Box::new(source),
        }
    }

    /// True for configuration errors, which are never worth retrying.
    pub fn is_config(&self) -> bool {
        matches!(self, RewindError::Config(_))
    }

    /// True when the operation stopped because its token was cancelled,
    /// including when the cancellation surfaced through a wrapper.
    pub fn is_cancelled(&self) -> bool {
        match self {
            RewindError::Cancelled => true,
            RewindError::SnapshotFailed { source, .. }
            | RewindError::RestoreFailed { source, .. }
            | RewindError::SeedFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
