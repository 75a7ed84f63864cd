use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ArchiveEngine, FilesystemSnapshotEngine, GoldenCopyEngine, SnapshotEngine};
use crate::error::{ConfigError, Result};
use crate::exec::ContainerExec;
use crate::sql::{ConnectionFactory, default_connector};
use crate::target::{DatabaseTarget, EngineKind};

/// The closed set of snapshot engines, with their optional overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineStrategy {
    FilesystemSnapshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot_dir: Option<String>,
    },
    GoldenCopy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suffix: Option<String>,
    },
    ArchiveDumpRestore {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_dir: Option<String>,
    },
}

impl EngineStrategy {
    /// Default strategy for an engine kind.
    pub fn for_engine(kind: EngineKind) -> Self {
        match kind {
            EngineKind::SqlServer => EngineStrategy::FilesystemSnapshot { snapshot_dir: None },
            EngineKind::MySql => EngineStrategy::GoldenCopy { suffix: None },
            EngineKind::MongoDb => EngineStrategy::ArchiveDumpRestore { archive_dir: None },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineStrategy::FilesystemSnapshot { .. } => "filesystem-snapshot",
            EngineStrategy::GoldenCopy { .. } => "golden-copy",
            EngineStrategy::ArchiveDumpRestore { .. } => "archive-dump-restore",
        }
    }

    /// The only engine kind each strategy knows how to drive.
    pub fn engine(&self) -> EngineKind {
        match self {
            EngineStrategy::FilesystemSnapshot { .. } => EngineKind::SqlServer,
            EngineStrategy::GoldenCopy { .. } => EngineKind::MySql,
            EngineStrategy::ArchiveDumpRestore { .. } => EngineKind::MongoDb,
        }
    }
}

/// Build the snapshot engine for `target`.
///
/// `connector` overrides the SQL client used by the SQL engines; by default
/// they talk through the engine's own CLI client inside the container.
pub fn select_engine(
    strategy: &EngineStrategy,
    target: &DatabaseTarget,
    exec: Arc<dyn ContainerExec>,
    connector: Option<Arc<dyn ConnectionFactory>>,
) -> Result<Box<dyn SnapshotEngine>> {
    if strategy.engine() != target.engine {
        return Err(ConfigError::IncompatibleEngine {
            strategy: strategy.name(),
            engine: target.engine.as_str(),
        }
        .into());
    }

    let connector = connector.or_else(|| default_connector(target.engine, exec.clone()));
    let engine: Box<dyn SnapshotEngine> = match (strategy, connector) {
        (EngineStrategy::FilesystemSnapshot { snapshot_dir }, Some(connector)) => {
            let mut engine = FilesystemSnapshotEngine::new(exec, connector);
            if let Some(dir) = snapshot_dir {
                engine = engine.with_snapshot_dir(dir.as_str());
            }
            Box::new(engine)
        }
        (EngineStrategy::GoldenCopy { suffix }, Some(connector)) => {
            let mut engine = GoldenCopyEngine::new(connector);
            if let Some(suffix) = suffix {
                engine = engine.with_suffix(suffix.as_str());
            }
            Box::new(engine)
        }
        (EngineStrategy::ArchiveDumpRestore { archive_dir }, _) => {
            let mut engine = ArchiveEngine::new(exec);
            if let Some(dir) = archive_dir {
                engine = engine.with_archive_dir(dir.as_str());
            }
            Box::new(engine)
        }
        (_, None) => {
            return Err(ConfigError::MissingCapability {
                database: target.database.clone(),
                capability: "SQL connection",
            }
            .into());
        }
    };
    tracing::debug!(
        database = %target.database,
        engine = engine.name(),
        "selected snapshot engine"
    );
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewindError;
    use crate::test_utils::{ScriptedExec, target};
    use std::path::Path;

    #[test]
    fn test_default_strategy_per_engine() {
        for kind in [EngineKind::SqlServer, EngineKind::MySql, EngineKind::MongoDb] {
            assert_eq!(EngineStrategy::for_engine(kind).engine(), kind);
        }
    }

    #[test]
    fn test_selects_matching_engine() {
        let cases = [
            (EngineKind::SqlServer, "filesystem-snapshot"),
            (EngineKind::MySql, "golden-copy"),
            (EngineKind::MongoDb, "archive-dump-restore"),
        ];
        for (kind, name) in cases {
            let target = target(kind, "app", Path::new("/migrations"));
            let engine = select_engine(
                &EngineStrategy::for_engine(kind),
                &target,
                ScriptedExec::new(),
                None,
            )
            .unwrap();
            assert_eq!(engine.name(), name);
        }
    }

    #[test]
    fn test_rejects_mismatched_engine() {
        let target = target(EngineKind::MongoDb, "app", Path::new("/migrations"));
        let err = select_engine(
            &EngineStrategy::GoldenCopy { suffix: None },
            &target,
            ScriptedExec::new(),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            RewindError::Config(ConfigError::IncompatibleEngine {
                strategy: "golden-copy",
                engine: "mongodb"
            })
        ));
    }

    #[test]
    fn test_strategy_serde_shape() {
        let parsed: EngineStrategy =
            serde_json::from_str(r#"{"kind":"filesystem_snapshot","snapshot_dir":"/snaps"}"#)
                .unwrap();
        assert_eq!(
            parsed,
            EngineStrategy::FilesystemSnapshot {
                snapshot_dir: Some("/snaps".into())
            }
        );

        let json = serde_json::to_string(&EngineStrategy::GoldenCopy { suffix: None }).unwrap();
        assert_eq!(json, r#"{"kind":"golden_copy"}"#);
    }
}
