use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::SeedStrategy;
use crate::drivers::EngineStrategy;
use crate::error::{ConfigError, Result};
use crate::seed::CommandMigrator;
use crate::target::{DatabaseTarget, EngineKind};

/// Contents of `rewind.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RewindConfig {
    /// Container runtime CLI used for `exec` (`docker`, `podman`).
    #[serde(default = "default_runtime")]
    pub container_runtime: String,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

fn default_runtime() -> String {
    "docker".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            container_runtime: default_runtime(),
            targets: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TargetConfig {
    /// Name used on the command line; defaults to the database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub engine: EngineKind,
    pub database: String,
    pub container: String,
    pub connection_string: String,
    /// Relative paths resolve against the config file's directory.
    pub migrations: PathBuf,
    #[serde(default = "default_true")]
    pub restore: bool,
    pub seed: SeedConfig,
    #[serde(default)]
    pub snapshot: SnapshotOverrides,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedConfig {
    /// Run the files under `migrations`, in this order. Empty means every
    /// file, sorted by path.
    SqlScripts {
        #[serde(default)]
        files: Vec<String>,
    },
    /// Run a migration command on the host with `DATABASE_URL` set.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
    },
}

/// Engine defaults a target may override. Only the field matching the
/// target's engine is used.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_dir: Option<String>,
}

/// A target from the file, ready for [`crate::builder::StrategyBuilder`].
pub struct ResolvedTarget {
    pub name: String,
    pub target: Arc<DatabaseTarget>,
    pub seed: SeedStrategy,
    pub engine: EngineStrategy,
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl TargetConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.database)
    }

    pub fn engine_strategy(&self) -> EngineStrategy {
        let o = &self.snapshot;
        match self.engine {
            EngineKind::SqlServer => EngineStrategy::FilesystemSnapshot {
                snapshot_dir: o.snapshot_dir.clone(),
            },
            EngineKind::MySql => EngineStrategy::GoldenCopy {
                suffix: o.golden_suffix.clone(),
            },
            EngineKind::MongoDb => EngineStrategy::ArchiveDumpRestore {
                archive_dir: o.archive_dir.clone(),
            },
        }
    }

    /// Build the target, resolving relative paths against `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> Result<ResolvedTarget> {
        if self.container.trim().is_empty() {
            return Err(ConfigError::InvalidTarget(format!(
                "target '{}' has no container",
                self.name()
            ))
            .into());
        }
        let migrations = resolve_path(base_dir, &self.migrations);
        let mut target = DatabaseTarget::new(
            self.engine,
            self.database.clone(),
            self.container.clone(),
            &self.connection_string,
            migrations,
        )?
        .with_restore(self.restore);

        let seed = match &self.seed {
            SeedConfig::SqlScripts { files } => {
                if !files.is_empty() {
                    target = target.with_migration_files(files.iter().cloned());
                }
                SeedStrategy::SqlScripts
            }
            SeedConfig::Command {
                program,
                args,
                working_dir,
            } => {
                let dir = working_dir
                    .as_deref()
                    .map(|d| resolve_path(base_dir, d))
                    .unwrap_or_else(|| base_dir.to_path_buf());
                let migrator = CommandMigrator::new(program.clone())
                    .args(args.iter().cloned())
                    .working_dir(dir);
                target = target.with_migrator(Arc::new(migrator));
                SeedStrategy::Migrator
            }
        };

        Ok(ResolvedTarget {
            name: self.name().to_string(),
            target: Arc::new(target),
            seed,
            engine: self.engine_strategy(),
        })
    }
}
