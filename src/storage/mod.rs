use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ResolvedTarget, RewindConfig};
use crate::error::{ConfigError, Result};

pub const CONFIG_FILE: &str = "rewind.json";

/// A config file plus where it was found.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: RewindConfig,
}

impl LoadedConfig {
    /// Directory relative paths in the file resolve against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn resolve_all(&self) -> Result<Vec<ResolvedTarget>> {
        self.config
            .targets
            .iter()
            .map(|t| t.resolve(self.base_dir()))
            .collect()
    }

    /// One target by name, or every target when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<ResolvedTarget>> {
        let Some(name) = name else {
            return self.resolve_all();
        };
        let target = self
            .config
            .targets
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| {
                let known: Vec<&str> = self.config.targets.iter().map(|t| t.name()).collect();
                ConfigError::InvalidTarget(format!(
                    "no target named '{}' in {} (known: {})",
                    name,
                    self.path.display(),
                    known.join(", ")
                ))
            })?;
        Ok(vec![target.resolve(self.base_dir())?])
    }
}

/// Walk up from `start` to the nearest directory holding `rewind.json`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let invalid = |reason: String| ConfigError::InvalidConfigFile {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let config: RewindConfig = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    let mut seen = std::collections::HashSet::new();
    for t in &config.targets {
        if !seen.insert(t.name()) {
            return Err(invalid(format!("duplicate target name '{}'", t.name())).into());
        }
    }
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(LoadedConfig { path, config })
}

/// `explicit` if given, otherwise the nearest `rewind.json` above the
/// current directory.
pub fn locate(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let cwd = std::env::current_dir()?;
            find_config(&cwd).ok_or_else(|| ConfigError::InvalidConfigFile {
                path: cwd.join(CONFIG_FILE),
                reason: "not found in this directory or any parent".into(),
            })?
        }
    };
    load_config(&path)
}

pub fn save_config(path: &Path, config: &RewindConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::InvalidConfigFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    fs::write(path, content)?;
    Ok(())
}
