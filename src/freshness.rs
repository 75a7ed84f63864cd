//! Freshness of migration sources.
//!
//! A snapshot is only worth restoring when it was taken after the last change
//! to the migration source it was seeded from. The source's "last change" is
//! the newest modification time of any file or subdirectory below it, or of
//! the directory itself: deleting a file leaves no newer file behind but does
//! bump the parent directory's mtime.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ConfigError, Result};

/// Outcome of comparing a snapshot's age with its migration source.
/// Computed on every decision, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Snapshot is at least as new as the source; safe to restore.
    Fresh,
    /// Source changed after the snapshot, or there is no snapshot.
    Stale,
}

impl Freshness {
    pub fn compare(snapshot_at: Option<DateTime<Utc>>, source_modified: DateTime<Utc>) -> Self {
        match snapshot_at {
            Some(at) if at >= source_modified => Freshness::Fresh,
            _ => Freshness::Stale,
        }
    }

    pub fn is_fresh(self) -> bool {
        self == Freshness::Fresh
    }
}

/// A migration directory, optionally restricted to an ordered list of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSource {
    dir: PathBuf,
    files: Vec<String>,
}

impl MigrationSource {
    /// Every entry under `dir` counts.
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    /// Only the named files count, and they run in the given order.
    /// Names are file names, or slash-separated paths relative to `dir`.
    pub fn with_files<I, S>(dir: impl Into<PathBuf>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir: dir.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Resolve the listed files to paths, in declared order.
    ///
    /// Each name must match exactly one file below the directory. With no
    /// list, returns every file sorted by relative path.
    pub fn resolve(&self) -> Result<Vec<PathBuf>> {
        let all = list_files(&self.dir)?;
        if self.files.is_empty() {
            return Ok(all);
        }

        let mut resolved = Vec::with_capacity(self.files.len());
        let mut missing = Vec::new();
        for name in &self.files {
            let matches: Vec<&PathBuf> = all
                .iter()
                .filter(|p| matches_name(&self.dir, p, name))
                .collect();
            match matches.as_slice() {
                [] => missing.push(name.clone()),
                [one] => resolved.push((*one).clone()),
                _ => {
                    return Err(ConfigError::AmbiguousFile {
                        dir: self.dir.clone(),
                        name: name.clone(),
                    }
                    .into());
                }
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingFiles {
                dir: self.dir.clone(),
                missing,
            }
            .into());
        }
        Ok(resolved)
    }

    pub fn latest_modification(&self) -> Result<DateTime<Utc>> {
        if self.files.is_empty() {
            latest_modification(&self.dir)
        } else {
            latest_modification_of(&self.dir, &self.files)
        }
    }
}

/// Newest mtime over every file and subdirectory below `dir`, and `dir` itself.
pub fn latest_modification(dir: &Path) -> Result<DateTime<Utc>> {
    let root = root_modified(dir)?;
    let mut latest: Option<DateTime<Utc>> = None;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let modified: DateTime<Utc> = entry
            .metadata()
            .map_err(std::io::Error::from)?
            .modified()?
            .into();
        latest = Some(latest.map_or(modified, |l| l.max(modified)));
    }
    match latest {
        Some(l) => Ok(l.max(root)),
        None => Err(ConfigError::EmptySource(dir.to_path_buf()).into()),
    }
}

/// Same as [`latest_modification`], restricted to the listed files.
/// Fails with `MissingFiles` naming every listed file that is absent.
pub fn latest_modification_of(dir: &Path, files: &[String]) -> Result<DateTime<Utc>> {
    let root = root_modified(dir)?;
    let resolved = MigrationSource::with_files(dir, files.iter().cloned()).resolve()?;
    let mut latest = root;
    for path in resolved {
        let modified: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
        latest = latest.max(modified);
    }
    Ok(latest)
}

fn root_modified(dir: &Path) -> Result<DateTime<Utc>> {
    match fs::metadata(dir) {
        Ok(md) if md.is_dir() => Ok(md.modified()?.into()),
        Ok(_) => Err(ConfigError::DirectoryNotFound(dir.to_path_buf()).into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConfigError::DirectoryNotFound(dir.to_path_buf()).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    root_modified(dir)?;
    let mut files = Vec::new();
    let mut any_entry = false;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        any_entry = true;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    if !any_entry {
        return Err(ConfigError::EmptySource(dir.to_path_buf()).into());
    }
    Ok(files)
}

fn matches_name(root: &Path, path: &Path, name: &str) -> bool {
    if name.contains('/') || name.contains('\\') {
        let wanted = name.replace('\\', "/");
        path.strip_prefix(root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/") == wanted.trim_start_matches("./"))
            .unwrap_or(false)
    } else {
        path.file_name().map(|n| n == name).unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "freshness_test.rs"]
mod tests;
