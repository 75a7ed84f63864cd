use super::*;
use crate::error::RewindError;
use std::fs::File;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn set_mtime(path: &Path, secs_ago: u64) -> SystemTime {
    let t = SystemTime::now() - Duration::from_secs(secs_ago);
    File::open(path).unwrap().set_modified(t).unwrap();
    t
}

fn config_err(err: RewindError) -> ConfigError {
    match err {
        RewindError::Config(c) => c,
        other => panic!("expected configuration error, got {other:?}"),
    }
}

/// root/
///   001_schema.sql
///   data/
///     002_rows.sql
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("001_schema.sql"), "CREATE TABLE t (id INT);").unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/002_rows.sql"), "INSERT INTO t VALUES (1);").unwrap();
    set_mtime(&dir.path().join("001_schema.sql"), 500);
    set_mtime(&dir.path().join("data/002_rows.sql"), 400);
    set_mtime(&dir.path().join("data"), 300);
    set_mtime(dir.path(), 600);
    dir
}

#[test]
fn test_latest_modification_picks_newest_entry() {
    let dir = fixture();
    let newest = set_mtime(&dir.path().join("data/002_rows.sql"), 100);

    let latest = latest_modification(dir.path()).unwrap();
    assert_eq!(latest, DateTime::<Utc>::from(newest));
}

#[test]
fn test_latest_modification_counts_subdirectories() {
    let dir = fixture();
    let latest = latest_modification(dir.path()).unwrap();
    // data/ (300s ago) is newer than both files and the root
    let data_mtime: DateTime<Utc> = std::fs::metadata(dir.path().join("data"))
        .unwrap()
        .modified()
        .unwrap()
        .into();
    assert_eq!(latest, data_mtime);
}

#[test]
fn test_latest_modification_counts_root_directory() {
    let dir = fixture();
    let root = set_mtime(dir.path(), 10);
    assert_eq!(latest_modification(dir.path()).unwrap(), DateTime::<Utc>::from(root));
}

#[test]
fn test_deleting_a_file_is_a_freshness_change() {
    let dir = fixture();
    let before = latest_modification(dir.path()).unwrap();

    std::fs::remove_file(dir.path().join("001_schema.sql")).unwrap();

    let after = latest_modification(dir.path()).unwrap();
    assert!(after > before, "deletion must bump the freshness timestamp");
}

#[test]
fn test_missing_directory() {
    let dir = TempDir::new().unwrap();
    let gone = dir.path().join("nope");
    match config_err(latest_modification(&gone).unwrap_err()) {
        ConfigError::DirectoryNotFound(p) => assert_eq!(p, gone),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_empty_directory() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        config_err(latest_modification(dir.path()).unwrap_err()),
        ConfigError::EmptySource(_)
    ));
    assert!(matches!(
        config_err(MigrationSource::directory(dir.path()).resolve().unwrap_err()),
        ConfigError::EmptySource(_)
    ));
}

#[test]
fn test_allow_list_names_missing_files() {
    let dir = fixture();
    let files = vec![
        "001_schema.sql".to_string(),
        "003_renamed.sql".to_string(),
        "004_gone.sql".to_string(),
    ];
    match config_err(latest_modification_of(dir.path(), &files).unwrap_err()) {
        ConfigError::MissingFiles { missing, .. } => {
            assert_eq!(missing, vec!["003_renamed.sql", "004_gone.sql"]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_allow_list_restricts_scan() {
    let dir = fixture();
    std::fs::write(dir.path().join("notes.txt"), "unrelated").unwrap();
    set_mtime(&dir.path().join("notes.txt"), 1);
    set_mtime(dir.path(), 600);

    let latest = latest_modification_of(dir.path(), &["001_schema.sql".to_string()]).unwrap();
    let schema: DateTime<Utc> = std::fs::metadata(dir.path().join("001_schema.sql"))
        .unwrap()
        .modified()
        .unwrap()
        .into();
    assert_eq!(latest, schema);
}

#[test]
fn test_resolve_keeps_declared_order() {
    let dir = fixture();
    let source = MigrationSource::with_files(dir.path(), ["002_rows.sql", "001_schema.sql"]);
    let resolved = source.resolve().unwrap();
    assert_eq!(
        resolved,
        vec![
            dir.path().join("data/002_rows.sql"),
            dir.path().join("001_schema.sql")
        ]
    );
}

#[test]
fn test_resolve_relative_path_names() {
    let dir = fixture();
    let source = MigrationSource::with_files(dir.path(), ["data/002_rows.sql"]);
    assert_eq!(source.resolve().unwrap(), vec![dir.path().join("data/002_rows.sql")]);
}

#[test]
fn test_resolve_ambiguous_name() {
    let dir = fixture();
    std::fs::write(dir.path().join("data/001_schema.sql"), "-- duplicate").unwrap();
    let source = MigrationSource::with_files(dir.path(), ["001_schema.sql"]);
    assert!(matches!(
        config_err(source.resolve().unwrap_err()),
        ConfigError::AmbiguousFile { name, .. } if name == "001_schema.sql"
    ));
}

#[test]
fn test_resolve_whole_directory_sorted() {
    let dir = fixture();
    let resolved = MigrationSource::directory(dir.path()).resolve().unwrap();
    assert_eq!(
        resolved,
        vec![
            dir.path().join("001_schema.sql"),
            dir.path().join("data/002_rows.sql")
        ]
    );
}

#[test]
fn test_freshness_compare() {
    let source = Utc::now();
    assert_eq!(Freshness::compare(None, source), Freshness::Stale);
    assert_eq!(Freshness::compare(Some(source), source), Freshness::Fresh);
    assert_eq!(
        Freshness::compare(Some(source + chrono::Duration::seconds(1)), source),
        Freshness::Fresh
    );
    assert_eq!(
        Freshness::compare(Some(source - chrono::Duration::seconds(1)), source),
        Freshness::Stale
    );
    assert!(!Freshness::Stale.is_fresh());
}
