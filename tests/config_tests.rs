//! Configuration loading and SQL source reading.

use std::fs;

use dbpulse::{Config, PulseError};
use tempfile::TempDir;

#[test]
fn defaults_apply_without_a_config_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope").join("dbpulse.json");

    // Default-path loading tolerates a missing file; emulate by loading
    // defaults directly.
    let config = Config::default();
    assert_eq!(config.limit, 50);
    assert_eq!(config.workers, 8);
    assert!(!config.ignore);
    assert!(config.dsn.is_none());

    // An explicitly requested path must exist.
    let err = Config::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, PulseError::Config(_)));
}

#[test]
fn config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dbpulse.json");
    fs::write(
        &path,
        r#"{ "dsn": "sqlite://load.db", "limit": 5, "ignore": true }"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.dsn.as_deref(), Some("sqlite://load.db"));
    assert_eq!(config.limit, 5);
    assert!(config.ignore);
    // Untouched fields keep their defaults.
    assert_eq!(config.workers, 8);
}

#[test]
fn relative_sql_paths_anchor_to_the_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dbpulse.json");
    fs::write(&path, r#"{ "sql": ["queries/load.sql"] }"#).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.sql[0], dir.path().join("queries/load.sql"));
}

#[test]
fn malformed_config_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dbpulse.json");
    fs::write(&path, "{ not json").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, PulseError::Config(_)));
}

#[test]
fn sources_reads_configured_files() {
    let dir = TempDir::new().unwrap();
    let sql_path = dir.path().join("load.sql");
    fs::write(&sql_path, "-- name: q\nSELECT 1;\n").unwrap();

    let config = Config {
        sql: vec![sql_path],
        ..Config::default()
    };

    let sources = config.sources().unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].contains("-- name: q"));
}

#[test]
fn empty_sql_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let sql_path = dir.path().join("empty.sql");
    fs::write(&sql_path, "").unwrap();

    let config = Config {
        sql: vec![sql_path.clone()],
        ..Config::default()
    };

    let err = config.sources().unwrap_err();
    assert!(matches!(err, PulseError::SqlSourceEmpty(path) if path == sql_path));
}

#[test]
fn missing_sql_file_is_a_config_error() {
    let config = Config {
        sql: vec!["definitely/not/here.sql".into()],
        ..Config::default()
    };

    let err = config.sources().unwrap_err();
    assert!(matches!(err, PulseError::Config(_)));
}

#[test]
fn schedule_appears_in_settings_rows() {
    let mut config = Config::default();
    config.schedule.insert("warmup".to_string(), 30);

    let rows = config.to_rows();
    assert!(rows
        .iter()
        .any(|(k, v)| k == "schedule.warmup" && v == "every 30s"));
}
