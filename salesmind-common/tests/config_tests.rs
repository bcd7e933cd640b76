//! Configuration loading and root folder resolution tests
//!
//! Tests touching SALESMIND_ROOT are marked #[serial] so they never race on
//! the process environment.

use salesmind_common::config::{
    default_root_folder, load_toml_config, RootFolderInitializer, RootFolderResolver,
    StorageConfig, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_missing_toml_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();

    assert!(config.root_folder.is_none());
    assert!(config.gemini_api_key.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.processing.max_concurrent_jobs, 16);
    assert_eq!(config.processing.poll_interval_secs, 5);
    assert_eq!(config.processing.max_poll_attempts, 60);
    assert_eq!(config.cache.feedback_ttl_secs, 900);
    assert_eq!(config.storage.retention_days, 30);
}

#[test]
fn test_partial_toml_keeps_section_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
gemini_api_key = "from-toml"

[processing]
max_concurrent_jobs = 4

[cache]
feedback_ttl_secs = 60
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.gemini_api_key.as_deref(), Some("from-toml"));
    assert_eq!(config.processing.max_concurrent_jobs, 4);
    // Untouched keys inside a present section keep their defaults
    assert_eq!(config.processing.max_poll_attempts, 60);
    assert_eq!(config.cache.feedback_ttl_secs, 60);
    assert_eq!(config.cache.sweep_interval_secs, 60);
    assert_eq!(config.storage.retention_days, 30);
}

#[test]
fn test_storage_durations() {
    let storage = StorageConfig::default();
    assert_eq!(storage.retention(), Duration::from_secs(30 * 86_400));
    assert_eq!(storage.cleanup_interval(), Duration::from_secs(86_400));

    // Huge retention saturates instead of overflowing
    let storage = StorageConfig {
        retention_days: u64::MAX,
        cleanup_interval_secs: 0,
    };
    assert_eq!(storage.retention(), Duration::from_secs(u64::MAX));
    assert_eq!(storage.cleanup_interval(), Duration::from_secs(1));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [not toml").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().contains("Parse TOML failed"));
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/salesmind-env");
    let toml = TomlConfig {
        root_folder: Some("/tmp/salesmind-toml".to_string()),
        ..Default::default()
    };

    let root = RootFolderResolver::new(Some("/tmp/salesmind-cli"), &toml).resolve();
    assert_eq!(root, PathBuf::from("/tmp/salesmind-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/salesmind-env");
    let toml = TomlConfig {
        root_folder: Some("/tmp/salesmind-toml".to_string()),
        ..Default::default()
    };

    let root = RootFolderResolver::new(None, &toml).resolve();
    assert_eq!(root, PathBuf::from("/tmp/salesmind-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_falls_back_to_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let toml = TomlConfig {
        root_folder: Some("/tmp/salesmind-toml".to_string()),
        ..Default::default()
    };
    assert_eq!(
        RootFolderResolver::new(None, &toml).resolve(),
        PathBuf::from("/tmp/salesmind-toml")
    );

    let empty = TomlConfig::default();
    assert_eq!(
        RootFolderResolver::new(None, &empty).resolve(),
        default_root_folder()
    );
}

#[test]
fn test_initializer_creates_layout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(initializer.uploads_path().is_dir());
    assert_eq!(initializer.database_path(), root.join("salesmind.db"));

    // Idempotent
    initializer.ensure_directory_exists().unwrap();
}
