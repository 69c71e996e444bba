//! Unit tests for configuration resolution and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SHELF_* variables are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use serial_test::serial;
use shelf_common::config::{
    load_toml_config, resolve_api_key, resolve_root_folder, TomlConfig, GOOGLE_BOOKS_KEY_ENV,
    PERPLEXITY_KEY_ENV, ROOT_FOLDER_ENV,
};
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_missing_config_file_yields_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(Some(&missing)).unwrap();
    assert!(config.root_folder.is_none());
    assert!(config.perplexity_api_key.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.sources.generative_max_attempts, 3);
}

#[test]
fn test_config_file_is_parsed() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/shelf"
library_folder = "/srv/photos"
google_books_api_key = "gb-key"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/shelf")));
    assert_eq!(config.library_folder, Some(PathBuf::from("/srv/photos")));
    assert_eq!(config.google_books_api_key.as_deref(), Some("gb-key"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    assert!(load_toml_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_root_folder_cli_overrides_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml_config);
    assert_eq!(resolved, PathBuf::from("/from/cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_env_overrides_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml_config), PathBuf::from("/from/env"));

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, &toml_config), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_root_folder_falls_back_to_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_api_key_env_overrides_toml() {
    env::set_var(PERPLEXITY_KEY_ENV, "env-key");
    let key = resolve_api_key("Perplexity", PERPLEXITY_KEY_ENV, Some("toml-key"));
    assert_eq!(key.as_deref(), Some("env-key"));
    env::remove_var(PERPLEXITY_KEY_ENV);
}

#[test]
#[serial]
fn test_api_key_toml_fallback_and_blank_env_ignored() {
    env::set_var(GOOGLE_BOOKS_KEY_ENV, "   ");
    let key = resolve_api_key("Google Books", GOOGLE_BOOKS_KEY_ENV, Some("toml-key"));
    assert_eq!(key.as_deref(), Some("toml-key"));
    env::remove_var(GOOGLE_BOOKS_KEY_ENV);
}

#[test]
#[serial]
fn test_api_key_missing_everywhere() {
    env::remove_var(PERPLEXITY_KEY_ENV);
    assert!(resolve_api_key("Perplexity", PERPLEXITY_KEY_ENV, None).is_none());
    assert!(resolve_api_key("Perplexity", PERPLEXITY_KEY_ENV, Some("")).is_none());
}
