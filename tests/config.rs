use std::time::Duration;

use assert_matches::assert_matches;

use edgar_insiders::config::{
    Config, ConfigLoader, DEFAULT_BASE_URL, DEFAULT_TABLE, IN_MEMORY_DATABASE, RetryEntry,
    SCHEMA_VERSION,
};
use edgar_insiders::error::InsiderError;

#[test]
fn defaults_without_file_or_env() {
    let config = ConfigLoader::resolve_config(Config::default(), None).unwrap();
    assert_eq!(config.contact, None);
    assert_eq!(config.database, IN_MEMORY_DATABASE);
    assert_eq!(config.table, DEFAULT_TABLE);
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay, Duration::from_secs(2));
    assert!(config.download_dir.as_str().ends_with("edgar-insiders"));
}

#[test]
fn environment_contact_overrides_file() {
    let file = Config {
        contact: Some("file@example.com".to_string()),
        ..Config::default()
    };
    let config =
        ConfigLoader::resolve_config(file, Some("env@example.com".to_string())).unwrap();
    assert_eq!(config.contact.as_deref(), Some("env@example.com"));
}

#[test]
fn blank_contact_is_absent() {
    let config = ConfigLoader::resolve_config(Config::default(), Some("  ".to_string())).unwrap();
    assert_eq!(config.contact, None);
}

#[test]
fn json_file_is_layered() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("edgar-insiders.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "download_dir": "/tmp/edgar",
            "database": "insiders.db",
            "base_url": "https://mirror.test/sets",
            "retry": { "max_attempts": 0, "base_delay_secs": 1 }
        }"#,
    )
    .unwrap();

    let config = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(config.download_dir.as_str(), "/tmp/edgar");
    assert_eq!(config.database, "insiders.db");
    assert_eq!(config.base_url, "https://mirror.test/sets/");
    assert_eq!(config.retry.max_attempts, 1);
    assert_eq!(config.retry.base_delay, Duration::from_secs(1));
}

#[test]
fn unknown_schema_version_is_rejected() {
    let file = Config {
        schema_version: Some(2),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(file, None),
        Err(InsiderError::ConfigParse(message)) if message.contains("schema_version 2")
    );

    let current = Config {
        schema_version: Some(SCHEMA_VERSION),
        ..Config::default()
    };
    assert_eq!(
        ConfigLoader::resolve_config(current, None).unwrap().schema_version,
        SCHEMA_VERSION
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert!(ConfigLoader::resolve(Some(path.to_str().unwrap())).is_err());
}

#[test]
fn retry_entry_defaults_fill_gaps() {
    let file = Config {
        retry: Some(RetryEntry {
            max_attempts: Some(3),
            base_delay_secs: None,
        }),
        ..Config::default()
    };
    let config = ConfigLoader::resolve_config(file, None).unwrap();
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.base_delay, Duration::from_secs(2));
}
