//! Config save/load roundtrip integration tests.

use satguard_core::config::{Config, LogLevel};
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("satguard.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.keystore.algorithm, config.keystore.algorithm);
    assert_eq!(loaded.registry.event_capacity, config.registry.event_capacity);
    assert_eq!(loaded.logging.level, LogLevel::Info);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("satguard.json5");

    let mut config = Config::default();
    config.storage.data_dir = Some(dir.path().join("data"));
    config.registry.event_capacity = 8;
    config.logging.json = true;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.storage.data_dir, Some(dir.path().join("data")));
    assert_eq!(loaded.registry.event_capacity, 8);
    assert!(loaded.logging.json);
    assert_eq!(loaded.data_dir().unwrap(), dir.path().join("data"));
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/satguard.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_rejects_unknown_algorithm() {
    let config = Config::parse(r#"{ keystore: { algorithm: "rsa-oaep" } }"#).unwrap();
    assert!(config.validate().is_err());
}
