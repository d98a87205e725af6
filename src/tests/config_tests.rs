// Settings Tests - Testing loading, saving and validation

use crate::config::Settings;
use crate::portmap::Lifetime;
use crate::Error;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    assert_eq!(settings.command_name, "pcp");
    assert!(settings.command_args.is_empty());
    assert_eq!(settings.server_addr, None);
    assert_eq!(settings.default_lifetime(), Lifetime(3600)); // 1 hour
    assert_eq!(settings.map_timeout(), Duration::from_secs(30));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let settings = Settings::load(dir.path().join("missing.json")).expect("Failed to load");
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_load_empty_file() {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    let settings = Settings::load(file.path()).expect("Failed to load");
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_load_partial_file() {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(file.path(), r#"{"server_addr": "192.168.1.1:5351"}"#).unwrap();

    let settings = Settings::load(file.path()).expect("Failed to load");
    assert_eq!(settings.server_addr.as_deref(), Some("192.168.1.1:5351"));
    // Unset fields keep their defaults
    assert_eq!(settings.command_name, "pcp");
    assert_eq!(settings.default_lifetime_secs, 3600);
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("settings.json");

    let mut settings = Settings::default();
    settings.command_name = "/usr/local/bin/pcp".to_string();
    settings.command_args = vec!["-v".to_string()];
    settings.default_lifetime_secs = 600;
    settings.save(&path).expect("Failed to save");

    let loaded = Settings::load(&path).expect("Failed to load");
    assert_eq!(loaded, settings);
}

#[test]
fn test_load_invalid_json() {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(file.path(), "{ not json").unwrap();

    let result = Settings::load(file.path());
    assert!(matches!(result, Err(Error::Config(_))), "got {:?}", result);
}

#[test]
fn test_load_rejects_invalid_settings() {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(file.path(), r#"{"default_lifetime_secs": 0}"#).unwrap();

    let result = Settings::load(file.path());
    assert!(matches!(result, Err(Error::Config(_))), "got {:?}", result);
}

#[test]
fn test_validate() {
    let mut settings = Settings::default();
    settings.command_name = "  ".to_string();
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.map_timeout_secs = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn test_settings_command() {
    let mut settings = Settings::default();
    settings.command_name = "sh".to_string();
    settings.command_args = vec!["pcp.sh".to_string()];
    settings.server_addr = Some("10.0.0.1".to_string());

    let command = settings.command();
    assert_eq!(command.command_name, "sh");
    assert_eq!(command.command_args, vec!["pcp.sh"]);
    assert_eq!(command.server_addr.as_deref(), Some("10.0.0.1"));
}
