//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use conbridge_common::ConfigError;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_conbridge_config.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[terminal]
cols = 120
console_mode = true

[polling]
exit_interval_ms = 250
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.terminal.cols, 120);
    assert!(config.terminal.console_mode);
    assert_eq!(config.polling.exit_interval_ms, 250);
    // Defaults preserved
    assert_eq!(config.terminal.rows, 25);
    assert_eq!(config.polling.read_interval_ms, 20);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[terminal\ncols = ").unwrap();

    let result = load_from_path(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn load_keeps_out_of_range_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[terminal]\ncols = 5000\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.terminal.cols, 5000);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conbridge").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.terminal.cols, 80);
    assert!(config.process.kill_on_destroy);
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::BridgeConfig;

    let config: BridgeConfig = toml::from_str(&default_config_toml()).unwrap();
    assert_eq!(config.terminal.rows, 25);
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_toml_names_schema_version() {
    use super::template::default_config_toml;
    use crate::schema::CONFIG_SCHEMA_VERSION;

    let template = default_config_toml();
    assert!(template.starts_with("# conbridge configuration\n"));
    assert!(template.contains(&format!("# Schema version {CONFIG_SCHEMA_VERSION}\n")));
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("conbridge"));
        assert!(path_str.ends_with("config.toml"));
    }
}
