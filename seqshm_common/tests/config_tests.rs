//! Config file tests: section defaults, unknown field rejection,
//! validation of reader bounds.

use seqshm_common::config::{ConfigError, ConfigLoader, IpcConfig, LogLevel, SharedConfig};
use serde::Deserialize;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct ProcessConfig {
    shared: SharedConfig,
    #[serde(default)]
    ipc: IpcConfig,
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn missing_ipc_section_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[shared]
service_name = "imu-reader"
"#,
    );

    let config = ProcessConfig::load(&path).unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Info);
    assert_eq!(config.ipc, IpcConfig::default());
    assert!(config.shared.validate().is_ok());
    assert!(config.ipc.validate().is_ok());
}

#[test]
fn partial_ipc_section_fills_remaining_fields() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[shared]
service_name = "imu-reader"

[ipc]
spin_limit = 8
"#,
    );

    let config = ProcessConfig::load(&path).unwrap();
    assert_eq!(config.ipc.spin_limit, 8);
    assert_eq!(
        config.ipc.max_read_attempts,
        IpcConfig::default().max_read_attempts
    );
}

#[test]
fn unknown_ipc_field_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[shared]
service_name = "imu-reader"

[ipc]
max_retries = 3
"#,
    );

    let result = ProcessConfig::load(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn invalid_bounds_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[shared]
service_name = "imu-reader"

[ipc]
spin_limit = 500
max_read_attempts = 100
"#,
    );

    let config = ProcessConfig::load(&path).unwrap();
    assert!(matches!(
        config.ipc.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}
