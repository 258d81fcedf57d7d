//! Layered configuration: a `config.toml` file overridden by environment
//! variables (spec §6 "Environment configuration"), exercised against real
//! files rather than the programmatic defaults the unit tests cover.

mod common;

use automation_service::ServiceConfig;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn clear_env() {
    for key in [
        "TRACKER_BASE_URL",
        "TRACKER_EMAIL",
        "TRACKER_API_TOKEN",
        "TRACKER_OAUTH_TOKEN",
        "REQUEST_TIMEOUT_MS",
        "MAX_RETRIES",
        "RETRY_DELAY_MS",
        "RETENTION_DAYS",
        "MAX_CONCURRENT_EXECUTIONS",
        "LOG_LEVEL",
    ] {
        unsafe {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn file_source_supplies_values_env_does_not_override() {
    clear_env();
    let mut file = NamedTempFile::with_suffix(".toml").expect("temp file");
    writeln!(
        file,
        r#"
        tracker_base_url = "https://tracker.example.com"
        tracker_oauth_token = "file-token"
        retention_days = 45
        max_concurrent_executions = 4
        "#
    )
    .unwrap();

    let config = ServiceConfig::load_from(Some(file.path().to_str().unwrap())).expect("valid config");
    assert_eq!(config.tracker_base_url, "https://tracker.example.com");
    assert_eq!(config.retention_days, 45);
    assert_eq!(config.max_concurrent_executions, 4);
    clear_env();
}

#[test]
#[serial]
fn environment_overrides_the_file_source() {
    clear_env();
    let mut file = NamedTempFile::with_suffix(".toml").expect("temp file");
    writeln!(
        file,
        r#"
        tracker_base_url = "https://tracker.example.com"
        tracker_oauth_token = "file-token"
        retention_days = 45
        "#
    )
    .unwrap();
    unsafe {
        env::set_var("RETENTION_DAYS", "7");
    }

    let config = ServiceConfig::load_from(Some(file.path().to_str().unwrap())).expect("valid config");
    assert_eq!(config.retention_days, 7);
    clear_env();
}

#[test]
#[serial]
fn absent_file_falls_back_to_programmatic_defaults_plus_env() {
    clear_env();
    unsafe {
        env::set_var("TRACKER_BASE_URL", "https://tracker.example.com");
        env::set_var("TRACKER_OAUTH_TOKEN", "env-token");
    }
    let config = ServiceConfig::load_from(Some("/nonexistent/path/config.toml")).expect("valid config");
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.max_concurrent_executions, 10);
    clear_env();
}
