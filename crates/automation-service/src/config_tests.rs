use super::*;
use serial_test::serial;
use std::env;

fn clear_env() {
    for key in [
        "TRACKER_BASE_URL",
        "TRACKER_EMAIL",
        "TRACKER_API_TOKEN",
        "TRACKER_OAUTH_TOKEN",
        "REQUEST_TIMEOUT_MS",
        "MAX_RETRIES",
        "RETRY_DELAY_MS",
        "LOG_LEVEL",
    ] {
        unsafe {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn missing_base_url_is_fatal() {
    clear_env();
    let err = ServiceConfig::load_from(None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingBaseUrl));
}

#[test]
#[serial]
fn missing_auth_is_fatal() {
    clear_env();
    unsafe {
        env::set_var("TRACKER_BASE_URL", "https://tracker.example.com");
    }
    let err = ServiceConfig::load_from(None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingAuth));
    clear_env();
}

#[test]
#[serial]
fn oauth_token_is_a_valid_auth_pair() {
    clear_env();
    unsafe {
        env::set_var("TRACKER_BASE_URL", "https://tracker.example.com");
        env::set_var("TRACKER_OAUTH_TOKEN", "tok-123");
    }
    let config = ServiceConfig::load_from(None).expect("valid config");
    assert!(matches!(config.tracker_auth, AuthMethod::OAuthBearer { .. }));
    assert_eq!(config.request_timeout, Duration::from_millis(30_000));
    clear_env();
}

#[test]
#[serial]
fn basic_token_pair_is_a_valid_auth_pair() {
    clear_env();
    unsafe {
        env::set_var("TRACKER_BASE_URL", "https://tracker.example.com");
        env::set_var("TRACKER_EMAIL", "bot@example.com");
        env::set_var("TRACKER_API_TOKEN", "secret");
    }
    let config = ServiceConfig::load_from(None).expect("valid config");
    assert!(matches!(config.tracker_auth, AuthMethod::BasicToken { .. }));
    clear_env();
}

#[test]
#[serial]
fn request_timeout_out_of_range_is_rejected() {
    clear_env();
    unsafe {
        env::set_var("TRACKER_BASE_URL", "https://tracker.example.com");
        env::set_var("TRACKER_OAUTH_TOKEN", "tok-123");
        env::set_var("REQUEST_TIMEOUT_MS", "500");
    }
    let err = ServiceConfig::load_from(None).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { field: "REQUEST_TIMEOUT_MS", .. }));
    clear_env();
}

#[test]
#[serial]
fn invalid_log_level_is_rejected() {
    clear_env();
    unsafe {
        env::set_var("TRACKER_BASE_URL", "https://tracker.example.com");
        env::set_var("TRACKER_OAUTH_TOKEN", "tok-123");
        env::set_var("LOG_LEVEL", "verbose");
    }
    let err = ServiceConfig::load_from(None).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidLogLevel(_)));
    clear_env();
}
