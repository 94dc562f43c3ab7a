use std::cell::Cell;
use std::time::Duration;

use docxide_proof::config::{ClientOptions, Config, RetryMode};
use docxide_proof::{Error, Result};

#[test]
fn empty_object_gives_defaults() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.client.call_timeout(), Duration::from_secs(65));
}

#[test]
fn partial_override() {
    let config = Config::from_json(
        r#"{"template_key": null, "watchdog_threshold": 2, "client": {"max_attempts": 3, "retry_mode": "standard"}}"#,
    )
    .unwrap();
    assert_eq!(config.template_key, None);
    assert_eq!(config.watchdog_threshold, 2);
    assert_eq!(config.watchdog_window_secs, 300);
    assert_eq!(config.client.max_attempts, 3);
    assert_eq!(config.client.retry_mode, RetryMode::Standard);
    assert_eq!(config.client.read_timeout_secs, 60);
}

#[test]
fn malformed_json_is_a_config_error() {
    assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
}

#[test]
fn config_file_is_loaded_when_given() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"rule_name": "nightly"}"#).unwrap();
    assert_eq!(Config::load_or_default(Some(&path)).unwrap().rule_name, "nightly");
    assert_eq!(Config::load_or_default(None).unwrap(), Config::default());
    assert!(matches!(
        Config::load(&dir.path().join("absent.json")),
        Err(Error::Config(_))
    ));
}

#[test]
fn backoff_doubles_up_to_the_mode_limit() {
    let options = |retry_mode| ClientOptions {
        retry_mode,
        base_backoff_ms: 1,
        max_backoff_ms: 1_000_000,
        ..ClientOptions::default()
    };
    let standard = options(RetryMode::Standard);
    assert_eq!(standard.backoff(0), Duration::from_millis(1));
    assert_eq!(standard.backoff(3), Duration::from_millis(8));
    assert_eq!(standard.backoff(20), Duration::from_millis(64));
    assert_eq!(options(RetryMode::Adaptive).backoff(20), Duration::from_millis(1024));
}

#[test]
fn backoff_saturates_at_the_cap() {
    let options = ClientOptions {
        base_backoff_ms: u64::MAX,
        ..ClientOptions::default()
    };
    assert_eq!(options.backoff(10), Duration::from_millis(options.max_backoff_ms));
}

#[test]
fn retry_stops_at_max_attempts() {
    let options = ClientOptions {
        max_attempts: 3,
        base_backoff_ms: 0,
        ..ClientOptions::default()
    };
    let calls = Cell::new(0);
    let result: Result<()> = options.retry(
        "flaky",
        |_| true,
        || {
            calls.set(calls.get() + 1);
            Err(Error::Storage("throttled".into()))
        },
    );
    assert!(result.is_err());
    assert_eq!(calls.get(), 3);
}

#[test]
fn permanent_errors_are_not_retried() {
    let options = ClientOptions {
        base_backoff_ms: 0,
        ..ClientOptions::default()
    };
    let calls = Cell::new(0);
    let result: Result<()> = options.retry(
        "fatal",
        |e| matches!(e, Error::Storage(_)),
        || {
            calls.set(calls.get() + 1);
            Err(Error::InvalidDocx("broken".into()))
        },
    );
    assert!(result.is_err());
    assert_eq!(calls.get(), 1);
}
