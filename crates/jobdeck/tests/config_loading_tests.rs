//! Table-driven tests for configuration loading and validation.

use std::time::Duration;

use jobdeck::config::{load_config, load_config_from_str, ConfigFormat, LogFormat};

struct ConfigTestCase {
    name: &'static str,
    content: &'static str,
    format: ConfigFormat,
    should_succeed: bool,
    /// Expected error substring when loading fails.
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "empty_json",
        content: "{}",
        format: ConfigFormat::Json,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "full_json",
        content: r#"{
            "api": {
                "base_url": "https://analysis.example.com/v1/",
                "connect_timeout_secs": 5,
                "request_timeout_secs": 20,
                "request_retries": 1,
                "retry_backoff_ms": 250
            },
            "poll": {
                "interval_ms": 2500,
                "max_attempts": 48,
                "max_consecutive_failures": 3,
                "initial_backoff_ms": 1000,
                "max_backoff_ms": 8000,
                "backoff_multiplier": 1.5
            },
            "storage": { "persist": true, "database_path": "/var/lib/jobdeck/jobs.db" },
            "log": { "level": "warn", "format": "json" }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "yaml",
        content: "api:\n  base_url: http://10.0.0.5:8000\npoll:\n  max_attempts: 40\n",
        format: ConfigFormat::Yaml,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "malformed_json",
        content: r#"{ "api": { "base_url": "#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("parse config JSON"),
    },
    ConfigTestCase {
        name: "malformed_yaml",
        content: "api: [unclosed",
        format: ConfigFormat::Yaml,
        should_succeed: false,
        expected_error: Some("parse config YAML"),
    },
    ConfigTestCase {
        name: "wrong_type",
        content: r#"{ "poll": { "max_attempts": "many" } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("parse config JSON"),
    },
    ConfigTestCase {
        name: "bad_url",
        content: r#"{ "api": { "base_url": "localhost" } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("api.base_url"),
    },
    ConfigTestCase {
        name: "zero_interval",
        content: r#"{ "poll": { "interval_ms": 0 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("poll.interval_ms"),
    },
    ConfigTestCase {
        name: "zero_failures",
        content: r#"{ "poll": { "max_consecutive_failures": 0 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("poll.max_consecutive_failures"),
    },
];

#[test]
fn config_loading_cases() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.content, case.format);
        if case.should_succeed {
            assert!(result.is_ok(), "{}: {:?}", case.name, result.err());
        } else {
            let err = match result {
                Ok(_) => panic!("{}: expected an error", case.name),
                Err(e) => e.to_string(),
            };
            if let Some(expected) = case.expected_error {
                assert!(
                    err.contains(expected),
                    "{}: '{}' does not mention '{}'",
                    case.name,
                    err,
                    expected
                );
            }
        }
    }
}

#[test]
fn full_config_values() {
    let config = load_config_from_str(CONFIG_TESTS[1].content, ConfigFormat::Json).unwrap();

    assert_eq!(config.api.connect_timeout(), Duration::from_secs(5));
    assert_eq!(config.api.retry_backoff(), Duration::from_millis(250));
    assert_eq!(config.log.format, LogFormat::Json);

    let poll = config.poll.to_poll_config();
    assert_eq!(poll.interval, Duration::from_millis(2500));
    assert_eq!(poll.max_attempts, 48);
    assert_eq!(poll.retry.max_consecutive_failures, 3);
    assert_eq!(poll.retry.backoff_for(2), Duration::from_millis(1500));
    assert_eq!(poll.retry.backoff_for(10), Duration::from_secs(8));
}

#[test]
fn yaml_file_picked_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobdeck.yml");
    std::fs::write(&path, "storage:\n  persist: false\n").unwrap();

    let config = load_config(&path).unwrap();
    assert!(!config.storage.persist);
    assert!(config.storage.resolved_database_path().is_none());
}
