use std::path::{Path, PathBuf};

use crate::config::schema::JobdeckConfig;
use crate::error::ConfigError;

/// Overrides `api.base_url`.
pub const ENV_API_URL: &str = "JOBDECK_API_URL";
/// Overrides `api.api_token`.
pub const ENV_API_TOKEN: &str = "JOBDECK_API_TOKEN";
/// Overrides `storage.database_path`.
pub const ENV_DB_PATH: &str = "JOBDECK_DB_PATH";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from a file extension. Anything but `.yaml`/`.yml`
    /// is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Loads, overrides from the environment and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<JobdeckConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = parse_config(&content, ConfigFormat::from_path(path))?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;

    log::debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

/// Parses and validates config text. The environment is not consulted.
pub fn load_config_from_str(
    content: &str,
    format: ConfigFormat,
) -> Result<JobdeckConfig, ConfigError> {
    let config = parse_config(content, format)?;
    validate_config(&config)?;
    Ok(config)
}

/// Default configuration with environment overrides applied.
pub fn config_from_env() -> Result<JobdeckConfig, ConfigError> {
    let mut config = JobdeckConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(content: &str, format: ConfigFormat) -> Result<JobdeckConfig, ConfigError> {
    match format {
        ConfigFormat::Json => Ok(serde_json::from_str(content)?),
        ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Applies `JOBDECK_*` environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut JobdeckConfig) {
    if let Some(url) = env_var(ENV_API_URL) {
        config.api.base_url = url;
    }
    if let Some(token) = env_var(ENV_API_TOKEN) {
        config.api.api_token = Some(token);
    }
    if let Some(path) = env_var(ENV_DB_PATH) {
        config.storage.database_path = Some(PathBuf::from(path));
    }
}

fn validate_config(config: &JobdeckConfig) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(&config.api.base_url).map_err(|e| ConfigError::Validation {
        message: format!("Invalid api.base_url '{}': {}", config.api.base_url, e),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            message: format!("api.base_url must be http or https, got '{}'", url.scheme()),
        });
    }

    if config.api.request_timeout_secs == 0 || config.api.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "api timeouts must be greater than zero".to_string(),
        });
    }

    let poll = &config.poll;
    if poll.interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll.interval_ms must be greater than zero".to_string(),
        });
    }
    if poll.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "poll.max_attempts must be greater than zero".to_string(),
        });
    }
    if poll.max_consecutive_failures == 0 {
        return Err(ConfigError::Validation {
            message: "poll.max_consecutive_failures must be greater than zero".to_string(),
        });
    }
    if poll.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "poll.backoff_multiplier must be at least 1.0, got {}",
                poll.backoff_multiplier
            ),
        });
    }
    if poll.max_backoff_ms < poll.initial_backoff_ms {
        return Err(ConfigError::Validation {
            message: "poll.max_backoff_ms must not be below poll.initial_backoff_ms".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = load_config_from_str("{}", ConfigFormat::Json).unwrap();
        assert_eq!(config, JobdeckConfig::default());
    }

    #[test]
    fn test_load_json_config() {
        let json = r#"
        {
            "api": { "base_url": "https://analysis.example.com", "request_retries": 0 },
            "poll": { "interval_ms": 2000, "max_attempts": 60 },
            "log": { "format": "json" }
        }
        "#;

        let config = load_config_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.api.base_url, "https://analysis.example.com");
        assert_eq!(config.api.request_retries, 0);
        assert_eq!(config.log.format, LogFormat::Json);

        let poll = config.poll.to_poll_config();
        assert_eq!(poll.interval, Duration::from_millis(2000));
        assert_eq!(poll.max_attempts, 60);
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
api:
  base_url: http://127.0.0.1:9000
storage:
  persist: false
"#;
        let config = load_config_from_str(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert!(config.storage.resolved_database_path().is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            r#"{ "api": { "base_url": "not a url" } }"#,
            r#"{ "api": { "base_url": "ftp://example.com" } }"#,
            r#"{ "api": { "request_timeout_secs": 0 } }"#,
            r#"{ "poll": { "interval_ms": 0 } }"#,
            r#"{ "poll": { "max_attempts": 0 } }"#,
            r#"{ "poll": { "backoff_multiplier": 0.5 } }"#,
            r#"{ "poll": { "initial_backoff_ms": 5000, "max_backoff_ms": 10 } }"#,
        ];

        for case in cases {
            assert!(
                load_config_from_str(case, ConfigFormat::Json).is_err(),
                "should reject {}",
                case
            );
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
    }

    #[test]
    fn test_token_is_redacted_in_debug_and_not_serialized() {
        let mut config = JobdeckConfig::default();
        config.api.api_token = Some("super-secret".to_string());

        assert!(!format!("{:?}", config).contains("super-secret"));
        assert!(!serde_json::to_string(&config).unwrap().contains("super-secret"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobdeck.json");
        std::fs::write(&path, r#"{ "api": { "base_url": "http://file.example.com" } }"#).unwrap();

        std::env::set_var(ENV_API_URL, "https://env.example.com");
        std::env::set_var(ENV_API_TOKEN, "token-from-env");
        std::env::set_var(ENV_DB_PATH, "/tmp/jobdeck-test.db");

        let config = load_config(&path);

        std::env::remove_var(ENV_API_URL);
        std::env::remove_var(ENV_API_TOKEN);
        std::env::remove_var(ENV_DB_PATH);

        let config = config.unwrap();
        assert_eq!(config.api.base_url, "https://env.example.com");
        assert_eq!(config.api.api_token.as_deref(), Some("token-from-env"));
        assert_eq!(
            config.storage.resolved_database_path(),
            Some(PathBuf::from("/tmp/jobdeck-test.db"))
        );
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        let result = load_config("/nonexistent/jobdeck.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
