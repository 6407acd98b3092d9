//! TOML configuration
//!
//! One file configures every component: a top-level `mode` plus
//! `[logging]`, `[manager]`, `[dependencies]` and `[realtime]` tables. Every
//! field is optional and falls back to the component default. Durations
//! are written in milliseconds under `*_ms` keys.

use crate::core::error_handling::ContextualError;
use crate::core::logging::LogFormat;
use crate::core::mode::RuntimeMode;
use crate::dependency::api::DependencyManagerConfig;
use crate::plugin::api::FeatureManagerConfig;
use crate::realtime::api::RealtimeClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Directory under the platform config dir holding the default file
pub const CONFIG_DIR_NAME: &str = "featurehub";
pub const CONFIG_FILE_NAME: &str = "featurehub.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error reading configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {field} {reason}")]
    Invalid { field: String, reason: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Serialise a `Duration` as whole milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
            color: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Falls back to `FEATUREHUB_MODE`, then production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RuntimeMode>,
    pub logging: LoggingConfig,
    pub manager: FeatureManagerConfig,
    pub dependencies: DependencyManagerConfig,
    pub realtime: RealtimeClientConfig,
}

impl Config {
    /// `<config dir>/featurehub/featurehub.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration.
    ///
    /// An explicitly named file must exist. Without one, the default path is
    /// used if present; otherwise built-in defaults apply.
    pub async fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        let config = Self::from_toml_str(&contents).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.clone(),
                message,
            },
            other => other,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            field: "config".to_string(),
            reason: e.to_string(),
        })
    }

    /// Effective runtime mode
    pub fn mode(&self) -> RuntimeMode {
        self.mode.unwrap_or_else(RuntimeMode::from_env)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let durations = [
            ("manager.refresh_interval_ms", self.manager.refresh_interval),
            ("dependencies.timeout_ms", self.dependencies.timeout),
            ("realtime.heartbeat_interval_ms", self.realtime.heartbeat_interval),
            ("realtime.connection_timeout_ms", self.realtime.connection_timeout),
        ];
        for (field, value) in durations {
            if value == Duration::ZERO {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        validate_ws_url(&self.realtime.url)?;

        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(invalid(
                "logging.level",
                &format!("'{}' is not a log level", self.logging.level),
            ));
        }
        Ok(())
    }
}

/// Accept absolute `ws://` and `wss://` URLs with a host
pub fn validate_ws_url(url: &str) -> ConfigResult<()> {
    let parsed = Url::parse(url)
        .map_err(|err| invalid("realtime.url", &format!("'{}' is not a valid URL: {}", url, err)))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(invalid(
            "realtime.url",
            &format!("'{}' must start with ws:// or wss://", url),
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("realtime.url", &format!("'{}' has no valid host", url)));
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::api::FailureStrategy;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.realtime.url, "ws://localhost:8080");
        assert_eq!(config.manager.refresh_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            mode = "development"

            [logging]
            level = "debug"
            format = "json"

            [dependencies]
            failure_strategy = "fail"
            retry_attempts = 1
            timeout_ms = 250

            [realtime]
            url = "wss://live.example.com/updates"
            max_reconnect_attempts = 2
            reconnect_delay_ms = 500
            auth_token = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode(), RuntimeMode::Development);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.dependencies.failure_strategy, FailureStrategy::Fail);
        assert_eq!(config.dependencies.timeout, Duration::from_millis(250));
        assert_eq!(config.dependencies.retry_delay, Duration::from_secs(1));
        assert_eq!(config.realtime.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.realtime.auth_token.as_deref(), Some("abc"));
        assert!(config.realtime.auto_reconnect);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = Config::from_toml_str("[realtime]\nheartbeat_interval_ms = 0").unwrap_err();
        assert!(err.to_string().contains("realtime.heartbeat_interval_ms"));

        let err = Config::from_toml_str("[realtime]\nurl = \"http://example.com\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        assert!(validate_ws_url("ws://localhost:8080").is_ok());
        assert!(validate_ws_url("wss://updates.example.org/stream?v=2").is_ok());
        assert!(validate_ws_url("ws://[::1]:9000/live").is_ok());
    }

    #[test]
    fn test_malformed_urls_are_rejected() {
        for url in [
            "ws://:8080",
            "ws://host:notaport/x",
            "ws://[::1",
            "ws://",
            "localhost:8080",
            "https://example.com",
        ] {
            assert!(
                matches!(validate_ws_url(url), Err(ConfigError::Invalid { .. })),
                "accepted {}",
                url
            );
        }
        let err = validate_ws_url("http://example.com").unwrap_err();
        assert!(err.to_string().contains("ws:// or wss://"));

        let err = Config::from_toml_str("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("not a log level"));

        let err = Config::from_toml_str("mode = \"staging\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = Config::default();
        config.realtime.max_reconnect_attempts = 9;
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("max_reconnect_attempts = 9"));
        assert!(text.contains("refresh_interval_ms = 5000"));
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = Config::load(Some(&missing)).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let path = dir.path().join("featurehub.toml");
        std::fs::write(&path, "[manager]\nrefresh_interval_ms = 1000\n").unwrap();
        let config = Config::load(Some(&path)).await.unwrap();
        assert_eq!(config.manager.refresh_interval, Duration::from_secs(1));

        std::fs::write(&path, "[manager\n").unwrap();
        let err = Config::load(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()));
    }
}
