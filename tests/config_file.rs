//! Configuration file loading and its effect on a runtime

mod common;

use clap::Parser;
use common::test_runtime;
use featurehub::app::cli::Args;
use featurehub::core::config::{Config, ConfigError};
use featurehub::core::logging::LogFormat;
use featurehub::core::mode::RuntimeMode;
use featurehub::dependency::api::FailureStrategy;
use std::time::Duration;

const SAMPLE: &str = r#"
mode = "test"

[logging]
level = "warn"
format = "ext"
color = false

[manager]
refresh_interval_ms = 2000

[dependencies]
auto_resolve = false
failure_strategy = "continue"

[realtime]
url = "wss://updates.example.org/stream"
heartbeat_interval_ms = 15000
"#;

fn write_sample(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("featurehub.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    path
}

#[tokio::test]
async fn test_file_values_reach_every_component() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(Some(&write_sample(&dir))).await.unwrap();

    assert_eq!(config.mode(), RuntimeMode::Test);
    assert_eq!(config.logging.format, LogFormat::Ext);
    assert!(!config.logging.color);

    let (runtime, _) = test_runtime(config);
    assert_eq!(runtime.mode(), RuntimeMode::Test);
    assert_eq!(runtime.manager().config().refresh_interval, Duration::from_secs(2));
    assert!(!runtime.dependencies().config().auto_resolve);
    assert_eq!(runtime.dependencies().config().failure_strategy, FailureStrategy::Continue);

    let client = runtime.realtime();
    assert_eq!(client.url(), "wss://updates.example.org/stream");
    assert_eq!(client.config().heartbeat_interval, Duration::from_secs(15));
    assert_eq!(client.config().max_reconnect_attempts, 5);
}

#[tokio::test]
async fn test_command_line_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir);
    let path_arg = path.to_string_lossy().into_owned();

    let args = Args::try_parse_from([
        "featurehub", "--config", path_arg.as_str(), "--log-level", "debug", "--mode", "development",
        "watch", "--url", "ws://localhost:9000", "-c", "sections",
    ])
    .unwrap();

    let mut config = Config::load(args.config.as_deref()).await.unwrap();
    args.apply_to(&mut config);
    config.validate().unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.mode(), RuntimeMode::Development);
    assert_eq!(config.realtime.url, "ws://localhost:9000");
    // untouched file values survive
    assert_eq!(config.realtime.heartbeat_interval, Duration::from_secs(15));
}

#[tokio::test]
async fn test_bad_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        Config::load(Some(&missing)).await,
        Err(ConfigError::Io { .. })
    ));

    let bad_url = dir.path().join("bad_url.toml");
    std::fs::write(&bad_url, "[realtime]\nurl = \"localhost:8080\"\n").unwrap();
    let err = Config::load(Some(&bad_url)).await.unwrap_err();
    assert!(err.to_string().contains("ws:// or wss://"));

    let bad_type = dir.path().join("bad_type.toml");
    std::fs::write(&bad_type, "[manager]\nrefresh_interval_ms = \"soon\"\n").unwrap();
    assert!(matches!(
        Config::load(Some(&bad_type)).await,
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_effective_config_prints_as_toml() {
    let config = Config::from_toml_str(SAMPLE).unwrap();
    let text = config.to_toml_string().unwrap();
    assert!(text.contains("mode = \"test\""));
    assert!(text.contains("[realtime]"));
    assert!(text.contains("heartbeat_interval_ms = 15000"));
    assert_eq!(Config::from_toml_str(&text).unwrap(), config);
}
