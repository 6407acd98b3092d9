//! Shared helpers for integration tests

#![allow(dead_code)]

use featurehub::core::config::Config;
use featurehub::core::mode::RuntimeMode;
use featurehub::plugin::api::FeatureDefinition;
use featurehub::realtime::api::{ClientEvent, EventKind, MemoryTransport, RealtimeClient};
use featurehub::runtime::FeatureRuntime;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Stand-in for the opaque visual component a feature carries
#[derive(Debug)]
pub struct Panel(pub &'static str);

pub fn feature(id: &str, deps: &[&str]) -> FeatureDefinition {
    FeatureDefinition::new(id, format!("{} feature", id), "1.0.0")
        .with_component(Panel("panel"))
        .with_dependencies(deps.iter().copied())
}

pub fn enabled_feature(id: &str, deps: &[&str]) -> FeatureDefinition {
    feature(id, deps).enabled(true)
}

/// Test-mode configuration with short real-time timings
pub fn test_config() -> Config {
    let mut config = Config {
        mode: Some(RuntimeMode::Test),
        ..Config::default()
    };
    config.realtime.url = "ws://integration.local/live".to_string();
    config.realtime.reconnect_delay = Duration::from_millis(100);
    config.realtime.connection_timeout = Duration::from_millis(500);
    config.dependencies.retry_delay = Duration::from_millis(10);
    config
}

pub fn test_runtime(config: Config) -> (FeatureRuntime, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    (FeatureRuntime::with_transport(config, transport.clone()), transport)
}

/// Record every event of one kind
pub fn record(client: &RealtimeClient, kind: EventKind) -> Arc<Mutex<Vec<ClientEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    events
}

/// Let spawned tasks run without advancing virtual time much
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
