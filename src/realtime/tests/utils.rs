//! Shared helpers for the real-time client tests

use crate::core::mode::RuntimeMode;
use crate::realtime::api::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn fast_config() -> RealtimeClientConfig {
    RealtimeClientConfig {
        url: "ws://test.local/live".to_string(),
        reconnect_delay: Duration::from_millis(100),
        heartbeat_interval: Duration::from_secs(30),
        connection_timeout: Duration::from_secs(1),
        ..RealtimeClientConfig::default()
    }
}

pub fn client_with(config: RealtimeClientConfig) -> (RealtimeClient, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let client = RealtimeClient::new(config, transport.clone(), RuntimeMode::Test);
    (client, transport)
}

/// Let spawned tasks run; on paused time this also advances the clock a tick
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Record every event emitted under `kind`
pub fn record(client: &RealtimeClient, kind: EventKind) -> Arc<Mutex<Vec<ClientEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    events
}

/// Subscription frames in `messages`, by channel
pub fn subscription_channels(messages: &[RealtimeMessage]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.kind == MessageType::Subscription)
        .filter_map(|m| m.channel.clone())
        .collect()
}
