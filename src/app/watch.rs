//! `watch` subcommand: stream live events to the log

use crate::core::shutdown::ShutdownCoordinator;
use crate::realtime::api::{ClientEvent, EventKind, RealtimeClient, RealtimeError};
use crate::runtime::FeatureRuntime;
use colored::Colorize;

const WATCHED_KINDS: [EventKind; 9] = [
    EventKind::StateChange,
    EventKind::Reconnecting,
    EventKind::Disconnected,
    EventKind::Update,
    EventKind::Subscribed,
    EventKind::Unsubscribed,
    EventKind::Authenticated,
    EventKind::Heartbeat,
    EventKind::Error,
];

/// One log line per event
pub fn describe_event(event: &ClientEvent) -> String {
    match event {
        ClientEvent::StateChange { state, previous } => format!("state {} -> {}", previous, state),
        ClientEvent::Connected => "connected".to_string(),
        ClientEvent::Disconnected { code, reason } => format!("disconnected ({}): {}", code, reason),
        ClientEvent::Reconnecting { attempt, delay } => {
            format!("reconnecting, attempt {} in {} ms", attempt, delay.as_millis())
        }
        ClientEvent::Update(update) => format!(
            "update on {} [{}]: {}",
            update.channel.as_deref().unwrap_or("-"),
            update.entity.as_deref().unwrap_or("-"),
            update.payload
        ),
        ClientEvent::Subscribed { channel, .. } => {
            format!("subscribed to {}", channel.as_deref().unwrap_or("-"))
        }
        ClientEvent::Unsubscribed { channel, .. } => {
            format!("unsubscribed from {}", channel.as_deref().unwrap_or("-"))
        }
        ClientEvent::Authenticated { data: Some(data) } => format!("authenticated: {}", data),
        ClientEvent::Authenticated { data: None } => "authenticated".to_string(),
        ClientEvent::Heartbeat { .. } => "heartbeat".to_string(),
        ClientEvent::Error(err) => format!("error: {}", err),
    }
}

fn attach_logging(client: &RealtimeClient, shutdown: &ShutdownCoordinator) {
    for kind in WATCHED_KINDS {
        client.on(kind, |event| match event {
            ClientEvent::Error(_) => log::warn!("{}", describe_event(event)),
            ClientEvent::Heartbeat { .. } => log::debug!("{}", describe_event(event)),
            _ => log::info!("{}", describe_event(event)),
        });
    }

    // nothing more will happen once reconnection gives up
    let shutdown = shutdown.clone();
    client.on(EventKind::Error, move |event| {
        if matches!(event, ClientEvent::Error(RealtimeError::MaxReconnectAttempts { .. })) {
            shutdown.trigger_shutdown();
        }
    });
}

/// Connect, subscribe, and log until a signal arrives or reconnection gives up
pub async fn run(
    runtime: &mut FeatureRuntime,
    channels: &[String],
    shutdown: &ShutdownCoordinator,
) -> Result<(), RealtimeError> {
    let client = runtime.realtime();
    attach_logging(&client, shutdown);
    for channel in channels {
        client.subscribe(channel);
    }

    log::info!("Connecting to {}", client.url().bold());
    client.connect().await?;
    if channels.is_empty() {
        log::warn!("No channels given; only control events will be shown");
    }

    shutdown.wait().await;
    runtime.shutdown();
    Ok(())
}
