//! Real-time Client
//!
//! Persistent channel-based connection with automatic reconnection. The
//! client remembers its subscriptions and auth token across connections and
//! replays them on every successful open. All connection state lives in one
//! record behind a std mutex that is never held across an await; events are
//! emitted after the lock is released so handlers may call back into the
//! client.
//!
//! Every open link is tagged with a generation number. Events from a link
//! whose generation is no longer current are ignored, which is how a
//! `disconnect()` racing an in-flight connect or a late close is resolved.

use crate::core::mode::RuntimeMode;
use crate::core::retry::{exponential_backoff, race_timeout};
use crate::core::sync::lock_recover;
use crate::core::task::ScopedTask;
use crate::dev_log;
use crate::realtime::error::{RealtimeError, RealtimeResult};
use crate::realtime::event::{ClientEvent, ConnectionState, EventBus, EventKind, HandlerId};
use crate::realtime::message::{MessageType, RealtimeMessage, UpdateEvent};
use crate::realtime::transport::{
    OutboundFrame, Transport, TransportEvent, TransportLink, WebSocketTransport,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub const DEFAULT_URL: &str = "ws://localhost:8080";

const DISCONNECT_REASON: &str = "Client disconnect";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeClientConfig {
    pub url: String,
    pub auto_reconnect: bool,
    /// Base delay; attempt n waits `reconnect_delay * 2^(n-1)`
    #[serde(rename = "reconnect_delay_ms", with = "crate::core::config::duration_ms")]
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    #[serde(rename = "heartbeat_interval_ms", with = "crate::core::config::duration_ms")]
    pub heartbeat_interval: Duration,
    #[serde(rename = "connection_timeout_ms", with = "crate::core::config::duration_ms")]
    pub connection_timeout: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for RealtimeClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            auto_reconnect: true,
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_millis(30000),
            connection_timeout: Duration::from_millis(10000),
            auth_token: None,
        }
    }
}

impl RealtimeClientConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Debug)]
struct ConnectionRecord {
    state: ConnectionState,
    subscriptions: BTreeSet<String>,
    reconnect_attempts: u32,
    auth_token: Option<String>,
    auto_reconnect: bool,
    outbound: Option<UnboundedSender<OutboundFrame>>,
    generation: u64,
    reader: ScopedTask,
    heartbeat: ScopedTask,
    reconnect: ScopedTask,
}

impl ConnectionRecord {
    /// Change state, returning the event to emit once the lock is released
    fn transition(&mut self, state: ConnectionState) -> Option<ClientEvent> {
        let previous = self.state;
        if previous == state {
            return None;
        }
        self.state = state;
        Some(ClientEvent::StateChange { state, previous })
    }

    fn send(&self, message: &RealtimeMessage) -> bool {
        let Some(outbound) = &self.outbound else {
            return false;
        };
        match message.to_json() {
            Ok(json) => outbound.send(OutboundFrame::Text(json)).is_ok(),
            Err(err) => {
                log::error!("[RealtimeClient] {}", err);
                false
            }
        }
    }
}

#[derive(Debug)]
struct ClientInner {
    transport: Arc<dyn Transport>,
    config: RealtimeClientConfig,
    mode: RuntimeMode,
    events: EventBus,
    record: Mutex<ConnectionRecord>,
}

impl ClientInner {
    fn record(&self) -> MutexGuard<'_, ConnectionRecord> {
        lock_recover(&self.record, "real-time connection record")
    }

    fn emit(&self, event: ClientEvent) {
        self.events.emit(&event.kind(), &event);
    }

    fn emit_all(&self, events: impl IntoIterator<Item = Option<ClientEvent>>) {
        for event in events.into_iter().flatten() {
            self.emit(event);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.record().generation == generation
    }

    async fn connect(self: &Arc<Self>) -> RealtimeResult<()> {
        let (generation, state_event) = {
            let mut record = self.record();
            if record.state == ConnectionState::Connected {
                return Ok(());
            }
            record.generation += 1;
            (record.generation, record.transition(ConnectionState::Connecting))
        };
        self.emit_all([state_event]);
        dev_log!(self.mode, "[RealtimeClient] Connecting to {}", self.config.url);

        let opened = race_timeout(
            self.config.connection_timeout,
            self.transport.open(&self.config.url),
            || RealtimeError::ConnectionTimeout,
        )
        .await;

        match opened {
            Ok(link) => self.establish(generation, link),
            Err(RealtimeError::ConnectionTimeout) => {
                log::error!(
                    "[RealtimeClient] Connection to {} timed out after {:?}",
                    self.config.url,
                    self.config.connection_timeout
                );
                let state_event = {
                    let mut record = self.record();
                    (record.generation == generation)
                        .then(|| record.transition(ConnectionState::Disconnected))
                        .flatten()
                };
                self.emit_all([state_event]);
                Err(RealtimeError::ConnectionTimeout)
            }
            Err(err) => {
                log::error!("[RealtimeClient] Connection error: {}", err);
                let state_event = {
                    let mut record = self.record();
                    (record.generation == generation)
                        .then(|| record.transition(ConnectionState::Error))
                        .flatten()
                };
                if state_event.is_some() {
                    self.emit_all([state_event, Some(ClientEvent::Error(err.clone()))]);
                }
                Err(err)
            }
        }
    }

    /// Adopt a freshly opened link
    fn establish(self: &Arc<Self>, generation: u64, link: TransportLink) -> RealtimeResult<()> {
        let TransportLink {
            outbound,
            mut inbound,
        } = link;

        let state_event = {
            let mut record = self.record();
            if record.generation != generation {
                drop(record);
                let _ = outbound.send(OutboundFrame::Close {
                    code: NORMAL_CLOSURE,
                    reason: DISCONNECT_REASON.to_string(),
                });
                return Err(RealtimeError::Cancelled);
            }

            record.outbound = Some(outbound);
            record.reconnect_attempts = 0;

            let weak = Arc::downgrade(self);
            record.reader.start(async move {
                while let Some(event) = inbound.recv().await {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    if inner.handle_transport_event(generation, event) {
                        return;
                    }
                }
                if let Some(inner) = weak.upgrade() {
                    inner.handle_close(generation, ABNORMAL_CLOSURE, "transport dropped");
                }
            });

            let state_event = record.transition(ConnectionState::Connected);

            let weak = Arc::downgrade(self);
            record
                .heartbeat
                .start_interval(self.config.heartbeat_interval, move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.record().send(&RealtimeMessage::heartbeat());
                        }
                    }
                });

            if let Some(token) = record.auth_token.clone() {
                record.send(&RealtimeMessage::authentication(&token));
            }
            for channel in &record.subscriptions {
                record.send(&RealtimeMessage::subscription(channel));
            }
            state_event
        };

        log::info!("[RealtimeClient] Connected to {}", self.config.url);
        self.emit_all([state_event, Some(ClientEvent::Connected)]);
        Ok(())
    }

    /// Returns true once the link is finished
    fn handle_transport_event(self: &Arc<Self>, generation: u64, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Message(text) => {
                if self.is_current(generation) {
                    self.handle_message(&text);
                }
                false
            }
            TransportEvent::Error(message) => {
                log::error!("[RealtimeClient] Transport error: {}", message);
                let state_event = {
                    let mut record = self.record();
                    (record.generation == generation)
                        .then(|| record.transition(ConnectionState::Error))
                        .flatten()
                };
                if state_event.is_some() {
                    self.emit_all([
                        state_event,
                        Some(ClientEvent::Error(RealtimeError::Transport(message))),
                    ]);
                }
                false
            }
            TransportEvent::Closed { code, reason } => {
                self.handle_close(generation, code, &reason);
                true
            }
        }
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        let (state_event, reconnect) = {
            let mut record = self.record();
            if record.generation != generation {
                return;
            }
            // invalidate the link so a duplicate close is ignored
            record.generation += 1;
            record.outbound = None;
            record.heartbeat.stop();
            record.reader.detach();
            let reconnect = record.auto_reconnect
                && record.reconnect_attempts < self.config.max_reconnect_attempts;
            (record.transition(ConnectionState::Disconnected), reconnect)
        };

        log::warn!(
            "[RealtimeClient] Disconnected from {} ({}: {})",
            self.config.url,
            code,
            reason
        );
        self.emit_all([
            state_event,
            Some(ClientEvent::Disconnected {
                code,
                reason: reason.to_string(),
            }),
        ]);

        if reconnect {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let (attempt, delay, state_event) = {
            let mut record = self.record();
            if !record.auto_reconnect {
                return;
            }
            record.reconnect_attempts += 1;
            let attempt = record.reconnect_attempts;
            let delay = exponential_backoff(self.config.reconnect_delay, attempt);
            let state_event = record.transition(ConnectionState::Reconnecting);

            let weak = Arc::downgrade(self);
            record.reconnect.start_after(delay, async move {
                if let Some(inner) = weak.upgrade() {
                    inner.run_reconnect().await;
                }
            });
            (attempt, delay, state_event)
        };

        log::info!(
            "[RealtimeClient] Reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            self.config.max_reconnect_attempts
        );
        self.emit_all([state_event, Some(ClientEvent::Reconnecting { attempt, delay })]);
    }

    async fn run_reconnect(self: Arc<Self>) {
        {
            let mut record = self.record();
            // this task is finishing on its own; it must not abort itself
            record.reconnect.detach();
            if !record.auto_reconnect {
                return;
            }
        }

        match self.connect().await {
            Ok(()) | Err(RealtimeError::Cancelled) => {}
            Err(err) => {
                let (give_up, attempts, state_event) = {
                    let mut record = self.record();
                    if !record.auto_reconnect {
                        return;
                    }
                    let attempts = record.reconnect_attempts;
                    if attempts >= self.config.max_reconnect_attempts {
                        (true, attempts, record.transition(ConnectionState::Error))
                    } else {
                        (false, attempts, None)
                    }
                };

                if give_up {
                    let terminal = RealtimeError::MaxReconnectAttempts { attempts };
                    log::error!("[RealtimeClient] {} ({})", terminal, err);
                    self.emit_all([state_event, Some(ClientEvent::Error(terminal))]);
                } else {
                    self.schedule_reconnect();
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        let message = match RealtimeMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                if let RealtimeError::InvalidMessage { detail } = &err {
                    log::warn!("[RealtimeClient] Invalid message format: {}", detail);
                }
                self.emit(ClientEvent::Error(err));
                return;
            }
        };

        match message.kind {
            MessageType::Update => {
                let update = UpdateEvent::from_message(&message);
                let channel = update.channel.clone();
                let entity = update.entity.clone();
                let event = ClientEvent::Update(update);
                if let Some(channel) = channel {
                    self.events.emit(&EventKind::ChannelUpdate(channel), &event);
                }
                if let Some(entity) = entity {
                    self.events.emit(&EventKind::EntityUpdate(entity), &event);
                }
                self.events.emit(&EventKind::Update, &event);
            }
            MessageType::Subscription => self.emit(ClientEvent::Subscribed {
                channel: message.channel,
                data: message.data,
            }),
            MessageType::Unsubscription => self.emit(ClientEvent::Unsubscribed {
                channel: message.channel,
                data: message.data,
            }),
            MessageType::Authentication => {
                self.emit(ClientEvent::Authenticated { data: message.data })
            }
            MessageType::Heartbeat => self.emit(ClientEvent::Heartbeat { data: message.data }),
            MessageType::Error => {
                let message = message.error.unwrap_or_else(|| "Server error".to_string());
                log::error!("[RealtimeClient] Server error: {}", message);
                self.emit(ClientEvent::Error(RealtimeError::Server { message }));
            }
        }
    }
}

/// Cloneable handle to one real-time connection
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

impl RealtimeClient {
    pub fn new(config: RealtimeClientConfig, transport: Arc<dyn Transport>, mode: RuntimeMode) -> Self {
        let record = ConnectionRecord {
            state: ConnectionState::Disconnected,
            subscriptions: BTreeSet::new(),
            reconnect_attempts: 0,
            auth_token: config.auth_token.clone(),
            auto_reconnect: config.auto_reconnect,
            outbound: None,
            generation: 0,
            reader: ScopedTask::idle("realtime-reader"),
            heartbeat: ScopedTask::idle("realtime-heartbeat"),
            reconnect: ScopedTask::idle("realtime-reconnect"),
        };
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                mode,
                events: EventBus::new(),
                record: Mutex::new(record),
            }),
        }
    }

    /// Client over a real WebSocket connection
    pub fn websocket(config: RealtimeClientConfig, mode: RuntimeMode) -> Self {
        Self::new(config, Arc::new(WebSocketTransport::new()), mode)
    }

    /// Open the connection.
    ///
    /// Succeeds immediately if already connected. Fails on a transport
    /// error or when the open is not acknowledged within the connection
    /// timeout; neither failure starts the reconnection policy.
    pub async fn connect(&self) -> RealtimeResult<()> {
        self.inner.connect().await
    }

    /// Close the connection and stop reconnecting
    pub fn disconnect(&self) {
        let (outbound, state_event) = {
            let mut record = self.inner.record();
            record.auto_reconnect = false;
            record.generation += 1;
            record.reconnect.stop();
            record.heartbeat.stop();
            record.reader.stop();
            (
                record.outbound.take(),
                record.transition(ConnectionState::Disconnected),
            )
        };

        let was_open = outbound.is_some();
        if let Some(outbound) = outbound {
            let _ = outbound.send(OutboundFrame::Close {
                code: NORMAL_CLOSURE,
                reason: DISCONNECT_REASON.to_string(),
            });
        }
        if !was_open && state_event.is_none() {
            return;
        }
        dev_log!(self.inner.mode, "[RealtimeClient] Disconnected by client");
        self.inner.emit_all([
            state_event,
            Some(ClientEvent::Disconnected {
                code: NORMAL_CLOSURE,
                reason: DISCONNECT_REASON.to_string(),
            }),
        ]);
    }

    /// Re-enable (or disable) automatic reconnection, e.g. after `disconnect()`
    pub fn set_auto_reconnect(&self, enabled: bool) {
        let mut record = self.inner.record();
        record.auto_reconnect = enabled;
        if !enabled {
            record.reconnect.stop();
        }
    }

    /// Subscribe to a channel. Announced now if connected, otherwise on the
    /// next successful connect.
    pub fn subscribe(&self, channel: &str) {
        let mut record = self.inner.record();
        if !record.subscriptions.insert(channel.to_string()) {
            return;
        }
        if record.state == ConnectionState::Connected {
            record.send(&RealtimeMessage::subscription(channel));
        }
        dev_log!(self.inner.mode, "[RealtimeClient] Subscribed to channel: {}", channel);
    }

    pub fn unsubscribe(&self, channel: &str) {
        let mut record = self.inner.record();
        if !record.subscriptions.remove(channel) {
            return;
        }
        if record.state == ConnectionState::Connected {
            record.send(&RealtimeMessage::unsubscription(channel));
        }
        dev_log!(self.inner.mode, "[RealtimeClient] Unsubscribed from channel: {}", channel);
    }

    /// Store the token and send it now if connected
    pub fn authenticate(&self, token: &str) {
        let mut record = self.inner.record();
        record.auth_token = Some(token.to_string());
        if record.state == ConnectionState::Connected {
            record.send(&RealtimeMessage::authentication(token));
        }
    }

    /// Send a frame. Dropped with a warning when not connected.
    pub fn send_message(&self, message: &RealtimeMessage) -> bool {
        let record = self.inner.record();
        if record.state != ConnectionState::Connected {
            log::warn!("[RealtimeClient] {}", RealtimeError::NotConnected);
            return false;
        }
        record.send(message)
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&ClientEvent) + Send + Sync + 'static) -> HandlerId {
        self.inner.events.on(kind, handler)
    }

    pub fn once(&self, kind: EventKind, handler: impl Fn(&ClientEvent) + Send + Sync + 'static) -> HandlerId {
        self.inner.events.once(kind, handler)
    }

    pub fn off(&self, kind: &EventKind, id: Option<HandlerId>) -> usize {
        self.inner.events.off(kind, id)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.record().state
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.record().subscriptions.iter().cloned().collect()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.record().reconnect_attempts
    }

    pub fn auto_reconnect(&self) -> bool {
        self.inner.record().auto_reconnect
    }

    pub fn config(&self) -> &RealtimeClientConfig {
        &self.inner.config
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }
}
