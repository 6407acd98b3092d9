//! Client events and their dispatch
//!
//! Listeners register against a closed [`EventKind`]; the client emits a
//! typed [`ClientEvent`]. Each handler runs isolated, so a panicking handler
//! is logged and skipped without affecting the others or the emitter.

use crate::core::sync::{call_isolated, lock_recover};
use crate::realtime::error::RealtimeError;
use crate::realtime::message::UpdateEvent;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChange {
        state: ConnectionState,
        previous: ConnectionState,
    },
    Connected,
    Disconnected {
        code: u16,
        reason: String,
    },
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
    Update(UpdateEvent),
    Subscribed {
        channel: Option<String>,
        data: Option<Value>,
    },
    Unsubscribed {
        channel: Option<String>,
        data: Option<Value>,
    },
    Authenticated {
        data: Option<Value>,
    },
    Heartbeat {
        data: Option<Value>,
    },
    Error(RealtimeError),
}

/// What a handler listens for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChange,
    Connected,
    Disconnected,
    Reconnecting,
    /// Every update regardless of channel or entity
    Update,
    ChannelUpdate(String),
    EntityUpdate(String),
    Subscribed,
    Unsubscribed,
    Authenticated,
    Heartbeat,
    Error,
}

impl ClientEvent {
    /// The kind every handler for this event is registered under. Updates are
    /// additionally fanned out to channel and entity kinds by the client.
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::StateChange { .. } => EventKind::StateChange,
            ClientEvent::Connected => EventKind::Connected,
            ClientEvent::Disconnected { .. } => EventKind::Disconnected,
            ClientEvent::Reconnecting { .. } => EventKind::Reconnecting,
            ClientEvent::Update(_) => EventKind::Update,
            ClientEvent::Subscribed { .. } => EventKind::Subscribed,
            ClientEvent::Unsubscribed { .. } => EventKind::Unsubscribed,
            ClientEvent::Authenticated { .. } => EventKind::Authenticated,
            ClientEvent::Heartbeat { .. } => EventKind::Heartbeat,
            ClientEvent::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type EventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

struct Registration {
    id: HandlerId,
    handler: EventHandler,
    once: bool,
}

#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<EventKind, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = lock_recover(&self.handlers, "event bus");
        let counts: HashMap<&EventKind, usize> =
            handlers.iter().map(|(kind, regs)| (kind, regs.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&ClientEvent) + Send + Sync + 'static) -> HandlerId {
        self.register(kind, Arc::new(handler), false)
    }

    /// Register a handler that is removed after its first call
    pub fn once(&self, kind: EventKind, handler: impl Fn(&ClientEvent) + Send + Sync + 'static) -> HandlerId {
        self.register(kind, Arc::new(handler), true)
    }

    /// Remove one handler, or every handler of `kind` when `id` is None.
    /// Returns the number removed.
    pub fn off(&self, kind: &EventKind, id: Option<HandlerId>) -> usize {
        let mut handlers = lock_recover(&self.handlers, "event bus");
        let Some(registrations) = handlers.get_mut(kind) else {
            return 0;
        };
        let before = registrations.len();
        match id {
            Some(id) => registrations.retain(|r| r.id != id),
            None => registrations.clear(),
        }
        let removed = before - registrations.len();
        if registrations.is_empty() {
            handlers.remove(kind);
        }
        removed
    }

    /// Call every handler registered under `kind` with `event`
    pub fn emit(&self, kind: &EventKind, event: &ClientEvent) {
        let to_call: Vec<EventHandler> = {
            let mut handlers = lock_recover(&self.handlers, "event bus");
            let Some(registrations) = handlers.get_mut(kind) else {
                return;
            };
            let selected = registrations.iter().map(|r| r.handler.clone()).collect();
            registrations.retain(|r| !r.once);
            if registrations.is_empty() {
                handlers.remove(kind);
            }
            selected
        };

        for handler in to_call {
            call_isolated("real-time event handler", || handler(event));
        }
    }

    pub fn handler_count(&self, kind: &EventKind) -> usize {
        lock_recover(&self.handlers, "event bus")
            .get(kind)
            .map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        lock_recover(&self.handlers, "event bus").clear();
    }

    fn register(&self, kind: EventKind, handler: EventHandler, once: bool) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock_recover(&self.handlers, "event bus")
            .entry(kind)
            .or_default()
            .push(Registration { id, handler, once });
        id
    }
}
