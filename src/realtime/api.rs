//! Public API for the real-time client

// Client and its configuration
pub use crate::realtime::client::{RealtimeClient, RealtimeClientConfig, DEFAULT_URL};

// Per-URL client registry
pub use crate::realtime::registry::ClientRegistry;

// Events
pub use crate::realtime::event::{
    ClientEvent, ConnectionState, EventBus, EventHandler, EventKind, HandlerId,
};

// Wire format
pub use crate::realtime::message::{
    ChangeKind, MessageType, RealTimeUpdate, RealtimeMessage, UpdateEvent,
};

// Transports
pub use crate::realtime::memory::{MemorySession, MemoryTransport, OpenBehavior};
pub use crate::realtime::transport::{
    OutboundFrame, Transport, TransportEvent, TransportLink, WebSocketTransport,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};

// Error handling
pub use crate::realtime::error::{RealtimeError, RealtimeResult};
