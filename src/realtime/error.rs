//! Real-time client errors
//!
//! `connect()` is the only call that returns these; everything else is
//! surfaced through the client's error event.

use crate::core::error_handling::ContextualError;

pub type RealtimeResult<T> = std::result::Result<T, RealtimeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Error reported by an established transport
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid message format")]
    InvalidMessage { detail: String },

    /// ERROR frame sent by the server
    #[error("{message}")]
    Server { message: String },

    #[error("Max reconnection attempts reached")]
    MaxReconnectAttempts { attempts: u32 },

    #[error("Cannot send message: not connected")]
    NotConnected,

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// The connection attempt was superseded by `disconnect()` or a newer attempt
    #[error("Connection attempt cancelled")]
    Cancelled,
}

impl ContextualError for RealtimeError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            RealtimeError::ConnectionTimeout
                | RealtimeError::ConnectionFailed(_)
                | RealtimeError::MaxReconnectAttempts { .. }
        )
    }

    fn user_message(&self) -> Option<String> {
        match self {
            RealtimeError::ConnectionTimeout => Some(
                "Timed out connecting to the real-time endpoint; check the URL or raise [realtime] connection_timeout_ms".to_string(),
            ),
            RealtimeError::ConnectionFailed(reason) => {
                Some(format!("Could not connect to the real-time endpoint: {}", reason))
            }
            RealtimeError::MaxReconnectAttempts { attempts } => Some(format!(
                "Gave up reconnecting after {} attempts",
                attempts
            )),
            _ => None,
        }
    }
}
