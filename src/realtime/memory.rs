//! In-process transport
//!
//! Scriptable stand-in for a real server: each `open` follows the next queued
//! [`OpenBehavior`], and every accepted connection is handed out as a
//! [`MemorySession`] through which the caller plays the server side.

use crate::core::sync::lock_recover;
use crate::realtime::error::RealtimeError;
use crate::realtime::message::RealtimeMessage;
use crate::realtime::transport::{
    OutboundFrame, Transport, TransportEvent, TransportLink, ABNORMAL_CLOSURE,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenBehavior {
    Accept,
    /// Fail the open with this reason
    Refuse(String),
    /// Never complete the open
    Hang,
}

#[derive(Debug)]
struct MemoryState {
    queued: VecDeque<OpenBehavior>,
    default_behavior: OpenBehavior,
    sessions: VecDeque<MemorySession>,
    opened_urls: Vec<String>,
}

#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// Accepts every connection until told otherwise
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                queued: VecDeque::new(),
                default_behavior: OpenBehavior::Accept,
                sessions: VecDeque::new(),
                opened_urls: Vec::new(),
            }),
        }
    }

    /// Behaviour for the next open that has no queued behaviour yet
    pub fn push_behavior(&self, behavior: OpenBehavior) {
        lock_recover(&self.state, "memory transport").queued.push_back(behavior);
    }

    pub fn set_default_behavior(&self, behavior: OpenBehavior) {
        lock_recover(&self.state, "memory transport").default_behavior = behavior;
    }

    /// Number of `open` calls so far, successful or not
    pub fn open_count(&self) -> usize {
        lock_recover(&self.state, "memory transport").opened_urls.len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        lock_recover(&self.state, "memory transport").opened_urls.clone()
    }

    /// Oldest accepted connection not yet taken
    pub fn take_session(&self) -> Option<MemorySession> {
        lock_recover(&self.state, "memory transport").sessions.pop_front()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> Result<TransportLink, RealtimeError> {
        let behavior = {
            let mut state = lock_recover(&self.state, "memory transport");
            state.opened_urls.push(url.to_string());
            let default_behavior = state.default_behavior.clone();
            state.queued.pop_front().unwrap_or(default_behavior)
        };

        match behavior {
            OpenBehavior::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                lock_recover(&self.state, "memory transport")
                    .sessions
                    .push_back(MemorySession {
                        url: url.to_string(),
                        sent: outbound_rx,
                        events: inbound_tx,
                    });
                Ok(TransportLink {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
            OpenBehavior::Refuse(reason) => Err(RealtimeError::ConnectionFailed(reason)),
            OpenBehavior::Hang => futures::future::pending().await,
        }
    }
}

/// Server side of one accepted connection
#[derive(Debug)]
pub struct MemorySession {
    pub url: String,
    sent: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MemorySession {
    /// Deliver a raw text frame to the client
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Message(text.into())).is_ok()
    }

    pub fn push_message(&self, message: &RealtimeMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.push_text(json),
            Err(_) => false,
        }
    }

    /// Close the connection from the server side
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.events
            .send(TransportEvent::Closed {
                code,
                reason: reason.to_string(),
            })
            .is_ok()
    }

    /// Report a transport error followed by an abnormal close
    pub fn fail(&self, error: &str) -> bool {
        self.events
            .send(TransportEvent::Error(error.to_string()))
            .is_ok()
            && self.close(ABNORMAL_CLOSURE, error)
    }

    /// Frames the client has sent so far
    pub fn drain_sent(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Text frames the client has sent so far, parsed
    pub fn sent_messages(&mut self) -> Vec<RealtimeMessage> {
        self.drain_sent()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => RealtimeMessage::parse(&text).ok(),
                OutboundFrame::Close { .. } => None,
            })
            .collect()
    }

    /// Wait for the next frame from the client
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.sent.recv().await
    }
}
