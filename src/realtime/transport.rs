//! Transport seam
//!
//! The client talks to a connection through a pair of channels: frames go
//! out over an unbounded sender, events come back over a receiver. A
//! transport's only job is to open a connection and wire it to that pair.

use crate::realtime::error::RealtimeError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Close code used when the connection ends without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code for a deliberate client disconnect
pub const NORMAL_CLOSURE: u16 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(String),
    /// The connection is gone; always the last event on a link
    Closed { code: u16, reason: String },
    Error(String),
}

/// An open connection
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection. Resolves once the remote side has accepted it.
    async fn open(&self, url: &str) -> Result<TransportLink, RealtimeError>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Transport")
    }
}

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<TransportLink, RealtimeError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(format!("{}: {}", url, e)))?;
        log::debug!("WebSocket opened: {}", url);

        let (mut writer, mut reader) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let writer_events = inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let (message, closing) = match frame {
                    OutboundFrame::Text(text) => (Message::Text(text.into()), false),
                    OutboundFrame::Close { code, reason } => (
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        })),
                        true,
                    ),
                };
                if let Err(e) = writer.send(message).await {
                    let _ = writer_events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let (code, reason) = loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx
                            .send(TransportEvent::Message(text.as_str().to_string()))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                            .unwrap_or((NORMAL_CLOSURE, String::new()));
                    }
                    Some(Ok(_)) => {
                        // ping/pong and binary frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                    None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed { code, reason });
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
