//! Wire format
//!
//! Every frame is a JSON object with a `type` discriminator, an optional
//! channel, optional data and error fields and an RFC 3339 timestamp.

use crate::realtime::error::RealtimeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Update,
    Subscription,
    Unsubscription,
    Authentication,
    Heartbeat,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

impl RealtimeMessage {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            channel: None,
            data: None,
            error: None,
            timestamp: now_rfc3339(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn subscription(channel: &str) -> Self {
        Self::new(MessageType::Subscription).with_channel(channel)
    }

    pub fn unsubscription(channel: &str) -> Self {
        Self::new(MessageType::Unsubscription).with_channel(channel)
    }

    pub fn authentication(token: &str) -> Self {
        Self::new(MessageType::Authentication).with_data(serde_json::json!({ "token": token }))
    }

    pub fn heartbeat() -> Self {
        Self::new(MessageType::Heartbeat)
    }

    /// Parse a text frame. Unknown `type` values and malformed JSON both fail.
    pub fn parse(text: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(text).map_err(|e| RealtimeError::InvalidMessage {
            detail: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, RealtimeError> {
        serde_json::to_string(self).map_err(|e| RealtimeError::SendFailed(e.to_string()))
    }

    /// Interpret the data of an UPDATE frame
    pub fn parse_update(&self) -> Option<RealTimeUpdate> {
        self.data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }
}

/// Change kind carried by an update payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// Payload of an UPDATE frame. Only `entity` drives dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeUpdate {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// An update as delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub channel: Option<String>,
    pub entity: Option<String>,
    /// Raw `data` of the frame
    pub payload: Value,
}

impl UpdateEvent {
    pub fn from_message(message: &RealtimeMessage) -> Self {
        let update = message.parse_update();
        Self {
            channel: message.channel.clone(),
            entity: update.and_then(|u| u.entity),
            payload: message.data.clone().unwrap_or(Value::Null),
        }
    }

    pub fn update(&self) -> Option<RealTimeUpdate> {
        serde_json::from_value(self.payload.clone()).ok()
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
