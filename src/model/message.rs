//! Messages exchanged with a channel

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of message received from a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomingMessageType {
    /// Free-form text typed by the user
    Plaintext,
    /// Structured payload (button press, quick reply, postback)
    Payload,
}

/// Kind of message sent back to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutgoingMessageType {
    Plaintext,
    Payload,
}

/// A message received from a channel, one per transport event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "type")]
    pub kind: IncomingMessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Transport-specific data, never inspected by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl IncomingMessage {
    pub fn plaintext(text: impl Into<String>) -> Self {
        Self {
            kind: IncomingMessageType::Plaintext,
            text: Some(text.into()),
            payload: None,
            metadata: None,
        }
    }

    pub fn payload(payload: impl Into<Value>) -> Self {
        Self {
            kind: IncomingMessageType::Payload,
            text: None,
            payload: Some(payload.into()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A message the channel should deliver when a step is reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(rename = "type")]
    pub kind: OutgoingMessageType,
    pub payload: Value,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: OutgoingMessageType::Plaintext,
            payload: Value::String(text.into()),
        }
    }

    pub fn payload(payload: impl Into<Value>) -> Self {
        Self {
            kind: OutgoingMessageType::Payload,
            payload: payload.into(),
        }
    }

    /// Text of a plaintext message
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            OutgoingMessageType::Plaintext => self.payload.as_str(),
            OutgoingMessageType::Payload => None,
        }
    }
}
