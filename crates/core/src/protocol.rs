//! Defines the JSON message protocol spoken over the widget channel.
//!
//! Every frame is a JSON object with a `type` discriminator. Both ends ignore
//! types they do not know; a frame that is not valid JSON, or that is missing a
//! required field for a known type, is a [`ProtocolError::Malformed`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Messages sent from the widget to the relay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One user utterance.
    Message { message: String },
    /// The outcome of a `tool_call` the agent asked the widget to run.
    ToolResult {
        tool_call_id: String,
        result: Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

/// Messages sent from the relay to the widget.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Agent reply text.
    Response { message: String },
    /// Asks the widget to run a local capability by name.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        parameters: Value,
    },
    /// A relay-side failure the user should see.
    Error { message: String },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
