//! Local capabilities the voice agent may invoke by name during a session.
//!
//! The widget receives a `tool_call` frame, looks the tool up in its
//! [`ToolRegistry`], runs it, and answers with a `tool_result` frame carrying the
//! same call id.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use tracing::{info, warn};
use voicewidget_core::ClientMessage;

pub const GET_BATTERY_LEVEL: &str = "get_battery_level";
pub const CHANGE_BRIGHTNESS: &str = "change_brightness";
pub const FLASH_SCREEN: &str = "flash_screen";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool {0} is not enabled for this agent")]
    NotAllowed(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Tool failed: {0}")]
    Failed(String),
}

/// A capability implemented by the host application.
#[async_trait]
pub trait ClientTool: Send + Sync {
    async fn call(&self, parameters: Value) -> Result<Value, ToolError>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ClientTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, tool: Arc<dyn ClientTool>) -> Self {
        self.tools.insert(name.into(), tool);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn dispatch(&self, name: &str, parameters: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(parameters).await
    }

    /// Runs one agent tool call and builds the `tool_result` to send back.
    ///
    /// `allowed` is the agent's configured tool set; calls outside it are
    /// answered with an error result without running anything.
    pub async fn answer(
        &self,
        allowed: Option<&BTreeSet<String>>,
        tool_call_id: String,
        tool_name: &str,
        parameters: Value,
    ) -> ClientMessage {
        let outcome = match allowed {
            Some(allowed) if !allowed.contains(tool_name) => {
                Err(ToolError::NotAllowed(tool_name.to_string()))
            }
            _ => self.dispatch(tool_name, parameters).await,
        };
        let (result, is_error) = match outcome {
            Ok(value) => {
                info!(tool = %tool_name, "Tool call succeeded");
                (value, false)
            }
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Tool call failed");
                (json!(e.to_string()), true)
            }
        };
        ClientMessage::ToolResult {
            tool_call_id,
            result,
            is_error,
        }
    }
}

/// Reads the `brightness` argument of `change_brightness`, a number in `0..=1`.
pub fn brightness_argument(parameters: &Value) -> Result<f64, ToolError> {
    let brightness = parameters
        .get("brightness")
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::InvalidArguments("expected a numeric 'brightness'".into()))?;
    if !(0.0..=1.0).contains(&brightness) {
        return Err(ToolError::InvalidArguments(format!(
            "brightness {} is outside 0..=1",
            brightness
        )));
    }
    Ok(brightness)
}
