use crate::backoff::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

pub const DEFAULT_AGENT_ID: &str = "demo-agent";
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// Screen corner the widget is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Position::TopLeft => "top-left",
            Position::TopRight => "top-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomRight => "bottom-right",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid widget position '{0}': expected top-left, top-right, bottom-left or bottom-right")]
pub struct ParsePositionError(String);

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(Position::TopLeft),
            "top-right" => Ok(Position::TopRight),
            "bottom-left" => Ok(Position::BottomLeft),
            "bottom-right" => Ok(Position::BottomRight),
            _ => Err(ParsePositionError(s.to_string())),
        }
    }
}

/// Host-page settings, read once when the widget loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub agent_id: String,
    pub api_url: String,
    pub position: Position,
    /// Connect as soon as the widget starts instead of waiting for a press.
    pub auto_connect: bool,
    /// Timeout for each bootstrap HTTP call and for dialing the channel.
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            agent_id: DEFAULT_AGENT_ID.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            position: Position::default(),
            auto_connect: true,
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl WidgetConfig {
    pub fn new(api_url: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }
}
