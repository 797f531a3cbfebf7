//! API Models
//!
//! Response bodies that exist only at the HTTP layer. Agent records and the
//! bootstrap descriptor are shared with the widget client and live in
//! `voicewidget_core`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use voicewidget_core::{AgentConfig, AgentRecord, Bootstrap};

pub const AGENT_NOT_FOUND: &str = "Agent not found";

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    #[schema(example = "Agent not found")]
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&ErrorResponse::new(AGENT_NOT_FOUND)).unwrap();
        assert_eq!(json, r#"{"error":"Agent not found"}"#);
    }

    #[test]
    fn test_bootstrap_serialization_uses_camel_case() {
        let bootstrap = Bootstrap {
            ws_url: "ws://localhost:3001/ws/demo-agent".to_string(),
            agent_config: AgentConfig {
                first_message: "Hi".to_string(),
                system_prompt: "Prompt".to_string(),
                tools: Default::default(),
            },
        };

        let value = serde_json::to_value(&bootstrap).unwrap();
        assert_eq!(value["wsUrl"], "ws://localhost:3001/ws/demo-agent");
        assert_eq!(value["agentConfig"]["firstMessage"], "Hi");
    }
}
