use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// Persona settings handed to the voice provider when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Greeting spoken by the agent when the conversation opens.
    #[schema(example = "Hi! How can I help you today?")]
    pub first_message: String,
    pub system_prompt: String,
    /// Names of the client capabilities the agent may invoke.
    #[serde(default)]
    #[schema(value_type = Vec<String>, example = json!(["get_battery_level"]))]
    pub tools: BTreeSet<String>,
}

/// One configured voice agent.
///
/// The wire names (`elevenlabsAgentId`, `name`) are the ones existing host
/// pages already read, so they are kept even though the fields are
/// provider-neutral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentRecord {
    #[schema(example = "demo-agent")]
    pub id: String,
    /// Opaque identifier of the agent at the upstream provider.
    #[serde(rename = "elevenlabsAgentId")]
    pub upstream_agent_id: String,
    #[serde(rename = "name")]
    #[schema(example = "Demo Assistant")]
    pub display_name: String,
    pub config: AgentConfig,
}

impl AgentRecord {
    /// Returns true when the agent is allowed to call `tool`.
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.config.tools.contains(tool)
    }
}
