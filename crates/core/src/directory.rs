//! Agent Directory
//!
//! An explicitly constructed, read-only map from agent id to [`AgentRecord`].
//! The relay builds one at startup and shares it by reference with every
//! request handler; nothing mutates it afterwards.

use crate::agent::{AgentConfig, AgentRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use utoipa::ToSchema;

pub const DEMO_AGENT_ID: &str = "demo-agent";

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Agent not found: {0}")]
    NotFound(String),
    #[error("Duplicate agent id in directory: {0}")]
    DuplicateId(String),
    #[error("Failed to read agent file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid agent definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The answer to a connect-bootstrap request: where to dial, and with what persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    #[schema(example = "ws://localhost:3001/ws/demo-agent")]
    pub ws_url: String,
    pub agent_config: AgentConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    agents: HashMap<String, AgentRecord>,
}

impl AgentDirectory {
    /// Builds a directory from a list of records. Ids must be unique.
    pub fn new(records: impl IntoIterator<Item = AgentRecord>) -> Result<Self, DirectoryError> {
        let mut agents = HashMap::new();
        for record in records {
            if agents.contains_key(&record.id) {
                return Err(DirectoryError::DuplicateId(record.id));
            }
            agents.insert(record.id.clone(), record);
        }
        Ok(Self { agents })
    }

    /// The single-agent directory used when no agent file is configured.
    pub fn demo() -> Self {
        let record = AgentRecord {
            id: DEMO_AGENT_ID.to_string(),
            upstream_agent_id: "agent_01jvg9443reddrc38gye4jhfvr".to_string(),
            display_name: "Demo Assistant".to_string(),
            config: AgentConfig {
                first_message: "Hi! How can I help you today?".to_string(),
                system_prompt: "You are a helpful assistant.".to_string(),
                tools: ["get_battery_level", "change_brightness", "flash_screen"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
        };
        Self {
            agents: HashMap::from([(record.id.clone(), record)]),
        }
    }

    /// Parses a JSON array of agent records.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let records: Vec<AgentRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    /// Loads a JSON array of agent records from disk.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let json = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::from_json(&json)?;
        debug!(path = %path.display(), agents = directory.len(), "Loaded agent directory");
        Ok(directory)
    }

    pub fn lookup(&self, agent_id: &str) -> Result<&AgentRecord, DirectoryError> {
        self.agents
            .get(agent_id)
            .ok_or_else(|| DirectoryError::NotFound(agent_id.to_string()))
    }

    /// Resolves the channel endpoint a widget should dial next.
    ///
    /// `endpoint_base` is the `ws://host[:port]` prefix derived from the incoming
    /// request. No channel is opened here.
    pub fn connect_bootstrap(
        &self,
        agent_id: &str,
        endpoint_base: &str,
    ) -> Result<Bootstrap, DirectoryError> {
        let record = self.lookup(agent_id)?;
        Ok(Bootstrap {
            ws_url: channel_endpoint(endpoint_base, &record.id),
            agent_config: record.config.clone(),
        })
    }

    /// Agent ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// `ws://host/ws/{agent_id}`
pub fn channel_endpoint(endpoint_base: &str, agent_id: &str) -> String {
    format!("{}/ws/{}", endpoint_base.trim_end_matches('/'), agent_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(id: &str) -> AgentRecord {
        AgentRecord {
            id: id.to_string(),
            upstream_agent_id: format!("agent_{id}"),
            display_name: id.to_uppercase(),
            config: AgentConfig {
                first_message: format!("Hello from {id}"),
                system_prompt: "Prompt".to_string(),
                tools: Default::default(),
            },
        }
    }

    #[test]
    fn test_demo_directory_contains_demo_agent() {
        let directory = AgentDirectory::demo();
        let agent = directory.lookup(DEMO_AGENT_ID).unwrap();

        assert_eq!(agent.display_name, "Demo Assistant");
        assert!(agent.upstream_agent_id.starts_with("agent_"));
        assert_eq!(directory.ids(), vec![DEMO_AGENT_ID]);
    }

    #[test]
    fn test_lookup_and_bootstrap_agree_on_config() {
        let directory = AgentDirectory::new([record("a"), record("b")]).unwrap();

        for id in directory.ids() {
            let looked_up = directory.lookup(id).unwrap();
            let bootstrap = directory.connect_bootstrap(id, "ws://host:1").unwrap();
            assert_eq!(looked_up.config, bootstrap.agent_config);
            assert_eq!(bootstrap.ws_url, format!("ws://host:1/ws/{id}"));
        }
    }

    #[test]
    fn test_unknown_agent_is_not_found_for_both_operations() {
        let directory = AgentDirectory::demo();

        assert!(matches!(
            directory.lookup("unknown"),
            Err(DirectoryError::NotFound(id)) if id == "unknown"
        ));
        assert!(matches!(
            directory.connect_bootstrap("unknown", "ws://localhost:3001"),
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = AgentDirectory::new([record("a"), record("a")]).unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_channel_endpoint_trims_trailing_slash() {
        assert_eq!(
            channel_endpoint("wss://example.com/", "demo-agent"),
            "wss://example.com/ws/demo-agent"
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&vec![record("support"), record("sales")]).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let directory = AgentDirectory::load(file.path()).unwrap();

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.ids(), vec!["sales", "support"]);
        assert_eq!(
            directory.lookup("sales").unwrap().config.first_message,
            "Hello from sales"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = AgentDirectory::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, DirectoryError::Io { .. }));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = AgentDirectory::from_json("{ not json").unwrap_err();
        assert!(matches!(err, DirectoryError::Parse(_)));
    }
}
