//! Shared types for the voice widget relay.
//!
//! Both the relay server and the widget session client depend on this crate:
//! the agent records served by the directory, the bootstrap descriptor, and the
//! JSON message protocol spoken over the bidirectional channel.

pub mod agent;
pub mod directory;
pub mod protocol;

pub use agent::{AgentConfig, AgentRecord};
pub use directory::{AgentDirectory, Bootstrap, DirectoryError};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
