//! Widget session client.
//!
//! Everything the embeddable voice widget does besides drawing itself: agent
//! lookup and connect-bootstrap over HTTP, the bidirectional channel to the
//! relay, reconnect with capped backoff, the push-to-talk microphone state
//! machine, and dispatch of agent tool calls to local capabilities.
//!
//! Rendering, speech synthesis and the platform microphone are collaborators
//! behind the [`speech::SpeechSynthesizer`], [`microphone::PermissionGate`] and
//! [`tools::ClientTool`] traits.

pub mod api;
pub mod backoff;
pub mod config;
pub mod error;
pub mod machine;
pub mod microphone;
pub mod speech;
pub mod tools;
pub mod transcript;
pub mod widget;

pub use config::{Position, WidgetConfig};
pub use error::WidgetError;
pub use machine::ConnectionState;
pub use widget::{WidgetCommand, WidgetEvent, WidgetSession};
