//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the read-only
//! resources every handler and channel task needs.

use crate::config::Config;
use std::sync::Arc;
use voicewidget_core::AgentDirectory;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<AgentDirectory>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(directory: AgentDirectory, config: Config) -> Self {
        Self {
            directory: Arc::new(directory),
            config: Arc::new(config),
        }
    }
}
