//! Voice Widget Relay Library Crate
//!
//! This library contains the relay server: configuration, the agent directory
//! HTTP handlers, the WebSocket session relay, and routing. The `api` binary is
//! a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
