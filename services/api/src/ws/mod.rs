//! WebSocket Session Relay
//!
//! This module owns the per-widget bidirectional channel. It is structured into
//! submodules:
//!
//! - `session`: the channel lifecycle, from upgrade to close, and the relay loop.
//! - `reply`: the demo reply policy (canned echo after a delay).
//! - `provider`: verbatim forwarding to an upstream voice provider.

pub mod provider;
pub mod reply;
pub mod session;

pub use session::{ReplyPolicy, RelayError, RelaySummary, run_relay, ws_handler};
