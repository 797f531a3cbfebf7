//! Demo reply policy: every accepted utterance gets exactly one canned reply.

use std::time::Duration;

/// The canned reply text for one user utterance.
pub fn demo_reply(message: &str) -> String {
    format!(
        "I heard you say: \"{}\". This is a demo response from your AI assistant!",
        message
    )
}

/// Produces the reply for `message` after `delay`.
///
/// The delay is a timer, so the channel keeps processing input while replies are
/// pending.
pub async fn delayed_demo_reply(message: String, delay: Duration) -> String {
    tokio::time::sleep(delay).await;
    demo_reply(&message)
}
