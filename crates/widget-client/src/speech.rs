//! Speech output for agent replies.

use tracing::info;

/// Speaks agent replies aloud. Fire-and-forget: the widget never waits on it.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str);
}

/// Writes what would have been spoken to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSynthesizer;

impl SpeechSynthesizer for LogSynthesizer {
    fn speak(&self, text: &str) {
        info!(%text, "Speaking agent reply");
    }
}
