//! Push-to-talk capture.
//!
//! `idle → recording → processing → idle`. The platform recorder and speech
//! recognizer are outside this crate: the host asks for permission through a
//! [`PermissionGate`] and hands back the recognized text via
//! [`Microphone::finish`].

use crate::error::WidgetError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MicState {
    Idle,
    Recording,
    Processing,
}

/// Asks the platform for microphone access.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_microphone(&self) -> bool;
}

/// Grants every request. For hosts without a permission model.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_microphone(&self) -> bool {
        true
    }
}

pub struct Microphone {
    gate: Arc<dyn PermissionGate>,
    state: MicState,
}

impl Microphone {
    pub fn new(gate: Arc<dyn PermissionGate>) -> Self {
        Self {
            gate,
            state: MicState::Idle,
        }
    }

    pub fn state(&self) -> MicState {
        self.state
    }

    /// Starts recording once permission is granted.
    ///
    /// Only valid from `Idle`; a press while already recording or processing
    /// is ignored and returns `Ok(false)`.
    pub async fn start(&mut self) -> Result<bool, WidgetError> {
        if self.state != MicState::Idle {
            return Ok(false);
        }
        if !self.gate.request_microphone().await {
            warn!("Microphone permission denied");
            return Err(WidgetError::PermissionDenied);
        }
        self.state = MicState::Recording;
        debug!("Recording started");
        Ok(true)
    }

    /// `recording → processing`. Returns false in any other state.
    pub fn stop(&mut self) -> bool {
        if self.state != MicState::Recording {
            return false;
        }
        self.state = MicState::Processing;
        true
    }

    /// Completes processing with the recognized text and returns to `Idle`.
    ///
    /// Yields the utterance to send, or `None` if there was nothing to process
    /// or nothing was recognized.
    pub fn finish(&mut self, recognized: &str) -> Option<String> {
        if self.state != MicState::Processing {
            return None;
        }
        self.state = MicState::Idle;
        let text = recognized.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Drops any capture in progress.
    pub fn reset(&mut self) {
        self.state = MicState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Denied;

    #[async_trait]
    impl PermissionGate for Denied {
        async fn request_microphone(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_full_capture_cycle() {
        let mut mic = Microphone::new(Arc::new(AlwaysGranted));

        assert!(mic.start().await.unwrap());
        assert_eq!(mic.state(), MicState::Recording);
        assert!(!mic.start().await.unwrap());

        assert!(mic.stop());
        assert_eq!(mic.state(), MicState::Processing);
        assert!(!mic.stop());

        assert_eq!(mic.finish("  what time is it "), Some("what time is it".to_string()));
        assert_eq!(mic.state(), MicState::Idle);
    }

    #[tokio::test]
    async fn test_denial_stays_idle() {
        let mut mic = Microphone::new(Arc::new(Denied));

        assert_eq!(mic.start().await.unwrap_err(), WidgetError::PermissionDenied);
        assert_eq!(mic.state(), MicState::Idle);
        assert!(!mic.stop());
    }

    #[tokio::test]
    async fn test_empty_recognition_sends_nothing() {
        let mut mic = Microphone::new(Arc::new(AlwaysGranted));
        mic.start().await.unwrap();
        mic.stop();

        assert_eq!(mic.finish("   "), None);
        assert_eq!(mic.state(), MicState::Idle);
    }

    #[test]
    fn test_finish_without_capture_is_ignored() {
        let mut mic = Microphone::new(Arc::new(AlwaysGranted));
        assert_eq!(mic.finish("hello"), None);
    }
}
