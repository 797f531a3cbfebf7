/// Every failure the widget can run into.
///
/// None of these are fatal to the host: each one is turned into a status line
/// via [`WidgetError::user_status`] at the point where it happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    #[error("Agent not found: {0}")]
    NotFound(String),
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Channel dropped")]
    ChannelDropped,
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("Not connected")]
    NotConnected,
}

impl WidgetError {
    /// The short text shown in the widget's status line.
    pub fn user_status(&self) -> &'static str {
        match self {
            WidgetError::NotFound(_) => "Agent not found",
            WidgetError::MalformedMessage(_) => "Received an unreadable message",
            WidgetError::ConnectionFailed(_) => "Connection failed",
            WidgetError::ChannelDropped => "Reconnecting...",
            WidgetError::PermissionDenied => "Microphone access denied",
            WidgetError::NotConnected => "Not connected",
        }
    }

    /// `NotFound` and `PermissionDenied` can never succeed on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            WidgetError::NotFound(_) | WidgetError::PermissionDenied
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_status_strings() {
        assert_eq!(
            WidgetError::NotFound("x".into()).user_status(),
            "Agent not found"
        );
        assert_eq!(
            WidgetError::ConnectionFailed("refused".into()).user_status(),
            "Connection failed"
        );
        assert_eq!(
            WidgetError::PermissionDenied.user_status(),
            "Microphone access denied"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(!WidgetError::NotFound("x".into()).is_retryable());
        assert!(!WidgetError::PermissionDenied.is_retryable());
        assert!(WidgetError::ConnectionFailed("x".into()).is_retryable());
        assert!(WidgetError::ChannelDropped.is_retryable());
    }
}
