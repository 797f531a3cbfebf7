//! Manages the upstream voice-provider connection behind a widget channel.

pub mod upstream;

use crate::config::Config;
use anyhow::{Context, Result};
use bytes::Bytes;
use std::time::Duration;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{error, warn};
use voicewidget_core::{AgentRecord, ServerMessage};

/// Frames queued toward the upstream provider before new ones are dropped.
pub const FRAME_QUEUE: usize = 128;
/// How long dialing the upstream provider may take.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A frame travelling from the widget to the upstream provider.
#[derive(Debug)]
pub enum UpstreamFrame {
    /// A JSON text frame, forwarded byte for byte.
    Text(String),
    /// A chunk of raw audio from the widget.
    Audio(Bytes),
}

/// The relay loop's handle on a running upstream task.
pub struct UpstreamLink {
    frames: mpsc::Sender<UpstreamFrame>,
    replies: mpsc::Receiver<String>,
    task: JoinHandle<()>,
}

impl UpstreamLink {
    pub fn new(
        frames: mpsc::Sender<UpstreamFrame>,
        replies: mpsc::Receiver<String>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            frames,
            replies,
            task,
        }
    }

    /// Queues a frame for the upstream task without waiting.
    ///
    /// Returns false when the frame was dropped because the queue is full or
    /// the upstream task is gone.
    pub fn forward(&self, frame: UpstreamFrame) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Upstream provider is not keeping up; dropping frame.");
                false
            }
            Err(TrySendError::Closed(frame)) => {
                warn!("Upstream provider is gone; dropping frame: {:?}", frame);
                false
            }
        }
    }

    /// The next text frame to relay back to the widget.
    pub async fn recv(&mut self) -> Option<String> {
        self.replies.recv().await
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Appends the agent's upstream id as an `agent_id` query parameter.
pub fn upstream_url(base: &str, agent: &AgentRecord) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}agent_id={}", base, separator, agent.upstream_agent_id)
}

/// Spawns the upstream task for one widget channel.
///
/// The task connects lazily; a connection failure is reported to the widget
/// once as an `error` message and the widget channel stays open.
pub fn start_upstream(config: &Config, agent: &AgentRecord) -> Result<UpstreamLink> {
    let base = config
        .upstream_ws_url
        .as_deref()
        .context("Upstream WebSocket URL not configured")?;
    let url = upstream_url(base, agent);
    let api_key = config.upstream_api_key.clone();

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE);
    let (replies_tx, replies_rx) = mpsc::channel(FRAME_QUEUE);

    let task = tokio::spawn(async move {
        if let Err(e) = upstream::run(
            &url,
            api_key.as_deref(),
            CONNECT_TIMEOUT,
            frames_rx,
            replies_tx.clone(),
        )
        .await
        {
            error!(error = ?e, "Upstream provider task failed");
            let message = ServerMessage::Error {
                message: format!("Voice connection failed: {}", e),
            };
            if let Ok(text) = message.to_json() {
                let _ = replies_tx.send(text).await;
            }
        }
    });

    Ok(UpstreamLink::new(frames_tx, replies_rx, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicewidget_core::AgentDirectory;

    #[test]
    fn test_upstream_url_appends_agent_id() {
        let directory = AgentDirectory::demo();
        let agent = directory.lookup("demo-agent").unwrap();

        assert_eq!(
            upstream_url("wss://up.example.com/convai", agent),
            "wss://up.example.com/convai?agent_id=agent_01jvg9443reddrc38gye4jhfvr"
        );
        assert_eq!(
            upstream_url("wss://up.example.com/convai?v=1", agent),
            "wss://up.example.com/convai?v=1&agent_id=agent_01jvg9443reddrc38gye4jhfvr"
        );
    }

    #[test]
    fn test_start_upstream_requires_url() {
        let directory = AgentDirectory::demo();
        let agent = directory.lookup("demo-agent").unwrap();

        assert!(start_upstream(&Config::default(), agent).is_err());
    }

    #[tokio::test]
    async fn test_forward_drops_when_queue_is_full() {
        let (frames_tx, mut frames_rx) = mpsc::channel(1);
        let (_replies_tx, replies_rx) = mpsc::channel(1);
        let link = UpstreamLink::new(frames_tx, replies_rx, tokio::spawn(async {}));

        assert!(link.forward(UpstreamFrame::Audio(Bytes::from_static(b"a"))));
        assert!(!link.forward(UpstreamFrame::Audio(Bytes::from_static(b"b"))));

        drop(frames_rx.recv().await);
        frames_rx.close();
        assert!(!link.forward(UpstreamFrame::Text("{}".to_string())));
        link.shutdown();
    }

    #[tokio::test]
    async fn test_unreachable_upstream_reports_error_to_widget() {
        let directory = AgentDirectory::demo();
        let agent = directory.lookup("demo-agent").unwrap();
        let config = Config {
            upstream_ws_url: Some("ws://127.0.0.1:1/unreachable".to_string()),
            ..Config::default()
        };

        let mut link = start_upstream(&config, agent).unwrap();
        let text = link.recv().await.expect("error frame");

        match ServerMessage::parse(&text).unwrap() {
            ServerMessage::Error { message } => {
                assert!(message.starts_with("Voice connection failed"))
            }
            other => panic!("unexpected message: {:?}", other),
        }
        link.shutdown();
    }
}
