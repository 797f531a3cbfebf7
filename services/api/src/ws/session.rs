//! Manages the WebSocket channel lifecycle for one widget instance.

use super::{
    provider::{self, UpstreamFrame, UpstreamLink},
    reply::delayed_demo_reply,
};
use crate::{config::RelayMode, handlers::ApiError, state::AppState};
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use voicewidget_core::{AgentRecord, ClientMessage, ProtocolError, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    MalformedMessage(#[from] ProtocolError),
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to write to widget channel: {0}")]
    Send(#[from] axum::Error),
}

/// How replies are produced for one channel.
pub enum ReplyPolicy {
    /// One canned reply per accepted message, after `delay`.
    Demo { delay: Duration },
    /// Forward frames to an upstream provider and relay its frames back.
    Upstream(UpstreamLink),
}

/// Counters for one channel, logged when it closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub accepted: usize,
    pub malformed: usize,
    pub ignored: usize,
    /// Frames lost because the upstream provider could not take them.
    pub dropped: usize,
    pub replies: usize,
}

/// Axum handler to upgrade an HTTP connection to a widget channel.
///
/// Unknown agents are refused with 404 before the upgrade.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let agent = state.directory.lookup(&agent_id)?.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, agent)))
}

/// Entry point for an upgraded widget channel.
#[instrument(name = "ws_session", skip_all, fields(agent_id = %agent.id, connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, agent: AgentRecord) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("Widget connected");

    let policy = match state.config.relay_mode {
        RelayMode::Demo => ReplyPolicy::Demo {
            delay: state.config.reply_delay,
        },
        RelayMode::Upstream => match provider::start_upstream(&state.config, &agent) {
            Ok(link) => ReplyPolicy::Upstream(link),
            Err(e) => {
                error!(error = ?e, "Could not start upstream provider; closing channel.");
                return;
            }
        },
    };

    let (mut socket_tx, socket_rx) = socket.split();
    match run_relay(&mut socket_tx, socket_rx, policy).await {
        Ok(summary) => info!(
            accepted = summary.accepted,
            malformed = summary.malformed,
            ignored = summary.ignored,
            dropped = summary.dropped,
            replies = summary.replies,
            "Widget disconnected"
        ),
        Err(e) => warn!(error = %e, "Widget channel ended with error"),
    }
}

/// The relay loop for one channel.
///
/// Runs until the widget closes the channel, the stream ends, or a read or
/// write fails. Every write happens from this loop, and every pending reply and
/// upstream task is cancelled before it returns, so nothing is written after
/// the close has been observed. A malformed frame is dropped without affecting
/// the channel.
///
/// With an upstream provider every JSON text frame is forwarded verbatim,
/// whatever its `type`. Forwarding never waits: when the upstream queue is
/// full the frame is dropped, so a stalled provider cannot keep the loop from
/// seeing the widget close.
pub async fn run_relay<S, R>(
    socket_tx: &mut S,
    mut socket_rx: R,
    policy: ReplyPolicy,
) -> Result<RelaySummary, RelayError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut summary = RelaySummary::default();
    let mut pending: JoinSet<String> = JoinSet::new();
    let (demo_delay, mut upstream) = match policy {
        ReplyPolicy::Demo { delay } => (delay, None),
        ReplyPolicy::Upstream(link) => (Duration::ZERO, Some(link)),
    };

    let result = loop {
        tokio::select! {
            inbound = socket_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => match &upstream {
                    Some(link) => match serde_json::from_str::<serde_json::Value>(text.as_str()) {
                        Ok(_) => {
                            summary.accepted += 1;
                            if !link.forward(UpstreamFrame::Text(text.to_string())) {
                                summary.dropped += 1;
                            }
                        }
                        Err(e) => {
                            summary.malformed += 1;
                            warn!(error = %RelayError::MalformedMessage(ProtocolError::Malformed(e)), "Dropping inbound frame");
                        }
                    },
                    None => match ClientMessage::parse(text.as_str()) {
                        Ok(ClientMessage::Message { message }) => {
                            summary.accepted += 1;
                            debug!(%message, "Scheduling demo reply");
                            pending.spawn(delayed_demo_reply(message, demo_delay));
                        }
                        Ok(ClientMessage::Unknown) => {
                            summary.ignored += 1;
                            debug!("Ignoring message of unknown type.");
                        }
                        Ok(other) => {
                            summary.accepted += 1;
                            debug!(?other, "No upstream provider; dropping tool result.");
                        }
                        Err(e) => {
                            summary.malformed += 1;
                            warn!(error = %RelayError::from(e), "Dropping inbound frame");
                        }
                    },
                },
                Some(Ok(Message::Binary(data))) => match &upstream {
                    Some(link) => {
                        if !link.forward(UpstreamFrame::Audio(data)) {
                            summary.dropped += 1;
                        }
                    }
                    None => {
                        summary.ignored += 1;
                        warn!("Received audio data, but no upstream provider is active.");
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Widget closed the channel.");
                    break Ok(());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => {
                    warn!("Error receiving from widget channel: {}", e);
                    break Ok(());
                }
            },
            Some(joined) = pending.join_next() => match joined {
                Ok(reply) => {
                    if let Err(e) = send_msg(socket_tx, &ServerMessage::Response { message: reply }).await {
                        break Err(e);
                    }
                    summary.replies += 1;
                }
                Err(e) => error!("Pending reply task failed: {}", e),
            },
            Some(frame) = next_upstream_frame(&mut upstream) => {
                if let Err(e) = socket_tx.send(Message::Text(frame.into())).await {
                    break Err(e.into());
                }
                summary.replies += 1;
            },
        }
    };

    pending.abort_all();
    if let Some(link) = upstream {
        link.shutdown();
    }
    result.map(|()| summary)
}

async fn next_upstream_frame(upstream: &mut Option<UpstreamLink>) -> Option<String> {
    match upstream {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

/// Serializes and sends a `ServerMessage` to the widget.
async fn send_msg<S>(socket_tx: &mut S, msg: &ServerMessage) -> Result<(), RelayError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let serialized = serde_json::to_string(msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
