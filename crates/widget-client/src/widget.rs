//! The widget session driver.
//!
//! One task owns the channel, the connection state machine, the microphone and
//! the transcript. It runs a single `select!` over host commands, inbound
//! channel frames and the reconnect timer, and reports everything the UI needs
//! through [`WidgetEvent`]s.

use crate::api::{ApiClient, to_channel_url};
use crate::config::WidgetConfig;
use crate::error::WidgetError;
use crate::machine::{AfterClose, ConnectTrigger, ConnectionState, SessionMachine};
use crate::microphone::{MicState, Microphone, PermissionGate};
use crate::speech::SpeechSynthesizer;
use crate::tools::ToolRegistry;
use crate::transcript::{ChatMessage, Sender, Transcript};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message as WsMessage},
};
use tracing::{debug, info, instrument, warn};
use voicewidget_core::{AgentConfig, ClientMessage, ServerMessage};

type Channel = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_DISCONNECTED: &str = "Disconnected";
pub const STATUS_RECONNECTING: &str = "Reconnecting...";
pub const STATUS_LISTENING: &str = "Listening...";
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_READY: &str = "Ready to listen";

/// What the host asks the widget to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCommand {
    /// A press on the connect button.
    Connect,
    /// A typed utterance.
    Send(String),
    /// The talk button went down.
    StartRecording,
    /// The talk button was released; carries what the recognizer heard.
    StopRecording(String),
    /// An explicit close; suppresses reconnecting.
    Close,
}

/// What the widget reports back to the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    State {
        state: ConnectionState,
        status: String,
    },
    /// A status line that does not change the connection state.
    Status(String),
    /// The push-to-talk microphone changed state.
    Microphone { state: MicState, status: String },
    /// A line appended to the transcript.
    Message(ChatMessage),
    ToolCalled { name: String, is_error: bool },
}

enum Step {
    Command(WidgetCommand),
    Frame(Option<Result<WsMessage, tungstenite::Error>>),
    Reconnect,
    Shutdown,
}

pub struct WidgetSession {
    config: WidgetConfig,
    api: ApiClient,
    tools: ToolRegistry,
    speech: Arc<dyn SpeechSynthesizer>,
    microphone: Microphone,
    events: mpsc::Sender<WidgetEvent>,
    machine: SessionMachine,
    transcript: Transcript,
    agent_config: Option<AgentConfig>,
    channel: Option<Channel>,
    reconnect_at: Option<Instant>,
}

impl WidgetSession {
    pub fn new(
        config: WidgetConfig,
        tools: ToolRegistry,
        speech: Arc<dyn SpeechSynthesizer>,
        permissions: Arc<dyn PermissionGate>,
        events: mpsc::Sender<WidgetEvent>,
    ) -> Result<Self, WidgetError> {
        let api = ApiClient::new(config.api_url.clone(), config.request_timeout)?;
        let machine = SessionMachine::new(config.reconnect);
        Ok(Self {
            config,
            api,
            tools,
            speech,
            microphone: Microphone::new(permissions),
            events,
            machine,
            transcript: Transcript::default(),
            agent_config: None,
            channel: None,
            reconnect_at: None,
        })
    }

    /// Drives the widget until the command channel closes, then returns the
    /// conversation.
    #[instrument(skip_all, fields(agent_id = %self.config.agent_id))]
    pub async fn run(mut self, mut commands: mpsc::Receiver<WidgetCommand>) -> Transcript {
        if self.config.auto_connect && self.machine.begin_connect(ConnectTrigger::Startup) {
            self.attempt_connect().await;
        }

        loop {
            let deadline = self.reconnect_at;
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Shutdown,
                },
                frame = next_frame(&mut self.channel) => Step::Frame(frame),
                _ = reconnect_timer(deadline) => Step::Reconnect,
            };

            match step {
                Step::Command(command) => self.handle_command(command).await,
                Step::Frame(Some(Ok(WsMessage::Text(text)))) => {
                    self.handle_inbound(text.as_str()).await
                }
                Step::Frame(Some(Ok(WsMessage::Close(_)))) | Step::Frame(None) => {
                    info!("Relay closed the channel");
                    self.handle_drop().await;
                }
                Step::Frame(Some(Err(e))) => {
                    warn!(error = %e, "Channel error");
                    self.handle_drop().await;
                }
                Step::Frame(Some(Ok(_))) => {}
                Step::Reconnect => {
                    self.reconnect_at = None;
                    if self.machine.fire_reconnect() {
                        self.attempt_connect().await;
                    }
                }
                Step::Shutdown => break,
            }
        }

        self.close_channel().await;
        info!("Widget session finished");
        self.transcript
    }

    async fn handle_command(&mut self, command: WidgetCommand) {
        match command {
            WidgetCommand::Connect => {
                if self.machine.begin_connect(ConnectTrigger::User) {
                    self.reconnect_at = None;
                    self.attempt_connect().await;
                } else {
                    debug!(state = ?self.machine.state(), "Connect ignored");
                }
            }
            WidgetCommand::Send(text) => self.send_utterance(text).await,
            WidgetCommand::StartRecording => match self.microphone.start().await {
                Ok(true) => self.emit_microphone(STATUS_LISTENING).await,
                Ok(false) => debug!(state = ?self.microphone.state(), "Already capturing"),
                Err(e) => self.emit_microphone(e.user_status()).await,
            },
            WidgetCommand::StopRecording(recognized) => {
                if self.microphone.stop() {
                    self.emit_microphone(STATUS_PROCESSING).await;
                    let utterance = self.microphone.finish(&recognized);
                    self.emit_microphone(STATUS_READY).await;
                    if let Some(utterance) = utterance {
                        self.send_utterance(utterance).await;
                    }
                } else {
                    debug!("Not recording");
                }
            }
            WidgetCommand::Close => {
                self.machine.on_user_close();
                self.reconnect_at = None;
                self.reset_microphone().await;
                self.close_channel().await;
                self.emit_state(STATUS_DISCONNECTED).await;
            }
        }
    }

    /// Lookup, connect-bootstrap, then dial. The machine must be `Connecting`.
    async fn attempt_connect(&mut self) {
        self.emit_state(STATUS_CONNECTING).await;
        match self.open_channel().await {
            Ok((channel, agent_config)) => {
                self.channel = Some(channel);
                self.agent_config = Some(agent_config);
                self.machine.on_open();
                info!("Channel open");
                self.emit_state(STATUS_CONNECTED).await;
            }
            Err(e) => {
                warn!(error = %e, "Connection attempt failed");
                let after = self.machine.on_connect_failed(&e);
                self.after_close(after, &e).await;
            }
        }
    }

    async fn open_channel(&self) -> Result<(Channel, AgentConfig), WidgetError> {
        let agent_id = &self.config.agent_id;
        let record = self.api.lookup(agent_id).await?;
        debug!(name = %record.display_name, "Agent found");
        let bootstrap = self.api.connect(agent_id).await?;

        let url = to_channel_url(&bootstrap.ws_url);
        let (channel, _) = timeout(self.config.request_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| WidgetError::ConnectionFailed(format!("timed out dialing {}", url)))?
            .map_err(|e| WidgetError::ConnectionFailed(e.to_string()))?;
        Ok((channel, bootstrap.agent_config))
    }

    async fn handle_drop(&mut self) {
        self.channel = None;
        self.reset_microphone().await;
        let after = self.machine.on_remote_close();
        self.after_close(after, &WidgetError::ChannelDropped).await;
    }

    async fn after_close(&mut self, after: AfterClose, cause: &WidgetError) {
        match after {
            AfterClose::Reconnect(delay) => {
                info!(?delay, attempt = self.machine.attempts(), "Reconnect scheduled");
                self.reconnect_at = Some(Instant::now() + delay);
                self.emit_state(STATUS_RECONNECTING).await;
            }
            AfterClose::Stay => self.emit_state(cause.user_status()).await,
            AfterClose::GiveUp => {
                warn!("Giving up on reconnecting");
                let status = match cause {
                    WidgetError::NotFound(_) => cause.user_status(),
                    _ => WidgetError::ConnectionFailed(String::new()).user_status(),
                };
                self.emit_state(status).await;
            }
        }
    }

    async fn send_utterance(&mut self, text: String) {
        let message = ClientMessage::Message {
            message: text.clone(),
        };
        match self.send_frame(&message).await {
            Ok(()) => {
                let line = self.transcript.push(Sender::User, text).clone();
                self.emit(WidgetEvent::Message(line)).await;
            }
            Err(WidgetError::ChannelDropped) => self.handle_drop().await,
            Err(e) => self.emit(WidgetEvent::Status(e.user_status().to_string())).await,
        }
    }

    async fn send_frame(&mut self, message: &ClientMessage) -> Result<(), WidgetError> {
        let channel = self.channel.as_mut().ok_or(WidgetError::NotConnected)?;
        let json = message
            .to_json()
            .map_err(|e| WidgetError::MalformedMessage(e.to_string()))?;
        channel.send(WsMessage::Text(json.into())).await.map_err(|e| {
            warn!(error = %e, "Failed to write to channel");
            WidgetError::ChannelDropped
        })
    }

    async fn handle_inbound(&mut self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Response { message }) => {
                self.speech.speak(&message);
                let line = self.transcript.push(Sender::Agent, message).clone();
                self.emit(WidgetEvent::Message(line)).await;
            }
            Ok(ServerMessage::ToolCall {
                tool_call_id,
                tool_name,
                parameters,
            }) => {
                let allowed = self.agent_config.as_ref().map(|config| &config.tools);
                let result = self
                    .tools
                    .answer(allowed, tool_call_id, &tool_name, parameters)
                    .await;
                let is_error = matches!(result, ClientMessage::ToolResult { is_error: true, .. });
                self.emit(WidgetEvent::ToolCalled {
                    name: tool_name,
                    is_error,
                })
                .await;
                match self.send_frame(&result).await {
                    Ok(()) => {}
                    Err(WidgetError::ChannelDropped) => self.handle_drop().await,
                    Err(e) => warn!(error = %e, "Could not return tool result"),
                }
            }
            Ok(ServerMessage::Error { message }) => {
                warn!(%message, "Relay reported an error");
                self.emit(WidgetEvent::Status(message)).await;
            }
            Ok(ServerMessage::Unknown) => debug!("Ignoring unknown message type"),
            Err(e) => {
                let e = WidgetError::MalformedMessage(e.to_string());
                warn!(error = %e, "Dropping inbound frame");
            }
        }
    }

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close(None).await {
                debug!(error = %e, "Channel close handshake failed");
            }
        }
    }

    async fn reset_microphone(&mut self) {
        if self.microphone.state() != MicState::Idle {
            self.microphone.reset();
            self.emit_microphone(STATUS_READY).await;
        }
    }

    async fn emit_microphone(&self, status: &str) {
        self.emit(WidgetEvent::Microphone {
            state: self.microphone.state(),
            status: status.to_string(),
        })
        .await;
    }

    async fn emit_state(&self, status: &str) {
        self.emit(WidgetEvent::State {
            state: self.machine.state(),
            status: status.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: WidgetEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }
}

async fn next_frame(
    channel: &mut Option<Channel>,
) -> Option<Result<WsMessage, tungstenite::Error>> {
    match channel {
        Some(channel) => channel.next().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microphone::AlwaysGranted;
    use crate::speech::LogSynthesizer;
    use std::time::Duration;

    fn session(api_url: &str, auto_connect: bool) -> (WidgetSession, mpsc::Receiver<WidgetEvent>) {
        let (events_tx, events_rx) = mpsc::channel(32);
        let config = WidgetConfig {
            auto_connect,
            request_timeout: Duration::from_secs(2),
            ..WidgetConfig::new(api_url, "demo-agent")
        };
        let session = WidgetSession::new(
            config,
            ToolRegistry::new(),
            Arc::new(LogSynthesizer),
            Arc::new(AlwaysGranted),
            events_tx,
        )
        .unwrap();
        (session, events_rx)
    }

    #[tokio::test]
    async fn test_send_while_closed_reports_not_connected() {
        let (session, mut events) = session("http://127.0.0.1:1", false);
        let (commands_tx, commands_rx) = mpsc::channel(4);
        let task = tokio::spawn(session.run(commands_rx));

        commands_tx
            .send(WidgetCommand::Send("hello".into()))
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            WidgetEvent::Status("Not connected".into())
        );

        drop(commands_tx);
        let transcript = task.await.unwrap();
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn test_microphone_transitions_are_reported() {
        let (session, mut events) = session("http://127.0.0.1:1", false);
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let task = tokio::spawn(session.run(commands_rx));

        let mic = |state, status: &str| WidgetEvent::Microphone {
            state,
            status: status.to_string(),
        };

        commands_tx.send(WidgetCommand::StopRecording("early".into())).await.unwrap();
        commands_tx.send(WidgetCommand::StartRecording).await.unwrap();
        commands_tx.send(WidgetCommand::StartRecording).await.unwrap();
        commands_tx.send(WidgetCommand::StopRecording("hello".into())).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), mic(MicState::Recording, STATUS_LISTENING));
        assert_eq!(events.recv().await.unwrap(), mic(MicState::Processing, STATUS_PROCESSING));
        assert_eq!(events.recv().await.unwrap(), mic(MicState::Idle, STATUS_READY));
        // The recognized text is sent, but the channel is not open.
        assert_eq!(
            events.recv().await.unwrap(),
            WidgetEvent::Status("Not connected".into())
        );

        drop(commands_tx);
        task.await.unwrap();
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_startup_connect_is_not_retried() {
        let (session, mut events) = session("http://127.0.0.1:1", true);
        let (commands_tx, commands_rx) = mpsc::channel(4);
        let task = tokio::spawn(session.run(commands_rx));

        assert_eq!(
            events.recv().await.unwrap(),
            WidgetEvent::State {
                state: ConnectionState::Connecting,
                status: STATUS_CONNECTING.into()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            WidgetEvent::State {
                state: ConnectionState::Closed,
                status: "Connection failed".into()
            }
        );

        drop(commands_tx);
        task.await.unwrap();
        assert!(events.recv().await.is_none());
    }
}
