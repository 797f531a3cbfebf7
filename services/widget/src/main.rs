//! Terminal host for the voice widget.
//!
//! Stdin lines are typed utterances. Commands:
//! `/connect`, `/close`, `/record` (talk button down), `/stop <text>` (talk
//! button up; the recognizer heard `<text>`), `/talk <text>` (both at once),
//! `/quit`.

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Level, info};
use voicewidget_client::{
    Position, WidgetCommand, WidgetConfig, WidgetEvent, WidgetSession,
    config::{DEFAULT_AGENT_ID, DEFAULT_API_URL},
    microphone::{AlwaysGranted, PermissionGate},
    speech::LogSynthesizer,
    transcript::Sender,
};

mod demo_tools;

#[derive(Parser, Debug)]
#[clap(name = "voice-widget", version, about = "Terminal host for the voice widget")]
struct Cli {
    #[clap(long, env = "VOICE_WIDGET_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[clap(long, env = "VOICE_WIDGET_AGENT_ID", default_value = DEFAULT_AGENT_ID)]
    agent_id: String,

    #[clap(long, env = "VOICE_WIDGET_POSITION", default_value = "bottom-right")]
    position: Position,

    #[clap(long, help = "Wait for /connect instead of connecting at startup")]
    no_auto_connect: bool,

    #[clap(long, help = "Refuse microphone access for every /talk")]
    deny_microphone: bool,

    #[clap(long, env = "RUST_LOG", default_value = "info")]
    log_level: Level,
}

struct DenyMicrophone;

#[async_trait]
impl PermissionGate for DenyMicrophone {
    async fn request_microphone(&self) -> bool {
        false
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Commands(Vec<WidgetCommand>),
    Quit,
    Help,
    Nothing,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line.split_once(' ').unwrap_or((line, "")) {
        ("", _) => Input::Nothing,
        ("/connect", _) => Input::Commands(vec![WidgetCommand::Connect]),
        ("/close", _) => Input::Commands(vec![WidgetCommand::Close]),
        ("/quit", _) => Input::Quit,
        ("/record", _) => Input::Commands(vec![WidgetCommand::StartRecording]),
        ("/stop", text) => Input::Commands(vec![WidgetCommand::StopRecording(text.to_string())]),
        ("/talk", text) => Input::Commands(vec![
            WidgetCommand::StartRecording,
            WidgetCommand::StopRecording(text.to_string()),
        ]),
        (word, _) if word.starts_with('/') => Input::Help,
        _ => Input::Commands(vec![WidgetCommand::Send(line.to_string())]),
    }
}

fn print_event(event: WidgetEvent) {
    match event {
        WidgetEvent::State { state, status } => println!("[{:?}] {}", state, status),
        WidgetEvent::Status(status) => println!("[status] {}", status),
        WidgetEvent::Microphone { state, status } => println!("[mic {:?}] {}", state, status),
        WidgetEvent::Message(line) => match line.sender {
            Sender::User => println!("you:   {}", line.text),
            Sender::Agent => println!("agent: {}", line.text),
        },
        WidgetEvent::ToolCalled { name, is_error } => {
            println!("[tool] {}{}", name, if is_error { " (failed)" } else { "" })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let config = WidgetConfig {
        position: cli.position,
        auto_connect: !cli.no_auto_connect,
        ..WidgetConfig::new(cli.api_url, cli.agent_id)
    };
    info!(
        api_url = %config.api_url,
        agent_id = %config.agent_id,
        position = %config.position,
        "Starting voice widget"
    );

    let permissions: Arc<dyn PermissionGate> = if cli.deny_microphone {
        Arc::new(DenyMicrophone)
    } else {
        Arc::new(AlwaysGranted)
    };
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let (commands_tx, commands_rx) = mpsc::channel(16);
    let session = WidgetSession::new(
        config,
        demo_tools::registry(),
        Arc::new(LogSynthesizer),
        permissions,
        events_tx,
    )
    .context("Failed to create widget session")?;

    let session_task = tokio::spawn(session.run(commands_rx));
    let printer_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    'input: while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_input(&line) {
            Input::Commands(commands) => {
                for command in commands {
                    if commands_tx.send(command).await.is_err() {
                        break 'input;
                    }
                }
            }
            Input::Quit => break,
            Input::Help => {
                println!("commands: /connect, /close, /record, /stop <text>, /talk <text>, /quit")
            }
            Input::Nothing => {}
        }
    }

    drop(commands_tx);
    let transcript = session_task.await.context("Widget session panicked")?;
    printer_task.await.context("Event printer panicked")?;
    info!(messages = transcript.len(), "Conversation ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  "), Input::Nothing);
        assert_eq!(parse_input("/connect"), Input::Commands(vec![WidgetCommand::Connect]));
        assert_eq!(parse_input("/close"), Input::Commands(vec![WidgetCommand::Close]));
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(
            parse_input("/record"),
            Input::Commands(vec![WidgetCommand::StartRecording])
        );
        assert_eq!(
            parse_input("/stop lights off"),
            Input::Commands(vec![WidgetCommand::StopRecording("lights off".into())])
        );
        assert_eq!(
            parse_input("/talk dim the screen"),
            Input::Commands(vec![
                WidgetCommand::StartRecording,
                WidgetCommand::StopRecording("dim the screen".into()),
            ])
        );
        assert_eq!(parse_input("/volume up"), Input::Help);
        assert_eq!(
            parse_input("hello there"),
            Input::Commands(vec![WidgetCommand::Send("hello there".into())])
        );
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["voice-widget", "--log-level", "info"]).unwrap();
        assert_eq!(cli.position, Position::BottomRight);
        assert!(!cli.no_auto_connect);
    }
}
