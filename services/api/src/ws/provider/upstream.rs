//! Handles the WebSocket connection to the upstream voice provider.

use super::UpstreamFrame;
use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{sync::mpsc, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, info};

/// Runs the proxy loop between one widget channel and the upstream provider.
///
/// Widget frames arrive on `rx` and are written upstream unchanged; upstream
/// text frames are pushed onto `tx` unchanged. Returns `Ok` when the widget side
/// goes away, and an error when the upstream side fails, closes, or does not
/// complete the handshake within `connect_timeout`.
pub async fn run(
    url: &str,
    api_key: Option<&str>,
    connect_timeout: Duration,
    mut rx: mpsc::Receiver<UpstreamFrame>,
    tx: mpsc::Sender<String>,
) -> Result<()> {
    let mut request = url.into_client_request()?;
    if let Some(api_key) = api_key {
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {}", api_key).parse()?);
    }

    let (ws_stream, _) = timeout(connect_timeout, connect_async(request))
        .await
        .context("Timed out connecting to upstream voice provider")?
        .context("Failed to connect to upstream voice provider")?;
    let (mut upstream_tx, mut upstream_rx) = ws_stream.split();
    info!("Connected to upstream voice provider.");

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(UpstreamFrame::Text(text)) => upstream_tx.send(WsMessage::Text(text.into())).await?,
                Some(UpstreamFrame::Audio(data)) => upstream_tx.send(WsMessage::Binary(data)).await?,
                None => {
                    let _ = upstream_tx.close().await;
                    debug!("Widget side gone; upstream connection closed.");
                    return Ok(());
                }
            },
            msg = upstream_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    if tx.send(text.to_string()).await.is_err() {
                        return Ok(());
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => bail!("Upstream provider closed the connection"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Upstream provider connection failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_stalled_handshake_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the TCP connection but never answer the upgrade.
        let holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
            drop(stream);
        });

        let (_frames_tx, frames_rx) = mpsc::channel(1);
        let (replies_tx, _replies_rx) = mpsc::channel(1);
        let url = format!("ws://{}/convai", addr);
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run(&url, None, Duration::from_millis(100), frames_rx, replies_tx),
        )
        .await
        .expect("connect timeout did not fire");

        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
        holder.abort();
    }
}
