use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};
use url::Url;

use super::{BackendLink, TransportError};
use crate::protocol::{ClientCommand, encode_command};

/// Checks that `raw` is a WebSocket url before any connection attempt.
pub fn parse_backend_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|err| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(TransportError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

/// Connects to the backend and spawns the task pumping frames both ways.
pub async fn connect(url: &Url) -> Result<BackendLink, TransportError> {
    let (ws_stream, _) = connect_async(url.as_str()).await.map_err(Box::new)?;
    debug!(target: "umbrella::transport", url = %url, "websocket connected");

    let (command_tx, command_rx) = mpsc::unbounded_channel::<ClientCommand>();
    let (text_tx, text_rx) = mpsc::unbounded_channel::<String>();
    let task = tokio::spawn(handle_websocket(ws_stream, command_rx, text_tx));

    Ok(BackendLink {
        commands: command_tx,
        inbound: text_rx,
        task: Some(task),
    })
}

async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    text_tx: mpsc::UnboundedSender<String>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            let text = match encode_command(&command) {
                Ok(text) => text,
                Err(err) => {
                    warn!(target: "umbrella::transport", cmd = command.kind(), error = %err, "dropping unencodable command");
                    continue;
                }
            };
            trace!(target: "umbrella::transport", bytes = text.len(), "ws send");
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if text_tx.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => {
                    if text_tx.send(text).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(target: "umbrella::transport", error = %err, "dropping non-utf8 frame")
                }
            },
            Ok(Message::Close(frame)) => {
                debug!(target: "umbrella::transport", ?frame, "backend closed websocket");
                break;
            }
            Err(err) => {
                warn!(target: "umbrella::transport", error = %err, "websocket receive failed");
                break;
            }
            Ok(_) => {}
        }
    }

    send_task.abort();
    let _ = send_task.await;
    debug!(target: "umbrella::transport", "websocket task finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn only_websocket_schemes_are_accepted() {
        assert!(parse_backend_url("ws://127.0.0.1:8765/term").is_ok());
        assert!(parse_backend_url("wss://example.com/term").is_ok());
        assert!(matches!(
            parse_backend_url("http://example.com/"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_backend_url("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
    }
}
