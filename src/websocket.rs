//! WebSocket sockets for the transport, backed by tokio-tungstenite.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::transport::{SocketCommand, SocketError, SocketEvent, SocketFactory, SocketIo};

/// Opens `ws://` and `wss://` connections.
///
/// Each socket is driven by its own task, which ends when either side
/// closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl SocketFactory for WebSocketFactory {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<SocketIo, SocketError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (stream, response) = connect_async(url.as_str())
                .await
                .map_err(|e| SocketError::new(format!("websocket connect to {} failed: {}", url, e)))?;
            debug!("websocket handshake with {} answered {}", url, response.status());

            let (io, commands, events) = SocketIo::pair();
            tokio::spawn(pump(stream, commands, events));
            Ok(io)
        })
    }
}

async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Send(frame)) => {
                    if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                        let _ = events.send(SocketEvent::Error(SocketError::new(format!(
                            "websocket send error: {}",
                            e
                        ))));
                        break;
                    }
                }
                Some(SocketCommand::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text));
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(WsMessage::Binary(_))) => {
                    warn!("Ignoring binary WebSocket frame (IRC is text-only)");
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => {
                    let _ = events.send(SocketEvent::Error(SocketError::new(format!(
                        "websocket error: {}",
                        e
                    ))));
                    break;
                }
            },
        }
    }
    let _ = events.send(SocketEvent::Close);
}
