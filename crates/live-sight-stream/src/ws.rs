//! WebSocket connector: one text frame per message in each direction.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::{ChannelError, ChannelEvent, Connector, Link};

/// Default bound on the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Creates a connector with the default handshake timeout.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Overrides the handshake timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WsConnector {
    fn connect(&self, endpoint: &Url) -> BoxFuture<'static, Result<Link, ChannelError>> {
        let endpoint = endpoint.to_string();
        let connect_timeout = self.connect_timeout;

        Box::pin(async move {
            let (socket, _response) =
                tokio::time::timeout(connect_timeout, connect_async(endpoint.as_str()))
                    .await
                    .map_err(|_| {
                        ChannelError::Connect(format!(
                            "handshake timed out after {}ms",
                            connect_timeout.as_millis()
                        ))
                    })?
                    .map_err(|error| ChannelError::Connect(error.to_string()))?;

            Ok(spawn_pump(socket))
        })
    }
}

fn spawn_pump(socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Link {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChannelEvent>();
    let (mut sink, mut stream) = socket.split();

    let pump = tokio::spawn(async move {
        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    let Some(text) = outgoing else {
                        // Channel side dropped its sender: close politely.
                        let _ = sink.close().await;
                        break;
                    };
                    if let Err(error) = sink.send(Message::text(text)).await {
                        let _ =
                            inbound_tx.send(ChannelEvent::Failed(format!("send failed: {error}")));
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = inbound_tx.send(ChannelEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            let _ = inbound_tx.send(ChannelEvent::Message(text));
                        }
                        Err(_) => {
                            tracing::warn!(
                                stage = "channel",
                                action = "binary_dropped",
                                len = bytes.len(),
                                "non-UTF-8 binary message ignored"
                            );
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = inbound_tx.send(ChannelEvent::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        let _ = inbound_tx.send(ChannelEvent::Failed(error.to_string()));
                        break;
                    }
                },
            }
        }
    });

    Link::new(outbound_tx, inbound_rx).with_pump(pump)
}
