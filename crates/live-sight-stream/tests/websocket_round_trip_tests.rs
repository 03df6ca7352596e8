//! End-to-end test against a local WebSocket server.

mod common;

use std::sync::Arc;

use common::request;
use futures_util::{SinkExt, StreamExt};
use live_sight_core::{ModeSelection, OutboundMessage};
use live_sight_stream::{ChannelEvent, ConnectionState, StreamChannel, WsConnector};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[tokio::test]
async fn websocket_round_trip_tests_echo_sequence_number() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener
        .local_addr()
        .expect("listener should have an address");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("client should connect");
        let mut socket = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake should work");
        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                let request =
                    OutboundMessage::from_json(text.as_str()).expect("request should parse");
                let reply = format!(
                    r#"{{"mode":"{}","seq":{},"navigation_spoken":"Path clear"}}"#,
                    request.mode, request.seq
                );
                socket
                    .send(Message::text(reply))
                    .await
                    .expect("reply should send");
            }
        }
    });

    let endpoint = Url::parse(&format!("ws://{address}/ws/live")).expect("endpoint should parse");
    let mut channel = StreamChannel::new(Arc::new(WsConnector::new()));
    channel
        .connect(&endpoint)
        .await
        .expect("connect should work");

    channel
        .send(&request(7, ModeSelection::Assistive))
        .expect("send should work");
    match channel.next_event().await {
        ChannelEvent::Message(text) => {
            assert!(text.contains(r#""seq":7"#));
            assert!(text.contains("Path clear"));
        }
        other => panic!("expected message, got {other:?}"),
    }

    assert!(channel.close().await);
    assert_eq!(channel.state(), ConnectionState::Closed);
    server.await.expect("server task should finish");
}
