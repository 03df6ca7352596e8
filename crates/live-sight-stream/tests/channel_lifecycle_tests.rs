//! Integration tests for stream channel state transitions.

mod common;

use std::sync::Arc;

use common::{LoopbackConnector, endpoint, request};
use live_sight_core::{ModeSelection, OutboundMessage};
use live_sight_stream::{ChannelError, ChannelEvent, ConnectionState, StreamChannel};

#[tokio::test]
async fn channel_lifecycle_tests_open_send_and_receive_in_order() {
    let connector = Arc::new(LoopbackConnector::default());
    let mut channel = StreamChannel::new(connector.clone());
    assert_eq!(channel.state(), ConnectionState::Idle);

    channel
        .connect(&endpoint())
        .await
        .expect("connect should work");
    assert_eq!(channel.state(), ConnectionState::Open);
    let mut server = connector.take_server();

    channel
        .send(&request(1, ModeSelection::Assistive))
        .expect("send should work while open");
    let sent = server
        .requests
        .try_recv()
        .expect("request should reach the server");
    let message = OutboundMessage::from_json(&sent).expect("request should be valid JSON");
    assert_eq!(message.mode, ModeSelection::Assistive);
    assert_eq!(message.seq, 1);

    server
        .events
        .send(ChannelEvent::Message("first".to_string()))
        .expect("server send should work");
    server
        .events
        .send(ChannelEvent::Message("second".to_string()))
        .expect("server send should work");
    assert_eq!(
        channel.next_event().await,
        ChannelEvent::Message("first".to_string())
    );
    assert_eq!(
        channel.next_event().await,
        ChannelEvent::Message("second".to_string())
    );
}

#[tokio::test]
async fn channel_lifecycle_tests_refuse_sends_while_closing() {
    let connector = Arc::new(LoopbackConnector::default());
    let mut channel = StreamChannel::new(connector.clone());
    channel
        .connect(&endpoint())
        .await
        .expect("connect should work");

    assert!(channel.begin_close());
    assert_eq!(channel.state(), ConnectionState::Closing);
    assert!(matches!(
        channel.send(&request(2, ModeSelection::Surveillance)),
        Err(ChannelError::ChannelNotOpen {
            state: ConnectionState::Closing
        })
    ));

    channel.finish_close().await;
    assert_eq!(channel.state(), ConnectionState::Closed);
    assert!(matches!(
        channel.send(&request(3, ModeSelection::Surveillance)),
        Err(ChannelError::ChannelNotOpen { .. })
    ));
}

#[tokio::test]
async fn channel_lifecycle_tests_close_is_idempotent() {
    let connector = Arc::new(LoopbackConnector::default());
    let mut channel = StreamChannel::new(connector.clone());
    channel
        .connect(&endpoint())
        .await
        .expect("connect should work");
    let mut server = connector.take_server();

    assert!(channel.close().await);
    assert!(!channel.close().await);
    assert_eq!(channel.state(), ConnectionState::Closed);
    // The outbound queue is released, which is the transport's close signal.
    assert!(server.requests.recv().await.is_none());
}

#[tokio::test]
async fn channel_lifecycle_tests_connect_failure_enters_error_without_retry() {
    let mut channel = StreamChannel::new(Arc::new(LoopbackConnector::refusing()));
    assert!(matches!(
        channel.connect(&endpoint()).await,
        Err(ChannelError::Connect(_))
    ));
    assert_eq!(channel.state(), ConnectionState::Error);
    assert!(matches!(
        channel.send(&request(1, ModeSelection::Surveillance)),
        Err(ChannelError::ChannelNotOpen {
            state: ConnectionState::Error
        })
    ));
}

#[tokio::test]
async fn channel_lifecycle_tests_reject_double_connect_and_track_peer_close() {
    let connector = Arc::new(LoopbackConnector::default());
    let mut channel = StreamChannel::new(connector.clone());
    channel
        .connect(&endpoint())
        .await
        .expect("connect should work");
    assert!(matches!(
        channel.connect(&endpoint()).await,
        Err(ChannelError::AlreadyConnected)
    ));

    let server = connector.take_server();
    drop(server);
    assert_eq!(channel.next_event().await, ChannelEvent::Closed);
    assert_eq!(channel.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn channel_lifecycle_tests_transport_failure_enters_error() {
    let connector = Arc::new(LoopbackConnector::default());
    let mut channel = StreamChannel::new(connector.clone());
    channel
        .connect(&endpoint())
        .await
        .expect("connect should work");
    let server = connector.take_server();

    server
        .events
        .send(ChannelEvent::Failed("connection reset".to_string()))
        .expect("server send should work");
    assert_eq!(
        channel.next_event().await,
        ChannelEvent::Failed("connection reset".to_string())
    );
    assert_eq!(channel.state(), ConnectionState::Error);
}
