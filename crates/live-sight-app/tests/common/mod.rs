//! Shared fixtures for app integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use live_sight_app::{LiveSession, SessionSettings};
use live_sight_capture::{CaptureProbe, SyntheticCaptureBackend};
use live_sight_core::OutboundMessage;
use live_sight_stream::{ChannelError, ChannelEvent, Connector, Link};
use tokio::sync::mpsc;
use url::Url;

/// Service side of one loopback connection.
pub struct ServerEnd {
    pub requests: mpsc::UnboundedReceiver<String>,
    pub events: mpsc::UnboundedSender<ChannelEvent>,
}

impl ServerEnd {
    /// Drains every request sent so far.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut sent = Vec::new();
        while let Ok(raw) = self.requests.try_recv() {
            sent.push(OutboundMessage::from_json(&raw).expect("request should be valid JSON"));
        }
        sent
    }

    /// Pushes one inbound text message.
    pub fn reply(&self, raw: &str) {
        self.events
            .send(ChannelEvent::Message(raw.to_string()))
            .expect("session should still hold the link");
    }
}

/// In-memory connector handing out [`ServerEnd`]s to the test.
#[derive(Default)]
pub struct LoopbackConnector {
    refuse: bool,
    servers: Mutex<Vec<ServerEnd>>,
}

impl LoopbackConnector {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn take_server(&self) -> ServerEnd {
        self.servers
            .lock()
            .expect("server list lock should work")
            .pop()
            .expect("a connection should have been made")
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, _endpoint: &Url) -> BoxFuture<'static, Result<Link, ChannelError>> {
        if self.refuse {
            return Box::pin(async { Err(ChannelError::Connect("connection refused".to_string())) });
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.servers
            .lock()
            .expect("server list lock should work")
            .push(ServerEnd {
                requests: outbound_rx,
                events: inbound_tx,
            });
        Box::pin(async move { Ok(Link::new(outbound_tx, inbound_rx)) })
    }
}

/// Session under test plus the handles used to observe it.
pub struct Harness {
    pub session: LiveSession,
    pub probe: Arc<CaptureProbe>,
    pub connector: Arc<LoopbackConnector>,
}

pub fn settings() -> SessionSettings {
    SessionSettings::new(Url::parse("ws://127.0.0.1:8000/ws/live").expect("endpoint should parse"))
}

pub fn harness() -> Harness {
    harness_with(
        settings(),
        SyntheticCaptureBackend::with_resolution(64, 48),
        LoopbackConnector::default(),
    )
}

pub fn harness_with(
    settings: SessionSettings,
    backend: SyntheticCaptureBackend,
    connector: LoopbackConnector,
) -> Harness {
    let probe = backend.probe();
    let connector = Arc::new(connector);
    let session = LiveSession::new(settings, Box::new(backend), connector.clone());
    Harness {
        session,
        probe,
        connector,
    }
}

/// Started session and the service end of its connection.
pub async fn live_harness() -> (Harness, ServerEnd) {
    let mut harness = harness();
    harness.session.start().await.expect("session should start");
    let server = harness.connector.take_server();
    (harness, server)
}
