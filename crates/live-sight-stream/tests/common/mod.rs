//! Shared in-memory connector for channel integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use futures_util::future::BoxFuture;
use live_sight_core::{AnalysisRequest, Frame, ModeSelection};
use live_sight_stream::{ChannelError, ChannelEvent, Connector, Link};
use tokio::sync::mpsc;
use url::Url;

/// Service side of one loopback connection.
pub struct ServerEnd {
    pub requests: mpsc::UnboundedReceiver<String>,
    pub events: mpsc::UnboundedSender<ChannelEvent>,
}

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

pub fn endpoint() -> Url {
    Url::parse("ws://127.0.0.1:8000/ws/live").expect("endpoint should parse")
}

pub fn request(seq: u64, mode: ModeSelection) -> AnalysisRequest {
    let frame =
        Frame::new(seq, seq * 2_000, 4, 3, vec![0xFF, 0xD8, 0xFF]).expect("frame should be valid");
    AnalysisRequest::new(frame, mode)
}
