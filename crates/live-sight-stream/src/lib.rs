#![warn(missing_docs)]
//! # live-sight-stream
//!
//! ## Purpose
//! Owns the persistent duplex connection to the inference service.
//!
//! ## Responsibilities
//! - Validate `ws://`/`wss://` endpoints.
//! - Track the [`ConnectionState`] lifecycle.
//! - Send encoded analysis requests and surface inbound messages in transport
//!   arrival order.
//! - Tear the connection down idempotently.
//!
//! ## Data flow
//! [`StreamChannel::connect`] asks a [`Connector`] for a [`Link`] -> the
//! orchestrator calls [`StreamChannel::send`] per sampled frame and awaits
//! [`StreamChannel::next_event`] for results.
//!
//! ## Ownership and lifetimes
//! A [`Link`] is a pair of in-process queues. The production connector bridges
//! them to a WebSocket in a pump task; tests bridge them to assertions.
//!
//! ## Error model
//! [`ChannelError`] distinguishes connect failures (fatal to a session) from
//! send failures (the frame is dropped and sampling continues).
//!
//! ## Reconnection
//! The channel never reconnects on its own. After `Error` or an unexpected
//! `Closed` the operator layer must stop and start a new session.

mod ws;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use live_sight_core::AnalysisRequest;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

pub use ws::WsConnector;

/// How long [`StreamChannel::finish_close`] waits for the transport to flush.
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle of the stream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Ready to send.
    Open,
    /// Teardown in progress; sends are refused.
    Closing,
    /// Closed by either side.
    Closed,
    /// Connect or transport failure.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Event delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One inbound text message.
    Message(String),
    /// The peer closed the connection.
    Closed,
    /// The transport failed.
    Failed(String),
}

/// In-process ends of one established connection.
#[derive(Debug)]
pub struct Link {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Link {
    /// Wraps the queue ends of a connection.
    ///
    /// Dropping the outbound sender is the signal for the transport to close.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound,
            pump: None,
        }
    }

    /// Attaches the task that bridges the queues to the real transport.
    pub fn with_pump(mut self, pump: JoinHandle<()>) -> Self {
        self.pump = Some(pump);
        self
    }
}

/// Factory for connections to the inference service.
pub trait Connector: Send + Sync {
    /// Establishes a connection to `endpoint`.
    fn connect(&self, endpoint: &Url) -> BoxFuture<'static, Result<Link, ChannelError>>;
}

/// Persistent duplex message channel to the inference service.
pub struct StreamChannel {
    connector: Arc<dyn Connector>,
    state: ConnectionState,
    link: Option<Link>,
}

impl StreamChannel {
    /// Creates an idle channel.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            state: ConnectionState::Idle,
            link: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` when sends are accepted.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Idle/Closed/Error -> Connecting -> Open, or -> Error on failure.
    ///
    /// # Errors
    /// Returns [`ChannelError::AlreadyConnected`] unless the channel is idle,
    /// closed or errored; otherwise endpoint validation and connector failures.
    pub async fn connect(&mut self, endpoint: &Url) -> Result<(), ChannelError> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        ) {
            return Err(ChannelError::AlreadyConnected);
        }

        if let Err(error) = validate_stream_endpoint(endpoint.as_str()) {
            self.state = ConnectionState::Error;
            return Err(error);
        }

        self.state = ConnectionState::Connecting;
        tracing::info!(
            stage = "channel",
            action = "connect",
            endpoint = %redacted_endpoint(endpoint),
        );

        match self.connector.connect(endpoint).await {
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Open;
                tracing::info!(stage = "channel", action = "open");
                Ok(())
            }
            Err(error) => {
                self.state = ConnectionState::Error;
                tracing::error!(stage = "channel", action = "connect_failed", %error);
                Err(error)
            }
        }
    }

    /// Queues one request for transmission.
    ///
    /// # Errors
    /// Returns [`ChannelError::ChannelNotOpen`] in any state but `Open`, and
    /// [`ChannelError::Send`] when the transport has already gone away. In both
    /// cases the frame is dropped.
    pub fn send(&mut self, request: &AnalysisRequest) -> Result<(), ChannelError> {
        if self.state != ConnectionState::Open {
            return Err(ChannelError::ChannelNotOpen { state: self.state });
        }
        let outbound = self
            .link
            .as_ref()
            .and_then(|link| link.outbound.as_ref())
            .ok_or(ChannelError::ChannelNotOpen { state: self.state })?;

        let text = request
            .to_json()
            .map_err(|error| ChannelError::Encode(error.to_string()))?;
        outbound.send(text).map_err(|_| {
            ChannelError::Send("transport is no longer accepting messages".to_string())
        })
    }

    /// Waits for the next inbound event.
    ///
    /// Never resolves while no connection exists, so it can sit in a `select!`
    /// next to the sampler timer. Cancel-safe.
    pub async fn next_event(&mut self) -> ChannelEvent {
        let Some(link) = self.link.as_mut() else {
            return std::future::pending().await;
        };

        let event = link.inbound.recv().await.unwrap_or(ChannelEvent::Closed);
        match &event {
            ChannelEvent::Message(_) => {}
            ChannelEvent::Closed => {
                self.link = None;
                self.state = ConnectionState::Closed;
                tracing::warn!(stage = "channel", action = "closed_by_peer");
            }
            ChannelEvent::Failed(reason) => {
                self.link = None;
                self.state = ConnectionState::Error;
                tracing::error!(stage = "channel", action = "transport_failed", reason = %reason);
            }
        }
        event
    }

    /// First teardown phase: refuse further sends and signal the transport.
    ///
    /// Returns `true` when a live connection was found.
    pub fn begin_close(&mut self) -> bool {
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        link.outbound = None;
        self.state = ConnectionState::Closing;
        true
    }

    /// Second teardown phase: wait briefly for the transport, then release it.
    pub async fn finish_close(&mut self) {
        if let Some(link) = self.link.take()
            && let Some(mut pump) = link.pump
            && tokio::time::timeout(CLOSE_GRACE, &mut pump).await.is_err()
        {
            pump.abort();
            tracing::warn!(
                stage = "channel",
                action = "close_timeout",
                "transport aborted"
            );
        }
        if self.state != ConnectionState::Idle {
            self.state = ConnectionState::Closed;
        }
    }

    /// Closes the channel. Idempotent; returns `true` only when a live
    /// connection was released by this call.
    pub async fn close(&mut self) -> bool {
        let released = self.begin_close();
        self.finish_close().await;
        if released {
            tracing::info!(stage = "channel", action = "closed");
        }
        released
    }
}

/// Validates a stream endpoint.
///
/// # Errors
/// Returns [`ChannelError::InvalidEndpoint`] for unparsable URLs, schemes other
/// than `ws`/`wss`, or a missing host.
pub fn validate_stream_endpoint(endpoint: &str) -> Result<Url, ChannelError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| ChannelError::InvalidEndpoint(format!("invalid stream url: {error}")))?;

    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(ChannelError::InvalidEndpoint(
            "stream endpoint must use ws or wss".to_string(),
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ChannelError::InvalidEndpoint(
            "stream endpoint must include a host".to_string(),
        ));
    }

    Ok(parsed)
}

/// Endpoint rendering that is safe to log: credentials, query and fragment
/// are removed.
pub fn redacted_endpoint(endpoint: &Url) -> String {
    let mut safe = endpoint.clone();
    let _ = safe.set_username("");
    let _ = safe.set_password(None);
    safe.set_query(None);
    safe.set_fragment(None);
    safe.to_string()
}

/// Stream channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Endpoint violates the URL policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// `connect` called on a channel that is connecting, open or closing.
    #[error("channel is already connected")]
    AlreadyConnected,
    /// Handshake or connector failure.
    #[error("channel connect failure: {0}")]
    Connect(String),
    /// Send attempted outside `Open`.
    #[error("channel is not open (state {state})")]
    ChannelNotOpen {
        /// State at the time of the send.
        state: ConnectionState,
    },
    /// The transport dropped the message.
    #[error("channel send failure: {0}")]
    Send(String),
    /// Request could not be serialized.
    #[error("request encode failure: {0}")]
    Encode(String),
}
