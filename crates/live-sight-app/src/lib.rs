#![warn(missing_docs)]
//! # live-sight-app
//!
//! ## Purpose
//! Orchestrates capture, streaming, mode selection and result reconciliation
//! for one live analysis session.
//!
//! ## Responsibilities
//! - Own the top-level [`AnalysisStateMachine`] and its transitions.
//! - Drive the [`FrameSampler`] cadence with one-request-in-flight
//!   backpressure.
//! - Tag each outgoing request with the mode held by the [`ModeController`].
//! - Feed inbound messages to the reconciler and surface transient notices.
//! - Load [`AppConfig`] and initialise structured logging for the binary.
//!
//! ## Data flow
//! start -> device acquire -> channel connect -> sampler ticks -> capture ->
//! encode -> send -> inbound result -> reconcile -> display status line.
//! stop runs the reverse: cancel timer, close channel, release device.
//!
//! ## Ownership and lifetimes
//! [`LiveSession`] owns every subsystem and is driven from a single
//! current-thread event loop, so no state is shared across threads. Only the
//! WebSocket pump and the stdin reader run as separate tasks, talking to the
//! loop over queues.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`SessionError`]. Failures after start
//! never abort the loop; each one maps to a state transition plus a notice.
//!
//! ## Security and privacy notes
//! - Capture can be disabled with the `LIVE_SIGHT_CAPTURE_ENABLED` kill switch.
//! - Endpoint credentials and query strings are redacted before logging.
//! - Frame bytes are never logged.

mod command;
mod config;
mod logging;
mod mode;
mod sampler;
mod session;
mod state;

use live_sight_analysis_contract::AnalysisContractError;
use live_sight_capture::CaptureError;
use live_sight_stream::ChannelError;
use thiserror::Error;

pub use command::Command;
pub use config::{
    AppConfig, ConfigOverrides, DEFAULT_ENDPOINT, DEFAULT_RESULT_TIMEOUT_MS, ENV_CAPTURE_ENABLED,
    ENV_ENDPOINT, ENV_INTERVAL_MS, ENV_JPEG_QUALITY, ENV_MODE, ENV_RESULT_TIMEOUT_MS,
    ENV_TARGET_HEIGHT,
};
pub use logging::{
    DEFAULT_LOG_FILTER, LOG_FILTER_ENV, init_logging, redact_sensitive, unix_timestamp_ms,
};
pub use mode::ModeController;
pub use sampler::FrameSampler;
pub use session::{
    ChannelOutcome, LiveSession, SessionEvent, SessionSettings, SessionStats, StopReport,
    TickOutcome,
};
pub use state::{AnalysisState, AnalysisStateMachine, Fault, InFlight, LiveActivity};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("LIVE_SIGHT_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Session orchestration error type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `start` while a session is starting, live or stopping.
    #[error("session already active ({state})")]
    AlreadyActive {
        /// State name at the time of the call.
        state: &'static str,
    },
    /// `start` from `Error`; `stop` must run first.
    #[error("session is in error; stop it before starting again")]
    StopRequired,
    /// Capture blocked by the kill switch.
    #[error("capture disabled by LIVE_SIGHT_CAPTURE_ENABLED")]
    CaptureDisabled,
    /// Operation requires a live session.
    #[error("session is not live")]
    NotLive,
    /// On-demand capture while a request is still outstanding.
    #[error("capture already in progress (seq {seq})")]
    CaptureInProgress {
        /// Sequence number of the outstanding request.
        seq: u64,
    },
    /// Capture subsystem error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Stream channel error.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    /// Inbound message could not be interpreted.
    #[error("malformed result: {0}")]
    MalformedResult(#[from] AnalysisContractError),
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Unrecognised operator command.
    #[error("unknown command '{0}'")]
    InvalidCommand(String),
    /// Logging subscriber could not be installed.
    #[error("logging init failure: {0}")]
    Logging(String),
}
