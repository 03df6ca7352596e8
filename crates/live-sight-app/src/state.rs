//! Top-level analysis state owner.

use std::fmt;

use live_sight_core::ModeSelection;

/// Request currently awaiting its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    /// Sequence number sent on the wire.
    pub seq: u64,
    /// Mode the request was tagged with.
    pub mode: ModeSelection,
    /// Send time, unix milliseconds.
    pub sent_at_ms: u64,
}

/// Substate of `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveActivity {
    /// Ready to send the next frame.
    Waiting,
    /// One request is outstanding.
    Analyzing(InFlight),
}

/// Failure that put the session into `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The channel could not be opened.
    ChannelConnect(String),
    /// The channel closed or failed while live.
    ChannelLost(String),
    /// The capture device failed while live.
    Device(String),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::ChannelConnect(detail) => write!(f, "channel connect failed: {detail}"),
            Fault::ChannelLost(detail) => write!(f, "channel lost: {detail}"),
            Fault::Device(detail) => write!(f, "capture device failed: {detail}"),
        }
    }
}

/// Session lifecycle as one tagged union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    /// Nothing acquired.
    Idle,
    /// Acquiring the device and connecting the channel.
    Starting,
    /// Streaming.
    Live(LiveActivity),
    /// Teardown in progress.
    Stopping,
    /// Terminal until `stop`.
    Error(Fault),
}

impl AnalysisState {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Starting => "starting",
            AnalysisState::Live(LiveActivity::Waiting) => "live/waiting",
            AnalysisState::Live(LiveActivity::Analyzing(_)) => "live/analyzing",
            AnalysisState::Stopping => "stopping",
            AnalysisState::Error(_) => "error",
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a start request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartRejection {
    AlreadyActive(&'static str),
    StopRequired,
}

/// Guards every transition of [`AnalysisState`].
///
/// Transitions that do not apply to the current state are ignored and
/// reported through the return value instead of panicking.
#[derive(Debug)]
pub struct AnalysisStateMachine {
    state: AnalysisState,
}

impl Default for AnalysisStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisStateMachine {
    /// Creates an idle machine.
    pub fn new() -> Self {
        Self {
            state: AnalysisState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    /// Returns `true` in either `Live` substate.
    pub fn is_live(&self) -> bool {
        matches!(self.state, AnalysisState::Live(_))
    }

    /// Request awaiting its result, if any.
    pub fn in_flight(&self) -> Option<InFlight> {
        match self.state {
            AnalysisState::Live(LiveActivity::Analyzing(in_flight)) => Some(in_flight),
            _ => None,
        }
    }

    /// Idle -> Starting.
    pub(crate) fn begin_start(&mut self) -> Result<(), StartRejection> {
        match &self.state {
            AnalysisState::Idle => {
                self.state = AnalysisState::Starting;
                Ok(())
            }
            AnalysisState::Error(_) => Err(StartRejection::StopRequired),
            other => Err(StartRejection::AlreadyActive(other.name())),
        }
    }

    /// Starting -> Idle, used when the device refuses acquisition.
    pub(crate) fn start_refused(&mut self) {
        if self.state == AnalysisState::Starting {
            self.state = AnalysisState::Idle;
        }
    }

    /// Starting -> Live(Waiting).
    pub(crate) fn start_succeeded(&mut self) {
        if self.state == AnalysisState::Starting {
            self.state = AnalysisState::Live(LiveActivity::Waiting);
        }
    }

    /// Live(Waiting) -> Live(Analyzing). Returns `false` in any other state.
    pub(crate) fn request_sent(&mut self, in_flight: InFlight) -> bool {
        if self.state == AnalysisState::Live(LiveActivity::Waiting) {
            self.state = AnalysisState::Live(LiveActivity::Analyzing(in_flight));
            return true;
        }
        false
    }

    /// Live(Analyzing) -> Live(Waiting) when `seq` answers the in-flight
    /// request. An unsequenced reply answers whatever is in flight; a reply
    /// older than the in-flight request does not.
    pub(crate) fn acknowledge(&mut self, seq: Option<u64>) -> Option<InFlight> {
        let in_flight = self.in_flight()?;
        if seq.is_some_and(|seq| seq < in_flight.seq) {
            return None;
        }
        self.state = AnalysisState::Live(LiveActivity::Waiting);
        Some(in_flight)
    }

    /// Live(Analyzing) -> Live(Waiting) without a reply.
    pub(crate) fn abandon_in_flight(&mut self) -> Option<InFlight> {
        let in_flight = self.in_flight()?;
        self.state = AnalysisState::Live(LiveActivity::Waiting);
        Some(in_flight)
    }

    /// Starting | Live -> Error. Returns `false` in any other state.
    pub(crate) fn fail(&mut self, fault: Fault) -> bool {
        if matches!(self.state, AnalysisState::Starting | AnalysisState::Live(_)) {
            self.state = AnalysisState::Error(fault);
            return true;
        }
        false
    }

    /// Any non-idle state -> Stopping. Returns `false` when already idle.
    pub(crate) fn begin_stop(&mut self) -> bool {
        if self.state == AnalysisState::Idle {
            return false;
        }
        self.state = AnalysisState::Stopping;
        true
    }

    /// Stopping -> Idle.
    pub(crate) fn finish_stop(&mut self) {
        self.state = AnalysisState::Idle;
    }
}
