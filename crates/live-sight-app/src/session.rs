//! Live analysis session orchestrator.

use std::sync::Arc;
use std::time::Duration;

use live_sight_analysis_contract::{InboundMessage, parse_inbound};
use live_sight_capture::{
    CaptureBackend, CaptureConstraints, CaptureDeviceManager, CaptureError, CaptureSession,
    SamplerConfig,
};
use live_sight_core::{AnalysisRequest, ModeSelection};
use live_sight_stream::{
    ChannelError, ChannelEvent, ConnectionState, Connector, StreamChannel, redacted_endpoint,
};
use live_sight_ui::{DisplayState, Notice, NoticeLevel, ReconcileOutcome, ResultReconciler};
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::SessionError;
use crate::command::Command;
use crate::config::DEFAULT_RESULT_TIMEOUT_MS;
use crate::logging::{redact_sensitive, unix_timestamp_ms};
use crate::mode::ModeController;
use crate::sampler::FrameSampler;
use crate::state::{AnalysisState, AnalysisStateMachine, Fault, InFlight, StartRejection};

/// Everything a session needs besides its backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Stream endpoint.
    pub endpoint: Url,
    /// Device selection and resolution hint.
    pub constraints: CaptureConstraints,
    /// Cadence and encode settings.
    pub sampler: SamplerConfig,
    /// How long a request may stay in flight before it is abandoned.
    pub result_timeout: Duration,
    /// Mode selected when the session is created.
    pub initial_mode: ModeSelection,
    /// Kill switch; `false` refuses every start.
    pub capture_enabled: bool,
}

impl SessionSettings {
    /// Reference settings for `endpoint`.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            constraints: CaptureConstraints::default(),
            sampler: SamplerConfig::default(),
            result_timeout: Duration::from_millis(DEFAULT_RESULT_TIMEOUT_MS),
            initial_mode: ModeSelection::default(),
            capture_enabled: true,
        }
    }
}

/// Counters for one session, reset on every successful start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Requests handed to the channel.
    pub frames_sent: u64,
    /// Ticks dropped because a request was in flight.
    pub ticks_skipped: u64,
    /// Frames lost to capture, encode or send failures.
    pub frames_dropped: u64,
    /// Results that reached the display.
    pub results_applied: u64,
    /// Stale-mode or outdated results, and messages that arrived while not live.
    pub results_discarded: u64,
    /// Messages that failed to parse.
    pub malformed_results: u64,
    /// Service-reported errors.
    pub service_errors: u64,
    /// Requests abandoned after the result timeout.
    pub result_timeouts: u64,
}

/// What `stop` actually tore down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// The sampler timer was running.
    pub timer_cancelled: bool,
    /// A live channel connection was closed.
    pub channel_closed: bool,
    /// A capture device was released.
    pub device_released: bool,
}

/// Result of one sampler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A request went out.
    Sent {
        /// Wire sequence number.
        seq: u64,
        /// Mode tag.
        mode: ModeSelection,
    },
    /// Dropped because a request is still in flight.
    Skipped {
        /// Sequence number of the outstanding request.
        in_flight_seq: u64,
    },
    /// The session is not live.
    NotLive,
    /// Capture, encode or send failed; the frame was dropped.
    Dropped,
}

/// Result of one channel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// A result was offered to the reconciler.
    Reconciled(ReconcileOutcome),
    /// The service reported an error for a request.
    ServiceError,
    /// The message was skipped.
    Malformed,
    /// The session is not live; the message was dropped unread.
    NotLive,
    /// The connection went away.
    Lost,
}

/// Something the event loop has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The sampler timer fired.
    Tick,
    /// The channel delivered an event.
    Channel(ChannelEvent),
    /// The in-flight request timed out.
    ResultTimeout,
}

enum LoopEvent {
    Command(Option<Command>),
    Session(SessionEvent),
}

/// One live capture-and-stream session.
///
/// Owns the device manager, channel, sampler, mode and reconciler, and moves
/// the [`AnalysisStateMachine`] through its states. Every method runs on the
/// event loop; nothing here is shared across threads.
pub struct LiveSession {
    settings: SessionSettings,
    devices: CaptureDeviceManager,
    channel: StreamChannel,
    sampler: FrameSampler,
    modes: ModeController,
    machine: AnalysisStateMachine,
    reconciler: ResultReconciler,
    capture: Option<CaptureSession>,
    result_deadline: Option<Instant>,
    stats: SessionStats,
}

impl LiveSession {
    /// Creates an idle session.
    pub fn new(
        settings: SessionSettings,
        backend: Box<dyn CaptureBackend>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            devices: CaptureDeviceManager::new(backend),
            channel: StreamChannel::new(connector),
            sampler: FrameSampler::new(settings.sampler),
            modes: ModeController::new(settings.initial_mode),
            machine: AnalysisStateMachine::new(),
            reconciler: ResultReconciler::new(),
            capture: None,
            result_deadline: None,
            stats: SessionStats::default(),
            settings,
        }
    }

    /// Current state.
    pub fn state(&self) -> &AnalysisState {
        self.machine.state()
    }

    /// Request awaiting its result, if any.
    pub fn in_flight(&self) -> Option<InFlight> {
        self.machine.in_flight()
    }

    /// Merged display state.
    pub fn display(&self) -> &DisplayState {
        self.reconciler.display()
    }

    /// Mode the next request will carry.
    pub fn mode(&self) -> ModeSelection {
        self.modes.current()
    }

    /// Channel lifecycle state.
    pub fn channel_state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Live capture session, if one is held.
    pub fn capture_session(&self) -> Option<CaptureSession> {
        self.capture
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Selects the mode for the next outgoing request. An in-flight request
    /// keeps its tag. Returns `true` when the mode changed.
    pub fn set_mode(&mut self, mode: ModeSelection) -> bool {
        let changed = self.modes.set_mode(mode);
        if changed {
            tracing::info!(stage = "mode", action = "changed", %mode);
            self.reconciler.notify(Notice::info(format!(
                "mode set to {mode}; applies to the next frame"
            )));
        }
        changed
    }

    /// Idle -> Starting -> Live(Waiting).
    ///
    /// The device is acquired first and the channel connected second. A device
    /// refusal returns to `Idle`; a connect failure releases the device and
    /// enters `Error`.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyActive`] or [`SessionError::StopRequired`]
    /// when the state does not allow a start, [`SessionError::CaptureDisabled`]
    /// under the kill switch, and the underlying capture or channel error
    /// otherwise.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.machine
            .begin_start()
            .map_err(|rejection| match rejection {
                StartRejection::AlreadyActive(state) => SessionError::AlreadyActive { state },
                StartRejection::StopRequired => SessionError::StopRequired,
            })?;
        self.reconciler.reset();

        if !self.settings.capture_enabled {
            self.machine.start_refused();
            tracing::warn!(
                stage = "capture",
                action = "start_blocked",
                "kill switch is set"
            );
            self.reconciler
                .notify(Notice::warning("capture is disabled"));
            return Err(SessionError::CaptureDisabled);
        }

        let session = match self.devices.acquire(&self.settings.constraints) {
            Ok(session) => session,
            Err(error) => {
                self.machine.start_refused();
                tracing::error!(stage = "capture", action = "acquire_failed", %error);
                self.reconciler.notify(Notice::error(error.to_string()));
                return Err(error.into());
            }
        };
        tracing::info!(
            stage = "capture",
            action = "acquired",
            backend = self.devices.backend_name(),
            width = session.width,
            height = session.height,
        );

        if let Err(error) = self.channel.connect(&self.settings.endpoint).await {
            self.devices.release(&session);
            let detail = redact_sensitive(&error.to_string());
            self.reconciler.notify(Notice::error(format!(
                "cannot reach analysis service: {detail}"
            )));
            self.machine.fail(Fault::ChannelConnect(detail));
            return Err(error.into());
        }

        self.capture = Some(session);
        self.stats = SessionStats::default();
        self.sampler.start();
        self.machine.start_succeeded();
        tracing::info!(
            stage = "session",
            action = "live",
            endpoint = %redacted_endpoint(&self.settings.endpoint),
            interval_ms = self.settings.sampler.interval_ms,
            mode = %self.modes.current(),
        );
        Ok(())
    }

    /// Handles one sampler tick: capture, encode and send one frame unless a
    /// request is already in flight.
    pub fn on_tick(&mut self) -> TickOutcome {
        if !self.machine.is_live() {
            return TickOutcome::NotLive;
        }
        if let Some(in_flight) = self.machine.in_flight() {
            self.stats.ticks_skipped += 1;
            tracing::info!(
                stage = "capture",
                action = "tick_skipped",
                in_flight_seq = in_flight.seq,
                "previous request is still awaiting its result"
            );
            return TickOutcome::Skipped {
                in_flight_seq: in_flight.seq,
            };
        }

        match self.dispatch_frame() {
            Ok(in_flight) => TickOutcome::Sent {
                seq: in_flight.seq,
                mode: in_flight.mode,
            },
            Err(error) => {
                self.frame_dropped(&error);
                TickOutcome::Dropped
            }
        }
    }

    /// Captures and sends one frame immediately.
    ///
    /// # Errors
    /// Returns [`SessionError::NotLive`] outside `Live`,
    /// [`SessionError::CaptureInProgress`] while a request is outstanding, and
    /// capture or send failures otherwise.
    pub fn capture_once(&mut self) -> Result<u64, SessionError> {
        if !self.machine.is_live() {
            return Err(SessionError::NotLive);
        }
        if let Some(in_flight) = self.machine.in_flight() {
            return Err(SessionError::CaptureInProgress {
                seq: in_flight.seq,
            });
        }

        match self.dispatch_frame() {
            Ok(in_flight) => Ok(in_flight.seq),
            Err(error) => {
                self.frame_dropped(&error);
                Err(error)
            }
        }
    }

    /// Handles one channel event.
    pub fn on_channel_event(&mut self, event: ChannelEvent) -> ChannelOutcome {
        match event {
            ChannelEvent::Message(text) => self.on_message(&text),
            ChannelEvent::Closed => {
                self.channel_lost("connection closed by the service".to_string());
                ChannelOutcome::Lost
            }
            ChannelEvent::Failed(reason) => {
                self.channel_lost(reason);
                ChannelOutcome::Lost
            }
        }
    }

    /// Abandons the in-flight request. Returns it when one was outstanding.
    pub fn on_result_timeout(&mut self) -> Option<InFlight> {
        self.result_deadline = None;
        let in_flight = self.machine.abandon_in_flight()?;
        let timeout_ms = self.settings.result_timeout.as_millis();
        self.stats.result_timeouts += 1;
        tracing::warn!(
            stage = "analysis",
            action = "result_timeout",
            seq = in_flight.seq,
            timeout_ms = timeout_ms as u64,
        );
        self.reconciler.notify(Notice::warning(format!(
            "no result for frame {} within {timeout_ms} ms",
            in_flight.seq
        )));
        Some(in_flight)
    }

    /// Tears the session down from any state: cancel timer, close channel,
    /// release device. Every step is idempotent, so calling it twice releases
    /// nothing the second time.
    pub async fn stop(&mut self) -> StopReport {
        let was_active = self.machine.begin_stop();
        let timer_cancelled = self.sampler.stop();
        self.result_deadline = None;
        let channel_closed = self.channel.close().await;
        let device_released = self
            .capture
            .take()
            .is_some_and(|session| self.devices.release(&session));
        self.machine.finish_stop();

        let report = StopReport {
            timer_cancelled,
            channel_closed,
            device_released,
        };
        if was_active {
            tracing::info!(
                stage = "session",
                action = "stopped",
                channel_closed,
                device_released,
                frames_sent = self.stats.frames_sent,
            );
        }
        report
    }

    /// Waits for the next timer, channel or timeout event. Cancel-safe.
    pub async fn next_event(&mut self) -> SessionEvent {
        let deadline = self.result_deadline;
        tokio::select! {
            biased;
            event = self.channel.next_event() => SessionEvent::Channel(event),
            () = wait_until(deadline) => SessionEvent::ResultTimeout,
            () = self.sampler.tick() => SessionEvent::Tick,
        }
    }

    /// Dispatches an event returned by [`Self::next_event`].
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Tick => {
                self.on_tick();
            }
            SessionEvent::Channel(event) => {
                self.on_channel_event(event);
            }
            SessionEvent::ResultTimeout => {
                self.on_result_timeout();
            }
        }
    }

    /// Applies one operator command. Failures are logged and surfaced as
    /// notices; none of them ends the loop.
    pub async fn execute(&mut self, command: Command) {
        match command {
            Command::Start => {
                if let Err(error) = self.start().await {
                    tracing::warn!(stage = "session", action = "start_failed", %error);
                }
            }
            Command::Stop | Command::Quit => {
                self.stop().await;
            }
            Command::SetMode(mode) => {
                self.set_mode(mode);
            }
            Command::Capture => match self.capture_once() {
                Ok(seq) => tracing::info!(stage = "capture", action = "on_demand", seq),
                Err(error) => {
                    tracing::warn!(stage = "capture", action = "on_demand_rejected", %error);
                    self.reconciler
                        .notify(Notice::warning(format!("capture rejected: {error}")));
                }
            },
        }
    }

    /// Runs the event loop until `Quit` arrives or the command queue closes,
    /// then stops the session.
    pub async fn run(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        loop {
            let next = tokio::select! {
                command = commands.recv() => LoopEvent::Command(command),
                event = self.next_event() => LoopEvent::Session(event),
            };

            match next {
                LoopEvent::Session(event) => self.handle(event),
                LoopEvent::Command(Some(Command::Quit)) | LoopEvent::Command(None) => {
                    self.stop().await;
                    self.flush_notice();
                    return;
                }
                LoopEvent::Command(Some(command)) => self.execute(command).await,
            }
            self.flush_notice();
        }
    }

    fn dispatch_frame(&mut self) -> Result<InFlight, SessionError> {
        let session = self.capture.ok_or(SessionError::NotLive)?;
        if !self.channel.is_open() {
            return Err(ChannelError::ChannelNotOpen {
                state: self.channel.state(),
            }
            .into());
        }

        let frame = self
            .sampler
            .sample(&mut self.devices, &session, unix_timestamp_ms())?;
        let request = AnalysisRequest::new(frame, self.modes.current());
        self.channel.send(&request)?;

        let in_flight = InFlight {
            seq: request.seq(),
            mode: request.mode(),
            sent_at_ms: unix_timestamp_ms(),
        };
        self.machine.request_sent(in_flight);
        self.result_deadline = Some(Instant::now() + self.settings.result_timeout);
        self.stats.frames_sent += 1;
        tracing::info!(
            stage = "channel",
            action = "frame_sent",
            seq = in_flight.seq,
            mode = %in_flight.mode,
            bytes = request.frame().encoded_bytes().len(),
        );
        Ok(in_flight)
    }

    fn frame_dropped(&mut self, error: &SessionError) {
        self.stats.frames_dropped += 1;
        if let SessionError::Capture(
            capture @ (CaptureError::DeviceUnavailable(_) | CaptureError::NoActiveSession),
        ) = error
        {
            self.enter_error(Fault::Device(capture.to_string()));
            return;
        }

        tracing::warn!(stage = "capture", action = "frame_dropped", %error);
        self.reconciler
            .notify(Notice::warning(format!("frame dropped: {error}")));
    }

    fn on_message(&mut self, text: &str) -> ChannelOutcome {
        if !self.machine.is_live() {
            self.stats.results_discarded += 1;
            tracing::debug!(
                stage = "analysis",
                action = "dropped_while_inactive",
                state = self.machine.state().name(),
            );
            return ChannelOutcome::NotLive;
        }

        let fallback = self.machine.in_flight().map(|in_flight| in_flight.mode);
        match parse_inbound(text, fallback) {
            Ok(InboundMessage::Result(result)) => {
                self.acknowledge(result.seq);
                let outcome = self.reconciler.apply(result, self.modes.current());
                match outcome {
                    ReconcileOutcome::Applied(mode) => {
                        self.stats.results_applied += 1;
                        tracing::info!(
                            stage = "display",
                            action = "status",
                            %mode,
                            line = %self.reconciler.display().status_line(),
                        );
                    }
                    ReconcileOutcome::StaleMode {
                        result_mode,
                        current_mode,
                    } => {
                        self.stats.results_discarded += 1;
                        tracing::debug!(
                            stage = "analysis",
                            action = "stale_discarded",
                            %result_mode,
                            %current_mode,
                        );
                    }
                    ReconcileOutcome::Outdated { seq, latest } => {
                        self.stats.results_discarded += 1;
                        tracing::debug!(
                            stage = "analysis",
                            action = "outdated_discarded",
                            seq,
                            latest
                        );
                    }
                }
                ChannelOutcome::Reconciled(outcome)
            }
            Ok(InboundMessage::ServiceError { seq, message }) => {
                self.acknowledge(seq);
                self.stats.service_errors += 1;
                tracing::warn!(stage = "analysis", action = "service_error", ?seq, %message);
                self.reconciler.notify(Notice::warning(format!(
                    "analysis service error: {message}"
                )));
                ChannelOutcome::ServiceError
            }
            Err(error) => {
                let error = SessionError::from(error);
                self.stats.malformed_results += 1;
                tracing::warn!(stage = "analysis", action = "malformed_result", %error);
                self.reconciler
                    .notify(Notice::warning(format!("result skipped: {error}")));
                ChannelOutcome::Malformed
            }
        }
    }

    fn acknowledge(&mut self, seq: Option<u64>) {
        if let Some(in_flight) = self.machine.acknowledge(seq) {
            self.result_deadline = None;
            tracing::debug!(
                stage = "analysis",
                action = "acknowledged",
                seq = in_flight.seq,
                latency_ms = unix_timestamp_ms().saturating_sub(in_flight.sent_at_ms),
            );
        }
    }

    fn channel_lost(&mut self, detail: String) {
        let detail = redact_sensitive(&detail);
        if self.machine.is_live() {
            self.enter_error(Fault::ChannelLost(detail));
        } else {
            tracing::debug!(stage = "channel", action = "lost_while_inactive", %detail);
        }
    }

    fn enter_error(&mut self, fault: Fault) {
        self.sampler.stop();
        self.result_deadline = None;
        self.channel.begin_close();
        if let Some(session) = self.capture.take() {
            self.devices.release(&session);
        }
        tracing::error!(stage = "session", action = "error", %fault);
        self.reconciler
            .notify(Notice::error(format!("{fault}; stop and start to recover")));
        self.machine.fail(fault);
    }

    fn flush_notice(&mut self) {
        let Some(notice) = self.reconciler.take_notice() else {
            return;
        };
        match notice.level {
            NoticeLevel::Info => {
                tracing::info!(stage = "display", action = "notice", text = %notice.text)
            }
            NoticeLevel::Warning => {
                tracing::warn!(stage = "display", action = "notice", text = %notice.text)
            }
            NoticeLevel::Error => {
                tracing::error!(stage = "display", action = "notice", text = %notice.text)
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
