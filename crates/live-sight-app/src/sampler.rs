//! Fixed-cadence frame sampling.

use std::time::Duration;

use live_sight_capture::{
    CaptureDeviceManager, CaptureError, CaptureSession, SamplerConfig, encode_frame,
};
use live_sight_core::Frame;
use tokio::time::{Interval, MissedTickBehavior};

/// Fires capture ticks and turns grabbed stills into encoded frames.
///
/// The timer runs independently of outstanding requests; backpressure is the
/// caller's job and is checked at tick time.
#[derive(Debug)]
pub struct FrameSampler {
    config: SamplerConfig,
    timer: Option<Interval>,
    next_seq: u64,
}

impl FrameSampler {
    /// Creates a stopped sampler.
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            timer: None,
            next_seq: 1,
        }
    }

    /// Cadence and encode settings.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Returns `true` while the timer is armed.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Arms the timer. The first tick fires immediately; sequence numbers
    /// restart at 1. Returns `false` when already running.
    pub fn start(&mut self) -> bool {
        if self.timer.is_some() {
            return false;
        }
        let period = Duration::from_millis(self.config.interval_ms.max(1));
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.timer = Some(timer);
        self.next_seq = 1;
        true
    }

    /// Cancels the timer. Returns `true` when a running timer was cancelled.
    pub fn stop(&mut self) -> bool {
        self.timer.take().is_some()
    }

    /// Resolves on the next tick; never resolves while stopped. Cancel-safe.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Sequence number the next frame will carry.
    pub fn peek_sequence(&self) -> u64 {
        self.next_seq
    }

    /// Grabs the current still from `session` and encodes it.
    ///
    /// The sequence number is consumed even when capture fails, so numbers on
    /// the wire stay strictly increasing.
    ///
    /// # Errors
    /// Propagates grab and encode failures.
    pub fn sample(
        &mut self,
        devices: &mut CaptureDeviceManager,
        session: &CaptureSession,
        captured_at_ms: u64,
    ) -> Result<Frame, CaptureError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let still = devices.grab(session)?;
        encode_frame(&still, seq, captured_at_ms, &self.config)
    }
}
