#![warn(missing_docs)]
//! # live-sight-capture
//!
//! ## Purpose
//! Provides video-device acquisition and still-frame encoding.
//!
//! ## Responsibilities
//! - Define a backend-agnostic capture trait.
//! - Own the single capture session through [`CaptureDeviceManager`].
//! - Expose a real webcam backend (`webcam` feature) and a deterministic
//!   synthetic backend for CI and unit tests.
//! - Downscale and JPEG-encode stills into [`live_sight_core::Frame`] values.
//!
//! ## Data flow
//! Orchestrator acquires a [`CaptureSession`] -> sampler ticks call
//! [`CaptureDeviceManager::grab`] -> [`encode_frame`] produces a frame for the
//! stream channel.
//!
//! ## Ownership and lifetimes
//! The manager owns the backend and the only live session. Callers receive a
//! `Copy` snapshot of the session, so a stale snapshot can never release a newer
//! session.
//!
//! ## Error model
//! Refused acquisition, missing sessions, invalid sampler settings and encode
//! failures are reported as [`CaptureError`] values.
//!
//! ## Privacy notes
//! Stills live only in memory; nothing is written to disk.

mod encode;
#[cfg(feature = "webcam")]
mod webcam;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

pub use encode::{EncodedStill, SamplerConfig, encode_frame, encode_still, scaled_width};
#[cfg(feature = "webcam")]
pub use webcam::WebcamCaptureBackend;

/// Default preferred capture width.
pub const DEFAULT_IDEAL_WIDTH: u32 = 1280;
/// Default preferred capture height.
pub const DEFAULT_IDEAL_HEIGHT: u32 = 720;

/// Resolution hint and device selector passed to [`CaptureDeviceManager::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Preferred frame width in pixels.
    pub ideal_width: u32,
    /// Preferred frame height in pixels.
    pub ideal_height: u32,
    /// Index of the video device to open.
    pub device_index: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: DEFAULT_IDEAL_WIDTH,
            ideal_height: DEFAULT_IDEAL_HEIGHT,
            device_index: 0,
        }
    }
}

/// Opaque backend handle for one opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// What a backend reports after opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedDevice {
    /// Handle used for subsequent grabs and the final close.
    pub handle: DeviceHandle,
    /// Negotiated frame width.
    pub width: u32,
    /// Negotiated frame height.
    pub height: u32,
}

/// Snapshot of the acquired capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSession {
    /// Backend handle.
    pub handle: DeviceHandle,
    /// `false` once the session was released.
    pub active: bool,
    /// Negotiated frame width.
    pub width: u32,
    /// Negotiated frame height.
    pub height: u32,
}

/// Raw RGB still drawn from a capture session.
#[derive(Clone, PartialEq, Eq)]
pub struct StillImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGB bytes (`width * height * 3`).
    pub rgb: Vec<u8>,
}

impl StillImage {
    /// Constructs a validated still.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] when the buffer length does not match
    /// `width * height * 3`.
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| CaptureError::Backend("still dimensions overflow".to_string()))?;
        if expected == 0 || rgb.len() != expected {
            return Err(CaptureError::Backend(format!(
                "invalid still shape: expected {expected} bytes, got {}",
                rgb.len()
            )));
        }

        Ok(Self { width, height, rgb })
    }
}

impl std::fmt::Debug for StillImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StillImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgb_len", &self.rgb.len())
            .finish()
    }
}

/// Trait implemented by concrete video-capture providers.
///
/// Backends are driven from a single event loop and need not be thread-safe.
pub trait CaptureBackend {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Opens the device described by `constraints`.
    ///
    /// # Errors
    /// Returns [`CaptureError::PermissionDenied`] or
    /// [`CaptureError::DeviceUnavailable`] when the device cannot be opened.
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<OpenedDevice, CaptureError>;

    /// Draws the current still from an opened device.
    fn grab(&mut self, handle: DeviceHandle) -> Result<StillImage, CaptureError>;

    /// Stops the device. Must tolerate unknown or already-closed handles.
    fn close(&mut self, handle: DeviceHandle);
}

/// Owns the capture backend and at most one live [`CaptureSession`].
pub struct CaptureDeviceManager {
    backend: Box<dyn CaptureBackend>,
    session: Option<CaptureSession>,
}

impl CaptureDeviceManager {
    /// Wraps a backend; no device is opened until [`Self::acquire`].
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// Backend name for diagnostics.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Opens the video source. No retry is attempted on failure.
    ///
    /// # Errors
    /// Returns [`CaptureError::SessionActive`] while another session is live,
    /// otherwise propagates the backend refusal.
    pub fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureSession, CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::SessionActive);
        }

        let opened = self.backend.open(constraints)?;
        let session = CaptureSession {
            handle: opened.handle,
            active: true,
            width: opened.width,
            height: opened.height,
        };
        self.session = Some(session);
        Ok(session)
    }

    /// Releases `session` if it is still the live one.
    ///
    /// Returns `true` only when a device was actually stopped, so repeated calls
    /// are harmless no-ops.
    pub fn release(&mut self, session: &CaptureSession) -> bool {
        match self.session {
            Some(live) if live.handle == session.handle => self.release_active(),
            _ => false,
        }
    }

    /// Releases whichever session is live. Returns `true` when one was stopped.
    pub fn release_active(&mut self) -> bool {
        match self.session.take() {
            Some(live) => {
                self.backend.close(live.handle);
                true
            }
            None => false,
        }
    }

    /// Returns the live session, if any.
    pub fn active_session(&self) -> Option<CaptureSession> {
        self.session
    }

    /// Draws the current still from `session`.
    ///
    /// # Errors
    /// Returns [`CaptureError::NoActiveSession`] when `session` was released.
    pub fn grab(&mut self, session: &CaptureSession) -> Result<StillImage, CaptureError> {
        match self.session {
            Some(live) if live.handle == session.handle => self.backend.grab(live.handle),
            _ => Err(CaptureError::NoActiveSession),
        }
    }
}

impl Drop for CaptureDeviceManager {
    fn drop(&mut self) {
        self.release_active();
    }
}

/// Failure a [`SyntheticCaptureBackend`] should simulate on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    /// Simulate the operator refusing camera access.
    PermissionDenied,
    /// Simulate a missing or busy device.
    DeviceUnavailable,
}

/// Shared counters observed by tests after handing the backend to a manager.
#[derive(Debug, Default)]
pub struct CaptureProbe {
    opens: AtomicU32,
    grabs: AtomicU32,
    closes: AtomicU32,
}

impl CaptureProbe {
    /// Number of successful opens.
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of successful grabs.
    pub fn grabs(&self) -> u32 {
        self.grabs.load(Ordering::SeqCst)
    }

    /// Number of device closes.
    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Deterministic synthetic backend for test and CI usage.
///
/// Produces a horizontal gradient whose brightness shifts with every grab.
#[derive(Debug)]
pub struct SyntheticCaptureBackend {
    width: u32,
    height: u32,
    failure: Option<SyntheticFailure>,
    grab_limit: Option<u32>,
    next_handle: u64,
    open_handle: Option<DeviceHandle>,
    sequence: u8,
    probe: Arc<CaptureProbe>,
}

impl SyntheticCaptureBackend {
    /// Creates a synthetic 1280x720 device.
    pub fn new() -> Self {
        Self::with_resolution(DEFAULT_IDEAL_WIDTH, DEFAULT_IDEAL_HEIGHT)
    }

    /// Creates a synthetic device with a fixed native resolution.
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            failure: None,
            grab_limit: None,
            next_handle: 1,
            open_handle: None,
            sequence: 0,
            probe: Arc::new(CaptureProbe::default()),
        }
    }

    /// Makes every open fail with `failure`.
    pub fn failing(mut self, failure: SyntheticFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Simulates the device being unplugged after `grabs` successful grabs.
    pub fn unplug_after(mut self, grabs: u32) -> Self {
        self.grab_limit = Some(grabs);
        self
    }

    /// Counter handle that stays valid after the backend is boxed.
    pub fn probe(&self) -> Arc<CaptureProbe> {
        Arc::clone(&self.probe)
    }
}

impl Default for SyntheticCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticCaptureBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&mut self, _constraints: &CaptureConstraints) -> Result<OpenedDevice, CaptureError> {
        match self.failure {
            Some(SyntheticFailure::PermissionDenied) => {
                return Err(CaptureError::PermissionDenied(
                    "synthetic device refused access".to_string(),
                ));
            }
            Some(SyntheticFailure::DeviceUnavailable) => {
                return Err(CaptureError::DeviceUnavailable(
                    "synthetic device is unplugged".to_string(),
                ));
            }
            None => {}
        }
        if self.open_handle.is_some() {
            return Err(CaptureError::DeviceUnavailable(
                "synthetic device is busy".to_string(),
            ));
        }

        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        self.open_handle = Some(handle);
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        Ok(OpenedDevice {
            handle,
            width: self.width,
            height: self.height,
        })
    }

    fn grab(&mut self, handle: DeviceHandle) -> Result<StillImage, CaptureError> {
        if self.open_handle != Some(handle) {
            return Err(CaptureError::NoActiveSession);
        }
        let grabs = self.probe.grabs();
        if self.grab_limit.is_some_and(|limit| grabs >= limit) {
            return Err(CaptureError::DeviceUnavailable(
                "synthetic device was unplugged".to_string(),
            ));
        }

        self.sequence = self.sequence.wrapping_add(1);
        let mut rgb = Vec::with_capacity((self.width as usize) * (self.height as usize) * 3);
        for _row in 0..self.height {
            for column in 0..self.width {
                let shade = ((column * 255) / self.width.max(1)) as u8;
                rgb.extend_from_slice(&[shade, shade.wrapping_add(self.sequence), self.sequence]);
            }
        }
        self.probe.grabs.fetch_add(1, Ordering::SeqCst);
        StillImage::new(self.width, self.height, rgb)
    }

    fn close(&mut self, handle: DeviceHandle) {
        if self.open_handle == Some(handle) {
            self.open_handle = None;
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The operator or OS refused access to the device.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// No usable device could be opened.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// A session is already live; only one may exist at a time.
    #[error("a capture session is already active")]
    SessionActive,
    /// The referenced session was released or never acquired.
    #[error("no active capture session")]
    NoActiveSession,
    /// Sampler settings were rejected.
    #[error("invalid sampler config: {0}")]
    InvalidConfig(String),
    /// Downscale or JPEG encode failed.
    #[error("frame encode failure: {0}")]
    Encode(String),
    /// Backend runtime failure.
    #[error("capture backend failure: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for session ownership rules.

    use super::*;

    fn manager() -> (CaptureDeviceManager, Arc<CaptureProbe>) {
        let backend = SyntheticCaptureBackend::with_resolution(8, 6);
        let probe = backend.probe();
        (CaptureDeviceManager::new(Box::new(backend)), probe)
    }

    #[test]
    fn only_one_session_may_be_live() {
        let (mut manager, _probe) = manager();
        manager
            .acquire(&CaptureConstraints::default())
            .expect("first acquire should work");
        assert!(matches!(
            manager.acquire(&CaptureConstraints::default()),
            Err(CaptureError::SessionActive)
        ));
    }

    #[test]
    fn release_is_idempotent() {
        let (mut manager, probe) = manager();
        let session = manager
            .acquire(&CaptureConstraints::default())
            .expect("acquire should work");

        assert!(manager.release(&session));
        assert!(!manager.release(&session));
        assert!(!manager.release_active());
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn stale_snapshot_cannot_grab_or_release_newer_session() {
        let (mut manager, probe) = manager();
        let old = manager
            .acquire(&CaptureConstraints::default())
            .expect("acquire should work");
        manager.release(&old);
        let new = manager
            .acquire(&CaptureConstraints::default())
            .expect("reacquire should work");

        assert!(matches!(
            manager.grab(&old),
            Err(CaptureError::NoActiveSession)
        ));
        assert!(!manager.release(&old));
        assert!(manager.grab(&new).is_ok());
        assert_eq!(probe.opens(), 2);
    }

    #[test]
    fn dropping_manager_releases_device() {
        let (mut manager, probe) = manager();
        manager
            .acquire(&CaptureConstraints::default())
            .expect("acquire should work");
        drop(manager);
        assert_eq!(probe.closes(), 1);
    }
}
