#![warn(missing_docs)]
//! # live-sight-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `live-sight` workspace.
//!
//! ## Responsibilities
//! - Represent encoded frames produced by the sampler.
//! - Represent the analysis mode selected by the operator.
//! - Encode outbound analysis requests into the wire message format.
//!
//! ## Data flow
//! The sampler emits a [`Frame`], the orchestrator tags it with the active
//! [`ModeSelection`] into an [`AnalysisRequest`], and the stream channel sends
//! [`AnalysisRequest::to_json`] as one text message.
//!
//! ## Ownership and lifetimes
//! A frame owns its encoded buffer and is moved into exactly one request, which
//! is consumed by one send. Nothing borrows frame memory across await points.
//!
//! ## Error model
//! Validation and codec failures return [`CoreError`] variants.
//!
//! ## Privacy notes
//! Frame bytes are never rendered by `Debug`; only their length is shown.
//!
//! ## Example
//! ```rust
//! use live_sight_core::{AnalysisRequest, Frame, ModeSelection};
//!
//! let frame = Frame::new(1, 0, 640, 480, vec![0xFF, 0xD8, 0xFF]).unwrap();
//! let request = AnalysisRequest::new(frame, ModeSelection::Assistive);
//! let json = request.to_json().unwrap();
//! assert!(json.contains("\"mode\":\"assistive\""));
//! ```

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Analysis profile that decides which result shape the service returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSelection {
    /// Object detection with persistence on the service side.
    #[default]
    Surveillance,
    /// Spoken navigation and alerts for visually impaired users.
    Assistive,
    /// Steering instruction derived from free-space estimation.
    SelfDriving,
}

impl ModeSelection {
    /// Every mode, in display order.
    pub const ALL: [ModeSelection; 3] = [
        ModeSelection::Surveillance,
        ModeSelection::Assistive,
        ModeSelection::SelfDriving,
    ];

    /// Wire spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeSelection::Surveillance => "surveillance",
            ModeSelection::Assistive => "assistive",
            ModeSelection::SelfDriving => "self_driving",
        }
    }
}

impl fmt::Display for ModeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeSelection {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        ModeSelection::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownMode(raw.trim().to_string()))
    }
}

/// One encoded still image sampled from the capture session.
///
/// Fields are private: a frame is immutable once produced.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    sequence_id: u64,
    captured_at_ms: u64,
    width: u32,
    target_height: u32,
    encoded: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyFrame`] when `encoded` is empty and
    /// [`CoreError::InvalidGeometry`] when either dimension is zero.
    pub fn new(
        sequence_id: u64,
        captured_at_ms: u64,
        width: u32,
        target_height: u32,
        encoded: Vec<u8>,
    ) -> Result<Self, CoreError> {
        if encoded.is_empty() {
            return Err(CoreError::EmptyFrame);
        }
        if width == 0 || target_height == 0 {
            return Err(CoreError::InvalidGeometry {
                width,
                height: target_height,
            });
        }

        Ok(Self {
            sequence_id,
            captured_at_ms,
            width,
            target_height,
            encoded,
        })
    }

    /// Monotonic sequence number assigned by the sampler.
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Capture time in Unix epoch milliseconds.
    pub fn captured_at_ms(&self) -> u64 {
        self.captured_at_ms
    }

    /// Encoded image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Encoded image height in pixels.
    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    /// Compressed image bytes.
    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence_id", &self.sequence_id)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("width", &self.width)
            .field("target_height", &self.target_height)
            .field("encoded_len", &self.encoded.len())
            .finish()
    }
}

/// The unit sent to the inference service: one frame tagged with one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    frame: Frame,
    mode: ModeSelection,
}

impl AnalysisRequest {
    /// Tags `frame` with the mode that was active when it was sampled.
    pub fn new(frame: Frame, mode: ModeSelection) -> Self {
        Self { frame, mode }
    }

    /// Sequence id of the carried frame.
    pub fn seq(&self) -> u64 {
        self.frame.sequence_id
    }

    /// Mode tag fixed at creation time.
    pub fn mode(&self) -> ModeSelection {
        self.mode
    }

    /// Carried frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Builds the outbound wire message.
    pub fn to_wire(&self) -> OutboundMessage {
        OutboundMessage {
            frame: STANDARD.encode(&self.frame.encoded),
            mode: self.mode,
            seq: self.frame.sequence_id,
        }
    }

    /// Serializes the request to the compact JSON text sent on the channel.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.to_wire()).map_err(CoreError::Codec)
    }
}

/// Outbound message shape: `{"frame": <base64>, "mode": <mode>, "seq": <u64>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Base64 (standard alphabet) compressed image.
    pub frame: String,
    /// Mode the service must analyze the frame under.
    pub mode: ModeSelection,
    /// Correlation number echoed back by the service.
    pub seq: u64,
}

impl OutboundMessage {
    /// Parses an outbound message from JSON text.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when the text is not a valid message.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(CoreError::Codec)
    }

    /// Decodes the base64 frame payload.
    ///
    /// # Errors
    /// Returns [`CoreError::FrameEncoding`] for invalid base64.
    pub fn decode_frame(&self) -> Result<Vec<u8>, CoreError> {
        STANDARD
            .decode(self.frame.as_bytes())
            .map_err(|error| CoreError::FrameEncoding(error.to_string()))
    }
}

/// Error type for core validation and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Encoded frame buffer is empty.
    #[error("frame has no encoded bytes")]
    EmptyFrame,
    /// Frame dimensions must be strictly positive.
    #[error("invalid frame geometry {width}x{height}")]
    InvalidGeometry {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// Mode name is not one of the supported wire spellings.
    #[error("unknown analysis mode '{0}' (expected surveillance, assistive or self_driving)")]
    UnknownMode(String),
    /// Base64 frame payload could not be decoded.
    #[error("frame encoding failure: {0}")]
    FrameEncoding(String),
    /// JSON encoding/decoding error.
    #[error("message codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    //! Unit tests for mode parsing and frame debug output.

    use super::*;

    #[test]
    fn mode_parses_wire_and_dashed_spellings() {
        assert_eq!(
            "self_driving".parse::<ModeSelection>().unwrap(),
            ModeSelection::SelfDriving
        );
        assert_eq!(
            " Self-Driving ".parse::<ModeSelection>().unwrap(),
            ModeSelection::SelfDriving
        );
        assert!(matches!(
            "night_vision".parse::<ModeSelection>(),
            Err(CoreError::UnknownMode(name)) if name == "night_vision"
        ));
    }

    #[test]
    fn frame_debug_hides_encoded_bytes() {
        let frame = Frame::new(7, 10, 2, 2, vec![42; 32]).unwrap();
        let rendered = format!("{frame:?}");
        assert!(rendered.contains("encoded_len: 32"));
        assert!(!rendered.contains("42, 42"));
    }
}
