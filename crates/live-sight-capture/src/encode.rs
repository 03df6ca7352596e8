//! Downscale + JPEG encode of captured stills.

use image::imageops::FilterType;
use image::{ExtendedColorType, RgbImage};
use live_sight_core::Frame;

use crate::{CaptureError, StillImage};

/// Reference sampling cadence.
pub const DEFAULT_INTERVAL_MS: u64 = 2_000;
/// Reference encode height.
pub const DEFAULT_TARGET_HEIGHT: u32 = 480;
/// Reference JPEG quality (0.8 on a 0-1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

const MIN_TARGET_HEIGHT: u32 = 16;

/// Sampling cadence and encode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Milliseconds between capture ticks.
    pub interval_ms: u64,
    /// Height stills are scaled down to before encoding.
    pub target_height: u32,
    /// JPEG quality in `1..=100`.
    pub jpeg_quality: u8,
}

impl SamplerConfig {
    /// Creates validated sampler settings.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidConfig`] for a zero interval, a target
    /// height below 16 px, or a quality outside `1..=100`.
    pub fn new(
        interval_ms: u64,
        target_height: u32,
        jpeg_quality: u8,
    ) -> Result<Self, CaptureError> {
        if interval_ms == 0 {
            return Err(CaptureError::InvalidConfig(
                "interval must be greater than zero".to_string(),
            ));
        }
        if target_height < MIN_TARGET_HEIGHT {
            return Err(CaptureError::InvalidConfig(format!(
                "target height must be at least {MIN_TARGET_HEIGHT}px"
            )));
        }
        if !(1..=100).contains(&jpeg_quality) {
            return Err(CaptureError::InvalidConfig(
                "jpeg quality must be within 1..=100".to_string(),
            ));
        }

        Ok(Self {
            interval_ms,
            target_height,
            jpeg_quality,
        })
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            target_height: DEFAULT_TARGET_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// JPEG bytes plus the geometry they were encoded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedStill {
    /// Encoded width.
    pub width: u32,
    /// Encoded height.
    pub height: u32,
    /// JPEG bytes.
    pub jpeg: Vec<u8>,
}

/// Width that keeps the aspect ratio when scaling `height` to `target_height`.
///
/// Stills never get upscaled: when `height <= target_height` the width is
/// returned unchanged.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    if height <= target_height || height == 0 {
        return width;
    }
    let scaled = (width as u64 * target_height as u64 + height as u64 / 2) / height as u64;
    (scaled as u32).max(1)
}

/// Scales `still` down to `target_height` and encodes it as JPEG.
///
/// # Errors
/// Returns [`CaptureError::Encode`] when the buffer cannot be wrapped or the
/// encoder fails.
pub fn encode_still(
    still: &StillImage,
    target_height: u32,
    jpeg_quality: u8,
) -> Result<EncodedStill, CaptureError> {
    let source = RgbImage::from_raw(still.width, still.height, still.rgb.clone()).ok_or_else(|| {
        CaptureError::Encode(format!(
            "failed to construct RGB image buffer {}x{}",
            still.width, still.height
        ))
    })?;

    let width = scaled_width(still.width, still.height, target_height);
    let height = still.height.min(target_height);
    let scaled = if width == still.width && height == still.height {
        source
    } else {
        image::imageops::resize(&source, width, height, FilterType::Triangle)
    };

    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality)
        .encode(scaled.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|error| CaptureError::Encode(format!("jpeg encoding failed: {error}")))?;

    Ok(EncodedStill {
        width,
        height,
        jpeg,
    })
}

/// Encodes `still` per `config` into an immutable [`Frame`].
///
/// # Errors
/// Propagates encode failures; frame validation errors map to
/// [`CaptureError::Encode`].
pub fn encode_frame(
    still: &StillImage,
    sequence_id: u64,
    captured_at_ms: u64,
    config: &SamplerConfig,
) -> Result<Frame, CaptureError> {
    let encoded = encode_still(still, config.target_height, config.jpeg_quality)?;
    Frame::new(
        sequence_id,
        captured_at_ms,
        encoded.width,
        encoded.height,
        encoded.jpeg,
    )
    .map_err(|error| CaptureError::Encode(error.to_string()))
}
