//! Webcam backend built on `nokhwa`.

use std::collections::HashMap;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Camera, NokhwaError};

use crate::{
    CaptureBackend, CaptureConstraints, CaptureError, DeviceHandle, OpenedDevice, StillImage,
};

const REQUESTED_FPS: u32 = 30;

/// Real camera backend. Each open negotiates the format closest to the
/// requested resolution and starts the device stream.
#[derive(Default)]
pub struct WebcamCaptureBackend {
    cameras: HashMap<DeviceHandle, Camera>,
    next_handle: u64,
}

impl WebcamCaptureBackend {
    /// Creates a backend with no open devices.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for WebcamCaptureBackend {
    fn name(&self) -> &'static str {
        "webcam"
    }

    fn open(&mut self, constraints: &CaptureConstraints) -> Result<OpenedDevice, CaptureError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(constraints.ideal_width, constraints.ideal_height),
                FrameFormat::MJPEG,
                REQUESTED_FPS,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(constraints.device_index), requested)
            .map_err(classify_open_error)?;
        camera.open_stream().map_err(classify_open_error)?;

        let resolution = camera.resolution();
        self.next_handle += 1;
        let handle = DeviceHandle(self.next_handle);
        self.cameras.insert(handle, camera);

        Ok(OpenedDevice {
            handle,
            width: resolution.width(),
            height: resolution.height(),
        })
    }

    fn grab(&mut self, handle: DeviceHandle) -> Result<StillImage, CaptureError> {
        let camera = self
            .cameras
            .get_mut(&handle)
            .ok_or(CaptureError::NoActiveSession)?;

        let buffer = camera
            .frame()
            .map_err(|error| CaptureError::Backend(format!("frame read failed: {error}")))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|error| CaptureError::Backend(format!("frame decode failed: {error}")))?;

        let (width, height) = (decoded.width(), decoded.height());
        StillImage::new(width, height, decoded.into_raw())
    }

    fn close(&mut self, handle: DeviceHandle) {
        if let Some(mut camera) = self.cameras.remove(&handle) {
            let _ = camera.stop_stream();
        }
    }
}

fn classify_open_error(error: NokhwaError) -> CaptureError {
    let message = error.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}
