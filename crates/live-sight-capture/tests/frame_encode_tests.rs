//! Integration tests for still downscaling and JPEG encoding.

use live_sight_capture::{
    CaptureConstraints, CaptureDeviceManager, SamplerConfig, SyntheticCaptureBackend,
    encode_frame,
};

#[test]
fn frame_encode_tests_scale_hd_still_to_target_height() {
    let mut manager = CaptureDeviceManager::new(Box::new(SyntheticCaptureBackend::new()));
    let session = manager
        .acquire(&CaptureConstraints::default())
        .expect("synthetic acquire should work");
    let still = manager.grab(&session).expect("grab should work");

    let frame = encode_frame(&still, 1, 5_000, &SamplerConfig::default())
        .expect("encode should work");

    assert_eq!(frame.sequence_id(), 1);
    assert_eq!(frame.captured_at_ms(), 5_000);
    assert_eq!(frame.target_height(), 480);
    assert_eq!(frame.width(), 853);
    assert_eq!(&frame.encoded_bytes()[..2], &[0xFF, 0xD8]);
}

#[test]
fn frame_encode_tests_never_upscale_small_stills() {
    let mut manager =
        CaptureDeviceManager::new(Box::new(SyntheticCaptureBackend::with_resolution(64, 48)));
    let session = manager
        .acquire(&CaptureConstraints::default())
        .expect("synthetic acquire should work");
    let still = manager.grab(&session).expect("grab should work");

    let frame = encode_frame(&still, 2, 0, &SamplerConfig::default()).expect("encode should work");
    assert_eq!((frame.width(), frame.target_height()), (64, 48));
}
