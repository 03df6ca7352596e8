//! Tests outbound wire message encoding.

use live_sight_core::{AnalysisRequest, Frame, ModeSelection, OutboundMessage};
use serde_json::Value;

#[test]
fn wire_codec_tests_emit_base64_frame_mode_and_seq() {
    let frame = Frame::new(12, 0, 4, 3, b"jpeg".to_vec()).expect("frame should be valid");
    let request = AnalysisRequest::new(frame, ModeSelection::SelfDriving);

    let raw = request.to_json().expect("request should encode");
    let value: Value = serde_json::from_str(&raw).expect("request should be valid JSON");

    assert_eq!(value["frame"], "anBlZw==");
    assert_eq!(value["mode"], "self_driving");
    assert_eq!(value["seq"], 12);
    assert_eq!(value.as_object().map(|object| object.len()), Some(3));
}

#[test]
fn wire_codec_tests_decode_frame_bytes_back() {
    let frame =
        Frame::new(1, 0, 4, 3, vec![0xFF, 0xD8, 0xFF, 0xE0]).expect("frame should be valid");
    let raw = AnalysisRequest::new(frame, ModeSelection::Surveillance)
        .to_json()
        .expect("request should encode");

    let message = OutboundMessage::from_json(&raw).expect("message should parse");
    assert_eq!(message.mode, ModeSelection::Surveillance);
    assert_eq!(
        message.decode_frame().expect("frame should decode"),
        vec![0xFF, 0xD8, 0xFF, 0xE0]
    );
}
