#![warn(missing_docs)]
//! # live-sight-analysis-contract
//!
//! ## Purpose
//! Defines the inbound analysis result schema and its mode-tagged model.
//!
//! ## Responsibilities
//! - Parse inbound JSON messages from the inference service.
//! - Attribute each message to an analysis mode (explicit tag, in-flight
//!   request, or mode-specific fields).
//! - Reject results missing the fields their mode requires.
//! - Normalize detections (direction, priority, confidence range).
//!
//! ## Data flow
//! Raw text from the stream channel -> [`parse_inbound`] -> [`InboundMessage`]
//! -> reconciler in `live-sight-ui`.
//!
//! ## Ownership and lifetimes
//! Parsed values own their strings so they can outlive transport buffers.
//!
//! ## Error model
//! Invalid JSON, unknown mode tags and missing mode fields return
//! [`AnalysisContractError`]; all of them classify as malformed results.

use live_sight_core::ModeSelection;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Horizontal zone of a detection in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Left third.
    Left,
    /// Middle third.
    Center,
    /// Right third.
    Right,
}

impl Direction {
    /// Maps the service label; unknown labels fall back to `Center`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Direction::Left,
            "right" => Direction::Right,
            _ => Direction::Center,
        }
    }
}

/// Priority class attached to a detection by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityLevel {
    /// Background objects.
    Minimal,
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
    /// Critical priority (people, riders).
    Critical,
}

impl PriorityLevel {
    /// Maps the service label; unknown labels fall back to `Low`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => PriorityLevel::Critical,
            "high" => PriorityLevel::High,
            "medium" => PriorityLevel::Medium,
            "minimal" => PriorityLevel::Minimal,
            _ => PriorityLevel::Low,
        }
    }
}

/// One recognized object with spatial and priority metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class name.
    pub label: String,
    /// Confidence clamped to `[0.0, 1.0]`.
    pub confidence: f32,
    /// Horizontal zone.
    pub direction: Direction,
    /// Vertical zone label (for example `ground level`).
    pub vertical_zone: String,
    /// Distance category (`Very Close`, `Near`, `Medium`, `Far`, `Unknown`).
    pub distance: String,
    /// Priority class.
    pub priority_level: PriorityLevel,
    /// Requires immediate operator attention.
    pub urgency: bool,
    /// Spoken/printed alert sentence.
    pub alert_text: String,
}

/// Service-side timing summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    /// End-to-end processing time of this frame.
    pub total_ms: Option<f64>,
    /// Rolling average throughput.
    pub avg_fps: Option<f64>,
}

/// Surveillance-mode fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveillanceResult {
    /// Detected objects.
    pub detections: Vec<Detection>,
    /// Free-space navigation hint.
    pub navigation: String,
    /// Free-space fraction in `[0.0, 1.0]`.
    pub safe_ratio: f64,
    /// Whether the service persisted this frame.
    pub stored_in_db: bool,
    /// Persisted record id.
    pub id: Option<String>,
    /// Service timestamp (ISO-8601).
    pub timestamp: Option<String>,
}

/// Assistive-mode fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistiveResult {
    /// Short TTS-friendly navigation phrase.
    pub navigation_spoken: String,
    /// Urgent alert sentences in priority order.
    pub urgent_alerts: Vec<String>,
    /// All alert sentences.
    pub all_alerts: Vec<String>,
}

/// Self-driving-mode fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfDrivingResult {
    /// `Move Forward`, `Turn Left`, `Turn Right` or `Stop`.
    pub instruction: String,
    /// Free fraction of the left half in `[0.0, 1.0]`.
    pub left_clear: f64,
    /// Free fraction of the right half in `[0.0, 1.0]`.
    pub right_clear: f64,
    /// Centre-bottom patch is safe.
    pub center_clear: bool,
    /// Road ahead is clear.
    pub road_clear: bool,
}

/// Mode-specific part of a result.
#[derive(Debug, Clone, PartialEq)]
pub enum ModePayload {
    /// Surveillance shape.
    Surveillance(SurveillanceResult),
    /// Assistive shape.
    Assistive(AssistiveResult),
    /// Self-driving shape.
    SelfDriving(SelfDrivingResult),
}

impl ModePayload {
    /// Mode this payload belongs to.
    pub fn mode(&self) -> ModeSelection {
        match self {
            ModePayload::Surveillance(_) => ModeSelection::Surveillance,
            ModePayload::Assistive(_) => ModeSelection::Assistive,
            ModePayload::SelfDriving(_) => ModeSelection::SelfDriving,
        }
    }
}

/// One mode-tagged analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Echoed request sequence number, when the service provides it.
    pub seq: Option<u64>,
    /// Scene summary (`summary`, falling back to `scene_description`).
    pub scene_summary: Option<String>,
    /// Service timing.
    pub timing: Option<Timing>,
    /// Urgent object count reported by the service.
    pub urgent_count: Option<u32>,
    /// Object count reported by the service.
    pub object_count: Option<u32>,
    /// Mode-specific fields.
    pub payload: ModePayload,
}

impl AnalysisResult {
    /// Mode tag of the result.
    pub fn mode(&self) -> ModeSelection {
        self.payload.mode()
    }
}

/// Anything the service can send on the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A successfully produced result.
    Result(AnalysisResult),
    /// The service reported a processing error for one request.
    ServiceError {
        /// Echoed request sequence number.
        seq: Option<u64>,
        /// Error text from the service.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    mode: Option<String>,
    seq: Option<u64>,
    error: Option<String>,
    detections: Option<Vec<RawDetection>>,
    detected_objects: Option<Vec<RawDetection>>,
    navigation: Option<String>,
    safe_ratio: Option<f64>,
    summary: Option<String>,
    scene_description: Option<String>,
    timing_ms: Option<RawTiming>,
    stored_in_db: Option<bool>,
    id: Option<Value>,
    timestamp: Option<String>,
    navigation_spoken: Option<String>,
    urgent_alerts: Option<Vec<String>>,
    all_alerts: Option<Vec<String>>,
    instruction: Option<String>,
    left_clear: Option<f64>,
    right_clear: Option<f64>,
    center_clear: Option<bool>,
    road_clear: Option<bool>,
    urgent_count: Option<u32>,
    object_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    label: String,
    confidence: Option<f32>,
    direction: Option<String>,
    vertical_zone: Option<String>,
    distance: Option<String>,
    priority_level: Option<String>,
    urgency: Option<bool>,
    alert: Option<String>,
    alert_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTiming {
    total_ms: Option<f64>,
    avg_fps: Option<f64>,
}

/// Parses one inbound message.
///
/// `fallback_mode` is the mode of the request currently in flight; it is used
/// when the message carries no `mode` tag.
///
/// # Errors
/// Returns [`AnalysisContractError::Decode`] for invalid JSON,
/// [`AnalysisContractError::UnknownMode`] for an unsupported tag,
/// [`AnalysisContractError::Unattributable`] when no mode can be determined and
/// [`AnalysisContractError::MissingField`] when the mode's key field is absent.
pub fn parse_inbound(
    raw: &str,
    fallback_mode: Option<ModeSelection>,
) -> Result<InboundMessage, AnalysisContractError> {
    let parsed: RawInbound = serde_json::from_str(raw).map_err(AnalysisContractError::Decode)?;

    if let Some(message) = parsed.error.as_deref().map(str::trim)
        && !message.is_empty()
    {
        return Ok(InboundMessage::ServiceError {
            seq: parsed.seq,
            message: message.to_string(),
        });
    }

    let mode = resolve_mode(&parsed, fallback_mode)?;
    let payload = match mode {
        ModeSelection::Surveillance => ModePayload::Surveillance(surveillance_payload(&parsed)?),
        ModeSelection::Assistive => ModePayload::Assistive(assistive_payload(&parsed)?),
        ModeSelection::SelfDriving => ModePayload::SelfDriving(self_driving_payload(&parsed)?),
    };

    let scene_summary = parsed
        .summary
        .clone()
        .or_else(|| parsed.scene_description.clone())
        .filter(|summary| !summary.trim().is_empty());

    Ok(InboundMessage::Result(AnalysisResult {
        seq: parsed.seq,
        scene_summary,
        timing: parsed.timing_ms.as_ref().map(|timing| Timing {
            total_ms: timing.total_ms,
            avg_fps: timing.avg_fps,
        }),
        urgent_count: parsed.urgent_count,
        object_count: parsed.object_count,
        payload,
    }))
}

/// Counts detections flagged as urgent.
pub fn urgent_detection_count(detections: &[Detection]) -> usize {
    detections
        .iter()
        .filter(|detection| detection.urgency)
        .count()
}

fn resolve_mode(
    parsed: &RawInbound,
    fallback_mode: Option<ModeSelection>,
) -> Result<ModeSelection, AnalysisContractError> {
    if let Some(tag) = parsed.mode.as_deref() {
        return tag
            .parse::<ModeSelection>()
            .map_err(|_| AnalysisContractError::UnknownMode(tag.to_string()));
    }
    if let Some(mode) = fallback_mode {
        return Ok(mode);
    }

    // Untagged and nothing in flight: infer from mode-specific fields.
    if parsed.instruction.is_some() {
        Ok(ModeSelection::SelfDriving)
    } else if parsed.navigation_spoken.is_some()
        || parsed.urgent_alerts.is_some()
        || parsed.all_alerts.is_some()
    {
        Ok(ModeSelection::Assistive)
    } else if parsed.detections.is_some() || parsed.detected_objects.is_some() {
        Ok(ModeSelection::Surveillance)
    } else {
        Err(AnalysisContractError::Unattributable)
    }
}

fn surveillance_payload(parsed: &RawInbound) -> Result<SurveillanceResult, AnalysisContractError> {
    let raw_detections = parsed
        .detections
        .as_ref()
        .or(parsed.detected_objects.as_ref())
        .ok_or(AnalysisContractError::MissingField {
            mode: ModeSelection::Surveillance,
            field: "detections",
        })?;

    Ok(SurveillanceResult {
        detections: raw_detections.iter().map(normalize_detection).collect(),
        navigation: parsed
            .navigation
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        safe_ratio: unit_interval(parsed.safe_ratio.unwrap_or(0.0)),
        stored_in_db: parsed.stored_in_db.unwrap_or(false),
        id: parsed.id.as_ref().and_then(record_id),
        timestamp: parsed.timestamp.clone(),
    })
}

fn assistive_payload(parsed: &RawInbound) -> Result<AssistiveResult, AnalysisContractError> {
    let navigation_spoken =
        parsed
            .navigation_spoken
            .clone()
            .ok_or(AnalysisContractError::MissingField {
                mode: ModeSelection::Assistive,
                field: "navigation_spoken",
            })?;

    Ok(AssistiveResult {
        navigation_spoken,
        urgent_alerts: parsed.urgent_alerts.clone().unwrap_or_default(),
        all_alerts: parsed.all_alerts.clone().unwrap_or_default(),
    })
}

fn self_driving_payload(parsed: &RawInbound) -> Result<SelfDrivingResult, AnalysisContractError> {
    let instruction = parsed
        .instruction
        .clone()
        .ok_or(AnalysisContractError::MissingField {
            mode: ModeSelection::SelfDriving,
            field: "instruction",
        })?;

    // The service derives road_clear from the instruction when it omits it.
    let road_clear = parsed
        .road_clear
        .unwrap_or_else(|| instruction.eq_ignore_ascii_case("move forward"));

    Ok(SelfDrivingResult {
        left_clear: unit_interval(parsed.left_clear.unwrap_or(0.0)),
        right_clear: unit_interval(parsed.right_clear.unwrap_or(0.0)),
        center_clear: parsed.center_clear.unwrap_or(false),
        road_clear,
        instruction,
    })
}

fn normalize_detection(raw: &RawDetection) -> Detection {
    Detection {
        label: raw.label.clone(),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        direction: raw
            .direction
            .as_deref()
            .map(Direction::from_label)
            .unwrap_or(Direction::Center),
        vertical_zone: raw.vertical_zone.clone().unwrap_or_default(),
        distance: raw
            .distance
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        priority_level: raw
            .priority_level
            .as_deref()
            .map(PriorityLevel::from_label)
            .unwrap_or(PriorityLevel::Low),
        urgency: raw.urgency.unwrap_or(false),
        alert_text: raw
            .alert_text
            .clone()
            .or_else(|| raw.alert.clone())
            .unwrap_or_default(),
    }
}

fn unit_interval(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn record_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Analysis contract errors. Every variant is a malformed result.
#[derive(Debug, Error)]
pub enum AnalysisContractError {
    /// JSON decode failure.
    #[error("analysis decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// The `mode` tag is not a supported mode.
    #[error("unknown result mode '{0}'")]
    UnknownMode(String),
    /// No tag, no in-flight request and no mode-specific fields.
    #[error("result cannot be attributed to any analysis mode")]
    Unattributable,
    /// The mode's key field is absent.
    #[error("{mode} result is missing '{field}'")]
    MissingField {
        /// Mode the result was attributed to.
        mode: ModeSelection,
        /// Missing wire field.
        field: &'static str,
    },
}
