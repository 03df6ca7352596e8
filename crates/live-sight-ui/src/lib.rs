#![warn(missing_docs)]
//! # live-sight-ui
//!
//! ## Purpose
//! Defines the display-state model that live analysis results are merged into.
//!
//! ## Responsibilities
//! - Hold one display slot per analysis mode.
//! - Project mode-specific results into display-ready panels (percentages,
//!   urgency markers, steering text).
//! - Reconcile asynchronously arriving results against the current mode and
//!   the latest applied sequence number ([`ResultReconciler`]).
//! - Carry one transient operator notice.
//!
//! ## Data flow
//! Parsed results from `live-sight-analysis-contract` -> [`ResultReconciler`]
//! -> [`DisplayState`], which the shell renders as status lines.
//!
//! ## Ownership and lifetimes
//! `DisplayState` owns every string it shows so reducers never borrow
//! transport buffers.
//!
//! ## Error model
//! This crate favors explicit outcomes over errors: stale and outdated results
//! are reported through [`ReconcileOutcome`] and leave the state untouched.
//!
//! ## Privacy notes
//! Display state never holds frame bytes.

mod reconcile;

use live_sight_analysis_contract::{
    AssistiveResult, Detection, Direction, PriorityLevel, SelfDrivingResult, SurveillanceResult,
    Timing, urgent_detection_count,
};
use live_sight_core::ModeSelection;

pub use reconcile::{ReconcileOutcome, ResultReconciler};

/// Converts a `[0.0, 1.0]` fraction into a rounded percentage.
pub fn percent(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// One detection as presented to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionCard {
    /// Class name.
    pub label: String,
    /// Confidence as a rounded percentage.
    pub confidence_pct: u8,
    /// Horizontal zone.
    pub direction: Direction,
    /// Distance category.
    pub distance: String,
    /// Priority class.
    pub priority: PriorityLevel,
    /// Rendered with the high-urgency marker.
    pub high_urgency: bool,
    /// Alert sentence, empty when none.
    pub alert_text: String,
}

impl From<&Detection> for DetectionCard {
    fn from(detection: &Detection) -> Self {
        Self {
            label: detection.label.clone(),
            confidence_pct: percent(f64::from(detection.confidence)),
            direction: detection.direction,
            distance: detection.distance.clone(),
            priority: detection.priority_level,
            high_urgency: detection.urgency,
            alert_text: detection.alert_text.clone(),
        }
    }
}

/// Surveillance slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveillancePanel {
    /// Detection cards in service order.
    pub cards: Vec<DetectionCard>,
    /// Number of high-urgency detections.
    pub urgent_count: usize,
    /// Number of detections.
    pub object_count: usize,
    /// Free-space navigation hint.
    pub navigation: String,
    /// Safe free-space percentage.
    pub safe_pct: u8,
    /// Whether the service persisted the frame.
    pub stored_in_db: bool,
    /// Persisted record id.
    pub record_id: Option<String>,
    /// Service timestamp.
    pub timestamp: Option<String>,
}

impl SurveillancePanel {
    /// Projects a surveillance result. Service-reported counts win over the
    /// locally computed ones.
    pub fn project(
        result: &SurveillanceResult,
        urgent_count: Option<u32>,
        object_count: Option<u32>,
    ) -> Self {
        Self {
            cards: result.detections.iter().map(DetectionCard::from).collect(),
            urgent_count: urgent_count
                .map(|count| count as usize)
                .unwrap_or_else(|| urgent_detection_count(&result.detections)),
            object_count: object_count
                .map(|count| count as usize)
                .unwrap_or(result.detections.len()),
            navigation: result.navigation.clone(),
            safe_pct: percent(result.safe_ratio),
            stored_in_db: result.stored_in_db,
            record_id: result.id.clone(),
            timestamp: result.timestamp.clone(),
        }
    }

    /// Cards flagged high urgency.
    pub fn urgent_cards(&self) -> impl Iterator<Item = &DetectionCard> {
        self.cards.iter().filter(|card| card.high_urgency)
    }
}

/// Assistive slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistivePanel {
    /// Spoken navigation phrase.
    pub navigation_spoken: String,
    /// Urgent alerts.
    pub urgent_alerts: Vec<String>,
    /// All alerts.
    pub all_alerts: Vec<String>,
}

impl From<&AssistiveResult> for AssistivePanel {
    fn from(result: &AssistiveResult) -> Self {
        Self {
            navigation_spoken: result.navigation_spoken.clone(),
            urgent_alerts: result.urgent_alerts.clone(),
            all_alerts: result.all_alerts.clone(),
        }
    }
}

/// Self-driving slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfDrivingPanel {
    /// Steering instruction.
    pub steering: String,
    /// Left-half free space, 0-100.
    pub left_pct: u8,
    /// Right-half free space, 0-100.
    pub right_pct: u8,
    /// Centre patch clear.
    pub center_clear: bool,
    /// Road ahead clear.
    pub road_clear: bool,
}

impl From<&SelfDrivingResult> for SelfDrivingPanel {
    fn from(result: &SelfDrivingResult) -> Self {
        Self {
            steering: result.instruction.clone(),
            left_pct: percent(result.left_clear),
            right_pct: percent(result.right_clear),
            center_clear: result.center_clear,
            road_clear: result.road_clear,
        }
    }
}

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Recoverable problem.
    Warning,
    /// Session-level failure.
    Error,
}

/// Transient operator notice. A new notice replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text shown to the operator.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    /// Error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Merged display state. At most one mode slot is populated at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    /// Surveillance slot.
    pub surveillance: Option<SurveillancePanel>,
    /// Assistive slot.
    pub assistive: Option<AssistivePanel>,
    /// Self-driving slot.
    pub self_driving: Option<SelfDrivingPanel>,
    /// Scene summary of the last applied result.
    pub scene_summary: Option<String>,
    /// Service timing of the last applied result.
    pub timing: Option<Timing>,
    /// Current transient notice.
    pub notice: Option<Notice>,
    /// Sequence number of the last applied result.
    pub last_applied_seq: Option<u64>,
}

impl DisplayState {
    /// Creates an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode whose slot is currently populated.
    pub fn active_mode(&self) -> Option<ModeSelection> {
        if self.surveillance.is_some() {
            Some(ModeSelection::Surveillance)
        } else if self.assistive.is_some() {
            Some(ModeSelection::Assistive)
        } else if self.self_driving.is_some() {
            Some(ModeSelection::SelfDriving)
        } else {
            None
        }
    }

    /// Replaces the transient notice.
    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Removes and returns the transient notice.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Clears every slot and the notice.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// One-line summary of the populated slot.
    pub fn status_line(&self) -> String {
        let mut line = if let Some(panel) = &self.surveillance {
            format!(
                "surveillance: {} object(s), {} urgent, navigation {}, safe {}%",
                panel.object_count, panel.urgent_count, panel.navigation, panel.safe_pct
            )
        } else if let Some(panel) = &self.assistive {
            format!(
                "assistive: \"{}\" ({} urgent alert(s))",
                panel.navigation_spoken,
                panel.urgent_alerts.len()
            )
        } else if let Some(panel) = &self.self_driving {
            format!(
                "self_driving: {} (left {}%, right {}%, center {}, road {})",
                panel.steering,
                panel.left_pct,
                panel.right_pct,
                clear_word(panel.center_clear),
                clear_word(panel.road_clear)
            )
        } else {
            "No analysis yet".to_string()
        };

        if let Some(timing) = self.timing {
            if let Some(total_ms) = timing.total_ms {
                line.push_str(&format!(" [{total_ms:.0} ms"));
                if let Some(avg_fps) = timing.avg_fps {
                    line.push_str(&format!(", {avg_fps:.1} fps"));
                }
                line.push(']');
            }
        }
        line
    }
}

fn clear_word(clear: bool) -> &'static str {
    if clear { "clear" } else { "blocked" }
}
