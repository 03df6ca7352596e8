//! Merges asynchronously arriving results into the display.

use live_sight_analysis_contract::{AnalysisResult, ModePayload};
use live_sight_core::ModeSelection;

use crate::{AssistivePanel, DisplayState, Notice, SelfDrivingPanel, SurveillancePanel};

/// What the reconciler did with one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The result now owns the display.
    Applied(ModeSelection),
    /// The result belongs to a mode that is no longer selected.
    StaleMode {
        /// Mode the result was produced for.
        result_mode: ModeSelection,
        /// Mode currently selected.
        current_mode: ModeSelection,
    },
    /// A result with an equal or higher sequence number was already applied
    /// for this mode.
    Outdated {
        /// Sequence number of the rejected result.
        seq: u64,
        /// Highest sequence number applied for the mode.
        latest: u64,
    },
}

impl ReconcileOutcome {
    /// Returns `true` when the display changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}

/// Last-write-wins reconciler guarded by mode tag and sequence number.
#[derive(Debug, Default)]
pub struct ResultReconciler {
    display: DisplayState,
    latest_seq: [Option<u64>; 3],
}

impl ResultReconciler {
    /// Creates a reconciler with an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current display state.
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Highest sequence number applied for `mode`.
    pub fn latest_seq(&self, mode: ModeSelection) -> Option<u64> {
        self.latest_seq[slot_index(mode)]
    }

    /// Applies `result` when it matches `current_mode` and is newer than
    /// anything already applied for that mode.
    ///
    /// Applying a result clears the slots of the other modes. Results without
    /// a sequence number always win.
    pub fn apply(
        &mut self,
        result: AnalysisResult,
        current_mode: ModeSelection,
    ) -> ReconcileOutcome {
        let result_mode = result.mode();
        if result_mode != current_mode {
            return ReconcileOutcome::StaleMode {
                result_mode,
                current_mode,
            };
        }

        let index = slot_index(result_mode);
        if let (Some(seq), Some(latest)) = (result.seq, self.latest_seq[index])
            && seq <= latest
        {
            return ReconcileOutcome::Outdated { seq, latest };
        }
        if let Some(seq) = result.seq {
            self.latest_seq[index] = Some(seq);
        }

        let display = &mut self.display;
        display.surveillance = None;
        display.assistive = None;
        display.self_driving = None;
        match &result.payload {
            ModePayload::Surveillance(surveillance) => {
                display.surveillance = Some(SurveillancePanel::project(
                    surveillance,
                    result.urgent_count,
                    result.object_count,
                ));
            }
            ModePayload::Assistive(assistive) => {
                display.assistive = Some(AssistivePanel::from(assistive));
            }
            ModePayload::SelfDriving(driving) => {
                display.self_driving = Some(SelfDrivingPanel::from(driving));
            }
        }
        display.scene_summary = result.scene_summary;
        display.timing = result.timing;
        display.last_applied_seq = result.seq.or(display.last_applied_seq);

        ReconcileOutcome::Applied(result_mode)
    }

    /// Shows a transient notice.
    pub fn notify(&mut self, notice: Notice) {
        self.display.set_notice(notice);
    }

    /// Removes and returns the transient notice.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.display.take_notice()
    }

    /// Forgets every slot and sequence watermark. Called on session start.
    pub fn reset(&mut self) {
        self.display.clear();
        self.latest_seq = [None; 3];
    }
}

fn slot_index(mode: ModeSelection) -> usize {
    match mode {
        ModeSelection::Surveillance => 0,
        ModeSelection::Assistive => 1,
        ModeSelection::SelfDriving => 2,
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sequence and mode guards.

    use live_sight_analysis_contract::AssistiveResult;

    use super::*;

    fn assistive(seq: Option<u64>, phrase: &str) -> AnalysisResult {
        AnalysisResult {
            seq,
            scene_summary: None,
            timing: None,
            urgent_count: None,
            object_count: None,
            payload: ModePayload::Assistive(AssistiveResult {
                navigation_spoken: phrase.to_string(),
                urgent_alerts: Vec::new(),
                all_alerts: Vec::new(),
            }),
        }
    }

    #[test]
    fn older_sequence_is_outdated() {
        let mut reconciler = ResultReconciler::new();
        assert!(
            reconciler
                .apply(assistive(Some(5), "newer"), ModeSelection::Assistive)
                .is_applied()
        );
        assert_eq!(
            reconciler.apply(assistive(Some(4), "older"), ModeSelection::Assistive),
            ReconcileOutcome::Outdated { seq: 4, latest: 5 }
        );
        let panel = reconciler
            .display()
            .assistive
            .as_ref()
            .expect("slot should be set");
        assert_eq!(panel.navigation_spoken, "newer");
    }

    #[test]
    fn unsequenced_results_are_last_write_wins() {
        let mut reconciler = ResultReconciler::new();
        reconciler.apply(assistive(None, "first"), ModeSelection::Assistive);
        reconciler.apply(assistive(None, "second"), ModeSelection::Assistive);
        let panel = reconciler
            .display()
            .assistive
            .as_ref()
            .expect("slot should be set");
        assert_eq!(panel.navigation_spoken, "second");
    }

    #[test]
    fn reset_clears_watermarks() {
        let mut reconciler = ResultReconciler::new();
        reconciler.apply(assistive(Some(9), "x"), ModeSelection::Assistive);
        reconciler.reset();
        assert_eq!(reconciler.latest_seq(ModeSelection::Assistive), None);
        assert!(
            reconciler
                .apply(assistive(Some(1), "y"), ModeSelection::Assistive)
                .is_applied()
        );
    }
}
