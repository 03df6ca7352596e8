//! Integration tests for reconciling parsed service messages into the display.

use live_sight_analysis_contract::{InboundMessage, parse_inbound};
use live_sight_core::ModeSelection;
use live_sight_ui::{ReconcileOutcome, ResultReconciler};

fn apply(reconciler: &mut ResultReconciler, raw: &str, current: ModeSelection) -> ReconcileOutcome {
    match parse_inbound(raw, Some(current)).expect("message should parse") {
        InboundMessage::Result(result) => reconciler.apply(result, current),
        other => panic!("expected result, got {other:?}"),
    }
}

#[test]
fn result_reconciliation_tests_urgent_person_yields_one_high_urgency_card() {
    let mut reconciler = ResultReconciler::new();
    let outcome = apply(
        &mut reconciler,
        r#"{"mode":"surveillance","seq":1,"detections":[{"label":"person","confidence":0.92,"urgency":true}]}"#,
        ModeSelection::Surveillance,
    );
    assert_eq!(
        outcome,
        ReconcileOutcome::Applied(ModeSelection::Surveillance)
    );

    let panel = reconciler
        .display()
        .surveillance
        .as_ref()
        .expect("surveillance slot should be set");
    assert_eq!(panel.urgent_count, 1);
    assert_eq!(panel.urgent_cards().count(), 1);
    assert_eq!(panel.cards[0].label, "person");
    assert_eq!(panel.cards[0].confidence_pct, 92);
}

#[test]
fn result_reconciliation_tests_self_driving_projection() {
    let mut reconciler = ResultReconciler::new();
    apply(
        &mut reconciler,
        r#"{"mode":"self_driving","instruction":"Stop","left_clear":0.9,"right_clear":0.1,"center_clear":false}"#,
        ModeSelection::SelfDriving,
    );

    let panel = reconciler
        .display()
        .self_driving
        .as_ref()
        .expect("self-driving slot should be set");
    assert_eq!(panel.steering, "Stop");
    assert_eq!(panel.left_pct, 90);
    assert_eq!(panel.right_pct, 10);
    assert!(!panel.center_clear);
    assert!(!panel.road_clear);
}

#[test]
fn result_reconciliation_tests_stale_mode_is_discarded() {
    let mut reconciler = ResultReconciler::new();
    apply(
        &mut reconciler,
        r#"{"mode":"assistive","seq":3,"navigation_spoken":"Path clear"}"#,
        ModeSelection::Assistive,
    );

    let late = match parse_inbound(
        r#"{"mode":"assistive","seq":4,"navigation_spoken":"Turn left"}"#,
        None,
    )
    .expect("message should parse")
    {
        InboundMessage::Result(result) => result,
        other => panic!("expected result, got {other:?}"),
    };
    assert_eq!(
        reconciler.apply(late, ModeSelection::SelfDriving),
        ReconcileOutcome::StaleMode {
            result_mode: ModeSelection::Assistive,
            current_mode: ModeSelection::SelfDriving,
        }
    );
    let panel = reconciler
        .display()
        .assistive
        .as_ref()
        .expect("slot untouched");
    assert_eq!(panel.navigation_spoken, "Path clear");
}

#[test]
fn result_reconciliation_tests_switching_mode_clears_other_slots() {
    let mut reconciler = ResultReconciler::new();
    apply(
        &mut reconciler,
        r#"{"mode":"assistive","seq":1,"navigation_spoken":"Path clear","urgent_alerts":["Car ahead"]}"#,
        ModeSelection::Assistive,
    );
    assert_eq!(
        reconciler.display().active_mode(),
        Some(ModeSelection::Assistive)
    );

    apply(
        &mut reconciler,
        r#"{"mode":"self_driving","seq":2,"instruction":"Move Forward","left_clear":0.7,"right_clear":0.6,"center_clear":true,"summary":"open road","timing_ms":{"total_ms":41.0,"avg_fps":12.0}}"#,
        ModeSelection::SelfDriving,
    );

    let display = reconciler.display();
    assert!(display.assistive.is_none());
    assert!(display.surveillance.is_none());
    assert_eq!(display.active_mode(), Some(ModeSelection::SelfDriving));
    assert_eq!(display.scene_summary.as_deref(), Some("open road"));
    assert_eq!(display.last_applied_seq, Some(2));
    assert_eq!(
        display.status_line(),
        "self_driving: Move Forward (left 70%, right 60%, center clear, road clear) [41 ms, 12.0 fps]"
    );
}
