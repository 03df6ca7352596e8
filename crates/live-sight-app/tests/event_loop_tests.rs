//! Integration tests for the command-driven event loop.

mod common;

use common::harness;
use live_sight_app::{AnalysisState, Command};
use live_sight_core::ModeSelection;
use live_sight_stream::ConnectionState;
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn event_loop_tests_commands_drive_a_full_session() {
    let mut harness = harness();
    let (commands, mut queue) = mpsc::unbounded_channel();

    commands.send(Command::Start).expect("queue should accept");
    commands
        .send(Command::SetMode(ModeSelection::SelfDriving))
        .expect("queue should accept");
    commands.send(Command::Quit).expect("queue should accept");

    harness.session.run(&mut queue).await;

    assert_eq!(harness.session.state(), &AnalysisState::Idle);
    assert_eq!(harness.session.mode(), ModeSelection::SelfDriving);
    assert_eq!(harness.session.channel_state(), ConnectionState::Closed);
    assert_eq!(harness.probe.opens(), 1);
    assert_eq!(harness.probe.closes(), 1);
}

#[tokio::test]
async fn event_loop_tests_closed_queue_stops_the_session() {
    let mut harness = harness();
    let (commands, mut queue) = mpsc::unbounded_channel();
    commands.send(Command::Start).expect("queue should accept");
    drop(commands);

    harness.session.run(&mut queue).await;

    assert_eq!(harness.session.state(), &AnalysisState::Idle);
    assert_eq!(harness.probe.closes(), 1);
}
