//! Integration tests for runtime kill-switch behavior.

use live_sight_app::{AppConfig, ENV_CAPTURE_ENABLED};

fn capture_enabled() -> bool {
    AppConfig::from_env()
        .expect("config should load")
        .capture_enabled
}

#[test]
fn kill_switch_behavior_tests_disables_capture_when_env_is_false() {
    // Safety:
    // - This test binary has a single test body mutating the environment.
    // - We reset the variable before returning.
    unsafe { std::env::set_var(ENV_CAPTURE_ENABLED, "false") };
    let config = AppConfig::from_env().expect("config should load");
    assert!(!config.capture_enabled);
    assert!(!config.session_settings().capture_enabled);

    // Safety: see rationale above.
    unsafe { std::env::set_var(ENV_CAPTURE_ENABLED, "OFF") };
    assert!(!capture_enabled());

    // Safety: see rationale above.
    unsafe { std::env::set_var(ENV_CAPTURE_ENABLED, "true") };
    assert!(capture_enabled());

    // Safety: see rationale above.
    unsafe { std::env::remove_var(ENV_CAPTURE_ENABLED) };
    assert!(capture_enabled());
}
