//! Session-wide analysis mode.

use live_sight_core::ModeSelection;

/// Holds the currently selected mode.
///
/// The value is read when a request is built, so a change only affects the
/// next outgoing request. Requests already sent keep their tag.
#[derive(Debug, Default)]
pub struct ModeController {
    current: ModeSelection,
}

impl ModeController {
    /// Creates a controller with `initial` selected.
    pub fn new(initial: ModeSelection) -> Self {
        Self { current: initial }
    }

    /// Currently selected mode.
    pub fn current(&self) -> ModeSelection {
        self.current
    }

    /// Overwrites the selection. Returns `true` when the value changed.
    pub fn set_mode(&mut self, mode: ModeSelection) -> bool {
        let changed = self.current != mode;
        self.current = mode;
        changed
    }
}
