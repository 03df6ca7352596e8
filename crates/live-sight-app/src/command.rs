//! Operator commands read from the terminal.

use std::str::FromStr;

use live_sight_core::ModeSelection;

use crate::SessionError;

/// One operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a session.
    Start,
    /// Stop the session.
    Stop,
    /// Select the mode for the next request.
    SetMode(ModeSelection),
    /// Capture one frame now.
    Capture,
    /// Stop and leave the event loop.
    Quit,
}

impl FromStr for Command {
    type Err = SessionError;

    /// Parses `start`, `stop`, `capture`, `quit`/`exit` and `mode <name>`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut words = raw.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let argument = words.next();

        match (verb.as_str(), argument) {
            ("start", None) => Ok(Command::Start),
            ("stop", None) => Ok(Command::Stop),
            ("capture", None) => Ok(Command::Capture),
            ("quit" | "exit", None) => Ok(Command::Quit),
            ("mode", Some(name)) => name
                .parse::<ModeSelection>()
                .map(Command::SetMode)
                .map_err(|_| SessionError::InvalidCommand(raw.trim().to_string())),
            _ => Err(SessionError::InvalidCommand(raw.trim().to_string())),
        }
    }
}
