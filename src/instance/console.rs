use std::fmt::{self, Display};

/// Convenience console commands offered to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Stop,
    Ban,
    Pardon,
    Kick,
}

/// What the caller should do with an applied action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Written to the server's stdin.
    Submitted,
    /// Text to place in the operator's input line for completion.
    Prefill(String),
}

impl ConsoleAction {
    pub const ALL: [ConsoleAction; 4] = [
        ConsoleAction::Stop,
        ConsoleAction::Ban,
        ConsoleAction::Pardon,
        ConsoleAction::Kick,
    ];

    pub fn command(&self) -> &'static str {
        match self {
            ConsoleAction::Stop => "stop",
            ConsoleAction::Ban => "ban",
            ConsoleAction::Pardon => "pardon",
            ConsoleAction::Kick => "kick",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConsoleAction::Stop => "Stop server",
            ConsoleAction::Ban => "Ban player",
            ConsoleAction::Pardon => "Pardon player",
            ConsoleAction::Kick => "Kick player",
        }
    }

    /// Only `stop` is sent without the operator confirming it.
    pub fn is_immediate(&self) -> bool {
        matches!(self, ConsoleAction::Stop)
    }

    pub fn prefill(&self) -> String {
        format!("{} ", self.command())
    }
}

impl Display for ConsoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())
    }
}
