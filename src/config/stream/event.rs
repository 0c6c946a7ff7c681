use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::instance::InstanceStatus;

use super::line::{StreamLine, StreamSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    StateChange {
        old: InstanceStatus,
        new: InstanceStatus,
    },

    StdLine {
        line: StreamLine,
    },

    /// A failure marker was seen; the process is being killed.
    StartupFailed {
        line: String,
    },

    Exited {
        code: Option<i32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEvent {
    pub id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub payload: EventPayload,
}

impl InstanceEvent {
    fn now(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn line<S: Into<String>>(line: S, source: StreamSource) -> Self {
        let s_line = StreamLine::new(line, source);
        let timestamp = s_line.extract_timestamp().unwrap_or_else(Utc::now);

        Self {
            id: Uuid::new_v4(),
            timestamp,
            payload: EventPayload::StdLine { line: s_line },
        }
    }

    pub fn state_change(old: InstanceStatus, new: InstanceStatus) -> Self {
        Self::now(EventPayload::StateChange { old, new })
    }

    pub fn startup_failed<S: Into<String>>(line: S) -> Self {
        Self::now(EventPayload::StartupFailed { line: line.into() })
    }

    pub fn exited(code: Option<i32>) -> Self {
        Self::now(EventPayload::Exited { code })
    }

    /// Raw output line carried by this event, if any.
    pub fn std_line(&self) -> Option<&StreamLine> {
        match &self.payload {
            EventPayload::StdLine { line } => Some(line),
            _ => None,
        }
    }
}

impl Display for InstanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = format!(
            "UUID: {}\nTimestamp:{}\nPayload:\n",
            self.id, self.timestamp
        );
        match &self.payload {
            EventPayload::StdLine { line } => writeln!(f, "{}{}", head, line),
            EventPayload::StateChange { old, new } => {
                writeln!(f, "{}State changed: {} -> {}", head, old, new)
            }
            EventPayload::StartupFailed { line } => {
                writeln!(f, "{}Startup failed: {}", head, line)
            }
            EventPayload::Exited { code } => writeln!(f, "{}Exited: {:?}", head, code),
        }
    }
}
