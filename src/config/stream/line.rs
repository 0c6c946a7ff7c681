use std::fmt::{self, Display};

use chrono::{DateTime, Utc};

use crate::{config::LoaderType, parser::Classification, utils};

/// Identifies which process stream produced a line of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
    Event,
}

/// A single line of process output, kept exactly as the server printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    pub line: String,
    pub source: StreamSource,
}

impl StreamLine {
    pub fn new<S: Into<String>>(line: S, source: StreamSource) -> Self {
        Self {
            line: line.into(),
            source,
        }
    }

    pub fn stdout<S: Into<String>>(line: S) -> Self {
        Self::new(line, StreamSource::Stdout)
    }

    pub fn stderr<S: Into<String>>(line: S) -> Self {
        Self::new(line, StreamSource::Stderr)
    }

    pub fn msg(&self) -> String {
        self.line.clone()
    }

    /// The line with color and formatting escapes removed, for rendering.
    pub fn display_text(&self) -> String {
        utils::strip_ansi(&self.line)
    }

    pub fn classify(&self, loader: LoaderType) -> Classification {
        crate::parser::classify(&self.line, loader)
    }

    pub fn extract_timestamp(&self) -> Option<DateTime<Utc>> {
        utils::extract_timestamp(&self.display_text())
    }
}

impl Display for StreamLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line)
    }
}
