use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use crate::config::LoaderType;

#[derive(Debug, Clone)]
pub struct InstanceData {
    pub root_dir: PathBuf,
    /// Relative to `root_dir`.
    pub jar_path: PathBuf,
    pub loader: LoaderType,
    pub max_memory: String,
}

/// In-memory lifecycle of a supervised server process.
///
/// `Idle -> Launching -> Ready -> Terminated`, plus `Launching | Ready -> Idle`
/// when the server reports a startup failure. Every process exit, failed or
/// not, ends in `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceStatus {
    #[default]
    Idle,
    Launching,
    Ready,
    Terminated,
}

impl InstanceStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, InstanceStatus::Launching | InstanceStatus::Ready)
    }
}

impl Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Idle => write!(f, "idle"),
            InstanceStatus::Launching => write!(f, "launching"),
            InstanceStatus::Ready => write!(f, "ready"),
            InstanceStatus::Terminated => write!(f, "terminated"),
        }
    }
}
