use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VersionError {
    #[error("Incorrect major version: {0}")]
    IncorrectMajor(String),

    #[error("Incorrect minor version: {0}")]
    IncorrectMinor(String),

    #[error("Incorrect patch version: {0}")]
    IncorrectPatch(String),

    #[error("Incorrect snapshot year: {0}")]
    IncorrectYear(String),

    #[error("Incorrect snapshot week: {0}")]
    IncorrectWeek(String),

    #[error("Incorrect snapshot build: {0}")]
    IncorrectBuild(String),

    #[error("Missing major version")]
    MissingMajor,

    #[error("Missing minor version")]
    MissingMinor,

    #[error("Invalid snapshot format")]
    InvalidSnapshotFormat,

    #[error("Too many components")]
    ExtraComponents,

    #[error("Unrecognized version format: {0}")]
    UnknownVersionFormat(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Digest of a downloaded artifact did not match the published one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected sha1 {expected}, got {actual}")]
pub struct IntegrityError {
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed manifest at {url}: {reason}")]
    Manifest { url: String, reason: String },

    #[error("Integrity check failed for {url}: {source}")]
    Integrity {
        url: String,
        source: IntegrityError,
    },

    #[error("File I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to fetch {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Unknown game version: {0}")]
    UnknownVersion(String),

    #[error("No installer published at {0}")]
    NoInstaller(String),
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata file not found: {0:?}")]
    Missing(PathBuf),

    #[error("Corrupt metadata file {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    Serialize(serde_json::Error),

    #[error("Metadata I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Error)]
pub enum HandleError {
    #[error("Invalid server root directory: {0}")]
    InvalidDirectory(String),

    #[error("Invalid relative JAR path: {0}")]
    InvalidPathJAR(String),
}

#[derive(Debug, Clone, Error)]
pub enum ServerError {
    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is not running")]
    NotRunning,

    #[error("Server exited before it was ready (exit code {0:?})")]
    EarlyExit(Option<i32>),

    #[error("Server reported a startup failure")]
    StartupFailed,

    #[error("Failed to run java command: {0}")]
    SpawnFailed(String),

    #[error("Failed to kill server process: {0}")]
    KillFailed(String),

    #[error("Failed to access child stdout pipe")]
    NoStdoutPipe,

    #[error("Failed to access child stdin pipe")]
    NoStdinPipe,

    #[error("Failed to access child stderr pipe")]
    NoStderrPipe,

    #[error("Failed to write to stdin")]
    StdinWriteFailed,

    #[error("Server did not become ready within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Handle(#[from] HandleError),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Instance {0} is already initialized")]
    AlreadyInitialized(String),

    #[error("Failed to spawn java during {step}: {source}")]
    Spawn {
        step: &'static str,
        source: std::io::Error,
    },

    #[error("Loader installer exited with code {0:?}")]
    InstallerFailed(Option<i32>),

    #[error("Expected artifact was not produced: {0:?}")]
    MissingArtifact(PathBuf),

    #[error("License file not found: {0:?}")]
    MissingLicense(PathBuf),

    #[error("Failed to update license file {path:?}: {source}")]
    License {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Server reported a startup failure during the priming launch")]
    PrimingFailed,

    #[error("Server exited during the priming launch (exit code {0:?})")]
    PrimingExited(Option<i32>),

    #[error("Bootstrap step {step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("Invalid instance name: {0:?}")]
    InvalidName(String),

    #[error("Invalid memory size: {0:?}")]
    InvalidMemory(String),

    #[error("Instance already exists: {0}")]
    AlreadyExists(String),

    #[error("Instance not found: {0}")]
    NotFound(String),

    #[error("Instance {0} is in use by another operation")]
    Busy(String),

    #[error("No download source for {0} instances; pass an installer URL")]
    MissingSource(String),

    #[error("Instance I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Handle(#[from] HandleError),
}
