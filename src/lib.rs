//! Lifecycle engine for local Minecraft server instances: verified
//! downloads, loader bootstrap and supervision of the running server.

pub mod bootstrap;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod instance;
pub mod integrity;
pub mod manifests;
pub mod parser;
pub mod server;
pub mod utils;

pub use bootstrap::Bootstrapper;
pub use config::{
    EngineConfig, LoaderType, MinecraftVersion,
    stream::{EventPayload, InstanceEvent, StreamLine, StreamSource},
};
pub use download::{DownloadManager, FetchReport};
pub use error::{
    BootstrapError, DownloadError, InstanceError, IntegrityError, MetadataError, ServerError,
};
pub use instance::{
    ActionOutcome, ConsoleAction, InstanceHandle, InstanceMeta, InstanceStatus, JavaRuntime,
    MetadataStore,
};
pub use parser::{Classification, classify};
pub use server::{InstanceManager, InstanceServer, NewInstance};
