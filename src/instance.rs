mod console;
mod handle;
mod launch;
mod meta;
mod types;

pub use console::{ActionOutcome, ConsoleAction};
pub use handle::{InstanceHandle, ReadyWatch, wait_for_ready};
pub use launch::JavaRuntime;
pub use meta::{InstanceMeta, META_FILE, MetadataStore};
pub use types::{InstanceData, InstanceStatus};
