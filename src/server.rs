pub mod domain;
pub mod registry;

pub use domain::{InstanceManager, InstanceServer, MODS_DIR, NewInstance};
pub use registry::{InstanceLease, LockRegistry};
