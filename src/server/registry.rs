use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::debug;

/// Names of the instances that are currently opened.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims `name`; `None` when someone else already holds it.
    pub fn try_acquire(&self, name: &str) -> Option<InstanceLease> {
        if !self.held().insert(name.to_string()) {
            return None;
        }
        debug!(instance = name, "instance lock acquired");
        Some(InstanceLease {
            name: name.to_string(),
            registry: self.clone(),
        })
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held().contains(name)
    }
}

/// Exclusive claim on one instance name, released on drop.
#[derive(Debug)]
pub struct InstanceLease {
    name: String,
    registry: LockRegistry,
}

impl InstanceLease {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        self.registry.held().remove(&self.name);
        debug!(instance = %self.name, "instance lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_release() {
        let registry = LockRegistry::new();

        let lease = registry.try_acquire("alpha").unwrap();
        assert_eq!(lease.name(), "alpha");
        assert!(registry.try_acquire("alpha").is_none());
        assert!(registry.try_acquire("beta").is_some());

        drop(lease);
        assert!(!registry.is_held("alpha"));
        assert!(registry.try_acquire("alpha").is_some());
    }
}
