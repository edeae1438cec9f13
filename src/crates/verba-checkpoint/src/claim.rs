//! Exclusive thread ownership
//!
//! A [`ThreadClaim`] makes its holder the only writer of a thread until the
//! claim is dropped. [`ClaimRegistry`] tracks claims inside one process; the
//! file saver instead holds an OS lock on a per-thread lock file, which also
//! excludes other processes and is released by the OS if the holder dies.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Exclusive hold on a thread, released on drop
pub struct ThreadClaim {
    thread_id: String,
    _held: Box<dyn Any + Send + Sync>,
}

impl ThreadClaim {
    /// Claim on `thread_id` that lives as long as `held`
    pub fn new(thread_id: impl Into<String>, held: impl Any + Send + Sync) -> Self {
        Self {
            thread_id: thread_id.into(),
            _held: Box::new(held),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl fmt::Debug for ThreadClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadClaim")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

/// In-process set of claimed threads; clones share the set
#[derive(Debug, Clone, Default)]
pub struct ClaimRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `thread_id`, or `None` if a live claim already exists
    pub fn try_claim(&self, thread_id: &str) -> Option<ThreadClaim> {
        if !self.active.lock().insert(thread_id.to_string()) {
            return None;
        }
        let entry = RegistryEntry {
            thread_id: thread_id.to_string(),
            active: self.active.clone(),
        };
        Some(ThreadClaim::new(thread_id, entry))
    }

    pub fn is_claimed(&self, thread_id: &str) -> bool {
        self.active.lock().contains(thread_id)
    }
}

struct RegistryEntry {
    thread_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for RegistryEntry {
    fn drop(&mut self) {
        self.active.lock().remove(&self.thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_refused() {
        let registry = ClaimRegistry::new();
        let claim = registry.try_claim("s-1").unwrap();
        assert_eq!(claim.thread_id(), "s-1");

        assert!(registry.try_claim("s-1").is_none());
        assert!(registry.clone().try_claim("s-1").is_none());

        // Other threads are independent
        assert!(registry.try_claim("s-2").is_some());
    }

    #[test]
    fn test_drop_releases_claim() {
        let registry = ClaimRegistry::new();
        {
            let _claim = registry.try_claim("s-1").unwrap();
            assert!(registry.is_claimed("s-1"));
        }
        assert!(!registry.is_claimed("s-1"));
        assert!(registry.try_claim("s-1").is_some());
    }
}
