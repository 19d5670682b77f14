//! Scan session ids
//!
//! One session is current per scanner. Starting a scan bumps the id; work
//! belonging to an older id checks in at each stage boundary and stops.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, superseding any earlier one
    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, session_id: u64) -> bool {
        self.current.load(Ordering::SeqCst) == session_id
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_session_supersedes() {
        let registry = SessionRegistry::new();
        let first = registry.begin();
        assert!(registry.is_current(first));

        let second = registry.begin();
        assert!(second > first);
        assert!(!registry.is_current(first));
        assert!(registry.is_current(second));
        assert_eq!(registry.current(), second);
    }
}
