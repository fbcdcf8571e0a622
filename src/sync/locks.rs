//! Per-scope synchronization locks
//!
//! Two synchronizations of the same design scope never overlap; different
//! scopes proceed in parallel. Lock entries are created on first use and
//! kept for the life of the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::design::DesignScope;

#[derive(Debug, Default)]
pub struct SyncLocks {
    scopes: Mutex<HashMap<DesignScope, Arc<Mutex<()>>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock serializing `scope`. Hold its guard for the whole attempt.
    pub fn lock_for(&self, scope: &DesignScope) -> Arc<Mutex<()>> {
        let mut scopes = self
            .scopes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(scopes.entry(scope.clone()).or_default())
    }

    /// Number of scopes seen so far
    pub fn len(&self) -> usize {
        self.scopes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
