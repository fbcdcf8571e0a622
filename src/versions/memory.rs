//! In-memory version store

use std::collections::HashMap;
use std::sync::RwLock;

use crate::design::DesignScope;

use super::{VersionMarker, VersionStore, VersionStoreResult};

/// Version markers held in a map. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    markers: RwLock<HashMap<DesignScope, VersionMarker>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VersionStore for MemoryVersionStore {
    fn get_version(&self, scope: &DesignScope) -> VersionStoreResult<Option<VersionMarker>> {
        let markers = self
            .markers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(markers.get(scope).cloned())
    }

    fn set_version(&self, marker: &VersionMarker) -> VersionStoreResult<()> {
        let mut markers = self
            .markers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        markers.insert(marker.scope.clone(), marker.clone());
        Ok(())
    }
}
