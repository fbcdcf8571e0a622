//! Applied-version tracking
//!
//! A [`VersionMarker`] records the last design version fully applied to a
//! design scope. Markers are absent before the first successful sync and
//! are overwritten only after the schema change they describe has been
//! committed.

mod marker;
mod memory;

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::design::DesignScope;
use crate::version::DesignVersion;

pub use marker::FileVersionStore;
pub use memory::MemoryVersionStore;

/// Result type for version store operations
pub type VersionStoreResult<T> = Result<T, VersionStoreError>;

/// Failures reading or writing version markers.
#[derive(Debug, Error)]
pub enum VersionStoreError {
    #[error("version marker I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("version marker at {path} is malformed: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("version store unavailable: {0}")]
    Unavailable(String),
}

/// Last design version applied to one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub scope: DesignScope,
    pub version: DesignVersion,
    /// Synchronization run that wrote this marker
    pub sync_id: Uuid,
    pub applied_at: DateTime<Utc>,
}

impl VersionMarker {
    pub fn new(scope: DesignScope, version: DesignVersion, sync_id: Uuid) -> Self {
        Self {
            scope,
            version,
            sync_id,
            applied_at: Utc::now(),
        }
    }
}

/// Persists the last-applied version per design scope.
pub trait VersionStore: Send + Sync {
    fn get_version(&self, scope: &DesignScope) -> VersionStoreResult<Option<VersionMarker>>;

    /// Overwrites the scope's marker.
    fn set_version(&self, marker: &VersionMarker) -> VersionStoreResult<()>;
}
