//! Observable synchronization events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration and input
    ConfigLoaded,
    DesignLoaded,

    // Synchronization lifecycle
    /// State machine moved to a new phase
    SyncPhaseChanged,
    /// Structural validation passed
    SyncValidated,
    /// Document is not newer than the applied version
    SyncSkipped,
    /// Transaction committed
    SyncCommitted,
    /// Transaction rolled back, nothing applied
    SyncRolledBack,
    /// Version marker written after commit
    VersionRecorded,
    /// Schema committed but version marker not written
    SyncPartialApply,

    // Schema changes
    TableCreated,
    ColumnAdded,
    ColumnResized,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DesignLoaded => "DESIGN_LOADED",

            Event::SyncPhaseChanged => "SYNC_PHASE_CHANGED",
            Event::SyncValidated => "SYNC_VALIDATED",
            Event::SyncSkipped => "SYNC_SKIPPED",
            Event::SyncCommitted => "SYNC_COMMITTED",
            Event::SyncRolledBack => "SYNC_ROLLED_BACK",
            Event::VersionRecorded => "VERSION_RECORDED",
            Event::SyncPartialApply => "SYNC_PARTIAL_APPLY",

            Event::TableCreated => "TABLE_CREATED",
            Event::ColumnAdded => "COLUMN_ADDED",
            Event::ColumnResized => "COLUMN_RESIZED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::SyncRolledBack => Severity::Warn,
            Event::SyncPartialApply => Severity::Error,
            Event::SyncPhaseChanged
            | Event::TableCreated
            | Event::ColumnAdded
            | Event::ColumnResized => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
