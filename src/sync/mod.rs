//! Dynamic schema synchronization
//!
//! Reconciles versioned design documents into tenant schemas:
//!
//! - Evolution is additive only: tables and columns are created, strings grow
//! - A storage type never changes; a conflicting field aborts the whole design
//! - Choice, grouped and multi-valued fields live in linked sub-tables
//! - A design is applied once per version, atomically, then recorded
//!
//! [`DesignSynchronizer`] is the entry point.

mod errors;
mod locks;
mod plan;
mod reconciler;
mod resolver;
mod subtable;
mod synchronizer;

pub use errors::{Severity, SyncError, SyncErrorCode, SyncResult};
pub use locks::SyncLocks;
pub use plan::{SchemaOp, SchemaPlan, SchemaWorkspace};
pub use reconciler::{grown_size, ColumnChange, ColumnReconciler};
pub use resolver::{FieldLayout, FieldTypeResolver, ResolvedType};
pub use subtable::{parent_link_column, sub_table_name, SubTableResolver, PARTICIPANT_COLUMN, ROW_KEY_COLUMN};
pub use synchronizer::{
    other_option_column, DesignSynchronizer, SyncOutcome, SyncPhase, ENROLLMENT_TOKEN_COLUMN,
    OTHER_OPTION_DESCRIPTION,
};

/// Default size of text columns whose field declares no max length
pub const DEFAULT_TEXT_SIZE: u32 = 4000;

/// Sizes applied when a design leaves them open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Text columns with no declared max length
    pub default_text_size: u32,
    /// Free-text column of choices with an other option
    pub other_option_size: u32,
    /// Primary key of participant properties tables
    pub enrollment_token_size: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_text_size: DEFAULT_TEXT_SIZE,
            other_option_size: DEFAULT_TEXT_SIZE,
            enrollment_token_size: DEFAULT_TEXT_SIZE,
        }
    }
}
