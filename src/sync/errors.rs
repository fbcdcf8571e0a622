//! Synchronization error types
//!
//! Error codes:
//! - SYNC_INVALID_DESIGN (REJECT)
//! - SYNC_TYPE_MISMATCH (FATAL)
//! - SYNC_UNKNOWN_FIELD_KIND (FATAL)
//! - SYNC_UNKNOWN_FIELD_FORMAT (FATAL)
//! - SYNC_INVALID_SUBTABLE (FATAL)
//! - SYNC_STORE_FAILED (FATAL)
//! - SYNC_PARTIAL_APPLY (RETRY)
//!
//! Every error raised while reconciling names the offending field key.

use std::error::Error as StdError;
use std::fmt;

use crate::design::{DesignScope, DesignViolation, ProviderError};
use crate::schema::{StorageType, StoreError};
use crate::version::DesignVersion;
use crate::versions::VersionStoreError;

/// How a caller should react to a failed synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The design document is at fault; fix it and resubmit
    Reject,
    /// The attempt was rolled back; retrying the same document fails again
    Fatal,
    /// Retrying the same document is safe and expected
    Retry,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
            Severity::Retry => write!(f, "RETRY"),
        }
    }
}

/// Synchronization error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCode {
    /// Malformed document, caught before any mutation
    InvalidDesign,
    /// Existing column has a different storage type
    TypeMismatch,
    /// Field kind has no storage type
    UnknownFieldKind,
    /// Unrecognized style for a style-dependent kind
    UnknownFieldFormat,
    /// Auxiliary table is structurally broken
    InvalidSubTable,
    /// Schema or version store failed during the attempt
    StoreFailed,
    /// Schema committed, version marker not written
    PartialApply,
}

impl SyncErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            SyncErrorCode::InvalidDesign => "SYNC_INVALID_DESIGN",
            SyncErrorCode::TypeMismatch => "SYNC_TYPE_MISMATCH",
            SyncErrorCode::UnknownFieldKind => "SYNC_UNKNOWN_FIELD_KIND",
            SyncErrorCode::UnknownFieldFormat => "SYNC_UNKNOWN_FIELD_FORMAT",
            SyncErrorCode::InvalidSubTable => "SYNC_INVALID_SUBTABLE",
            SyncErrorCode::StoreFailed => "SYNC_STORE_FAILED",
            SyncErrorCode::PartialApply => "SYNC_PARTIAL_APPLY",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SyncErrorCode::InvalidDesign => Severity::Reject,
            SyncErrorCode::PartialApply => Severity::Retry,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for SyncErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Synchronization error with context
#[derive(Debug)]
pub struct SyncError {
    code: SyncErrorCode,
    message: String,
    /// Offending field key
    field: Option<String>,
    /// Table the failure was found on
    table: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl SyncError {
    fn new(code: SyncErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            table: None,
            source: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid_design(message: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::InvalidDesign, message)
    }

    /// Structural defect found by document validation
    pub fn from_violation(violation: DesignViolation) -> Self {
        let mut err = Self::new(SyncErrorCode::InvalidDesign, violation.reason.clone());
        err.field = violation.field.clone();
        err.with_source(violation)
    }

    /// Provider could not produce the document
    pub fn provider_failed(source: ProviderError) -> Self {
        Self::new(
            SyncErrorCode::InvalidDesign,
            format!("Unable to obtain design document: {}", source),
        )
        .with_source(source)
    }

    pub fn type_mismatch(
        table: &str,
        field: &str,
        existing: StorageType,
        requested: StorageType,
    ) -> Self {
        Self::new(
            SyncErrorCode::TypeMismatch,
            format!(
                "Field '{}' on table '{}' is {} and cannot change to {}",
                field, table, existing, requested
            ),
        )
        .with_field(field)
        .with_table(table)
    }

    pub fn unknown_field_kind(field: &str, kind: &str) -> Self {
        Self::new(
            SyncErrorCode::UnknownFieldKind,
            format!("Field kind '{}' has no storage type for key: {}", kind, field),
        )
        .with_field(field)
    }

    pub fn unknown_field_format(field: &str, kind: &str, style: &str) -> Self {
        Self::new(
            SyncErrorCode::UnknownFieldFormat,
            format!(
                "Unknown format '{}' for {} field with key: {}",
                style, kind, field
            ),
        )
        .with_field(field)
    }

    pub fn invalid_sub_table(table: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::new(
            SyncErrorCode::InvalidSubTable,
            format!(
                "Sub-table '{}' for key {} is malformed: {}",
                table,
                field,
                reason.into()
            ),
        )
        .with_field(field)
        .with_table(table)
    }

    pub fn store_failed(context: &str, source: StoreError) -> Self {
        Self::new(
            SyncErrorCode::StoreFailed,
            format!("{}: {}", context, source),
        )
        .with_source(source)
    }

    pub fn version_store_failed(scope: &DesignScope, source: VersionStoreError) -> Self {
        Self::new(
            SyncErrorCode::StoreFailed,
            format!("Unable to read applied version of {}: {}", scope, source),
        )
        .with_source(source)
    }

    pub fn partial_apply(
        scope: &DesignScope,
        version: &DesignVersion,
        source: VersionStoreError,
    ) -> Self {
        Self::new(
            SyncErrorCode::PartialApply,
            format!(
                "Design {} version {} was applied but its version could not be recorded: {}",
                scope, version, source
            ),
        )
        .with_source(source)
    }

    pub fn code(&self) -> SyncErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Whether resubmitting the same document may succeed
    pub fn is_retryable(&self) -> bool {
        match self.code {
            SyncErrorCode::PartialApply => true,
            SyncErrorCode::StoreFailed => self
                .source
                .as_ref()
                .and_then(|s| s.downcast_ref::<StoreError>())
                .map_or(false, StoreError::is_conflict),
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)
    }
}

impl StdError for SyncError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for synchronization
pub type SyncResult<T> = Result<T, SyncError>;
