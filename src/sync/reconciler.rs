//! Column reconciliation
//!
//! Brings one column of a table in line with a field:
//!
//! - Absent: created with the resolved type and size
//! - Present with another storage type: fatal, never corrected
//! - Present string: grown to the declared size, never shrunk
//!
//! Labels, descriptions and nullability play no part in the comparison and
//! are left as they are on existing columns.

use crate::design::FieldSpec;
use crate::schema::{ColumnSpec, SchemaTable, UNBOUNDED_SIZE};

use super::errors::{SyncError, SyncResult};
use super::plan::SchemaOp;
use super::resolver::{FieldTypeResolver, ResolvedType};
use super::SyncSettings;

/// What reconciliation did to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    Created(ColumnSpec),
    Resized { column: ColumnSpec, from: u32 },
    Unchanged(ColumnSpec),
}

impl ColumnChange {
    /// The column as it stands after reconciliation
    pub fn column(&self) -> &ColumnSpec {
        match self {
            ColumnChange::Created(column)
            | ColumnChange::Resized { column, .. }
            | ColumnChange::Unchanged(column) => column,
        }
    }

    /// The schema operation that makes the change durable, if any
    pub fn to_op(&self, table: &str) -> Option<SchemaOp> {
        match self {
            ColumnChange::Created(column) => Some(SchemaOp::AddColumn {
                table: table.to_string(),
                column: column.clone(),
            }),
            ColumnChange::Resized { column, from } => Some(SchemaOp::ResizeColumn {
                table: table.to_string(),
                column: column.name.clone(),
                from: *from,
                to: column.size.unwrap_or(*from),
            }),
            ColumnChange::Unchanged(_) => None,
        }
    }
}

/// Reconciles value columns against fields.
#[derive(Debug, Clone)]
pub struct ColumnReconciler {
    resolver: FieldTypeResolver,
    default_text_size: u32,
}

impl ColumnReconciler {
    pub fn new(resolver: FieldTypeResolver, settings: &SyncSettings) -> Self {
        Self {
            resolver,
            default_text_size: settings.default_text_size,
        }
    }

    /// Creates, checks or grows the column named by `field.key`.
    pub fn reconcile(&self, table: &mut SchemaTable, field: &FieldSpec) -> SyncResult<ColumnChange> {
        let resolved = self.resolver.resolve(field)?;

        let existing = match table.column(&field.key) {
            Some(existing) => existing.clone(),
            None => {
                let mut column = ColumnSpec::new(field.key.as_str(), resolved.storage_type)
                    .with_label(field.label.clone())
                    .with_description(field.description.clone());
                if resolved.storage_type.is_string() {
                    column.size = Some(resolved.size.unwrap_or(self.default_text_size));
                }
                table.insert_column(column.clone());
                return Ok(ColumnChange::Created(column));
            }
        };

        self.reconcile_existing(table, &field.key, existing, resolved)
    }

    /// Ensures a fixed-size column exists with the expected type. Never resizes.
    pub fn ensure_column(
        &self,
        table: &mut SchemaTable,
        desired: &ColumnSpec,
        field_key: &str,
    ) -> SyncResult<ColumnChange> {
        match table.column(&desired.name) {
            Some(existing) if existing.storage_type != desired.storage_type => Err(
                SyncError::type_mismatch(&table.name, field_key, existing.storage_type, desired.storage_type),
            ),
            Some(existing) => Ok(ColumnChange::Unchanged(existing.clone())),
            None => {
                table.insert_column(desired.clone());
                Ok(ColumnChange::Created(desired.clone()))
            }
        }
    }

    fn reconcile_existing(
        &self,
        table: &mut SchemaTable,
        key: &str,
        existing: ColumnSpec,
        resolved: ResolvedType,
    ) -> SyncResult<ColumnChange> {
        if existing.storage_type != resolved.storage_type {
            return Err(SyncError::type_mismatch(
                &table.name,
                key,
                existing.storage_type,
                resolved.storage_type,
            ));
        }

        if !existing.storage_type.is_string() {
            return Ok(ColumnChange::Unchanged(existing));
        }

        match grown_size(existing.size, resolved.size) {
            Some(to) => {
                let from = existing.size.unwrap_or(0);
                table.set_column_size(&existing.name, to);
                let mut column = existing;
                column.size = Some(to);
                Ok(ColumnChange::Resized { column, from })
            }
            None => Ok(ColumnChange::Unchanged(existing)),
        }
    }
}

/// New size of a string column, or `None` to leave it alone.
///
/// Grows only to a strictly larger declared size; an unbounded column is final.
pub fn grown_size(current: Option<u32>, declared: Option<u32>) -> Option<u32> {
    let current = current.unwrap_or(0);
    if current == UNBOUNDED_SIZE {
        return None;
    }
    declared.filter(|&size| size > current)
}
